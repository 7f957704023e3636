use std::fmt;

/// Typed value of a diagnostics field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int32(i32),
    Uint64(u64),
    Str(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int32(v) => write!(f, "{v}"),
            FieldValue::Uint64(v) => write!(f, "{v}"),
            FieldValue::Str(v) => write!(f, "{v:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn int32(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Int32(value),
        }
    }

    pub fn uint64(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Uint64(value),
        }
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Str(value.into()),
        }
    }
}

/// Flat projection of a record for tracing export.
///
/// Implementors always emit their identity fields. The ID count and the
/// `updated_at` timestamp are only emitted once an ID set is present.
pub trait TracingFields {
    /// Prefix for every field name, e.g. "user_permissions"
    fn record_type() -> &'static str
    where
        Self: Sized;

    fn tracing_fields(&self) -> Vec<Field>;
}

/// Renders fields as space separated `name=value` pairs.
pub fn render_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|field| format!("{}={}", field.name, field.value))
        .collect::<Vec<_>>()
        .join(" ")
}
