pub type PermsResult<T> = Result<T, PermsError>;

#[derive(thiserror::Error, Debug)]
pub enum PermsError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sync error: {0}")]
    Sync(String),
    #[error("bitmap error: {0}")]
    Bitmap(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl PermsError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn sync(message: impl Into<String>) -> Self {
        Self::Sync(message.into())
    }

    pub fn bitmap(message: impl Into<String>) -> Self {
        Self::Bitmap(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PermsError::BadRequest(_) => "bad_request",
            PermsError::Configuration(_) => "configuration",
            PermsError::Sync(_) => "sync",
            PermsError::Bitmap(_) => "bitmap",
            PermsError::Database(_) => "database",
            PermsError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_keeps_cause() {
        let err = PermsError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), "database");
        let message = err.to_string();
        assert!(message.starts_with("database error: "));
        assert!(message.len() > "database error: ".len());
    }
}
