use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::authz::{IdSet, PermKind, Perms, ProviderType};
use crate::errors::{PermsError, PermsResult};
use crate::models::{RepoPermissions, UserPendingPermissions, UserPermissions};

/// Timestamps are stored as RFC 3339 with nanoseconds so TTL checks survive a round trip.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_datetime(s: &str) -> PermsResult<DateTime<Utc>> {
    let s = s.trim();

    // Try RFC3339 first (e.g. 2025-11-19T12:34:56.000000001Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Rows written by hand through the sqlite shell use "YYYY-MM-DD HH:MM:SS"
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(PermsError::internal(format!("invalid datetime: {}", s)))
}

pub fn encode_ids(ids: Option<&IdSet>) -> PermsResult<Option<Vec<u8>>> {
    ids.map(IdSet::to_bytes).transpose()
}

fn decode_ids(blob: Option<Vec<u8>>) -> PermsResult<Option<IdSet>> {
    blob.as_deref().map(IdSet::from_bytes).transpose()
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> PermsResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| PermsError::internal(format!("missing {}: {}", name, e)))
}

pub fn user_permissions_from_row(row: &SqliteRow) -> PermsResult<UserPermissions> {
    let user_id: i32 = column(row, "user_id")?;
    let perm_s: String = column(row, "permission")?;
    let kind_s: String = column(row, "object_type")?;
    let ids_blob: Option<Vec<u8>> = column(row, "object_ids")?;
    let provider_s: String = column(row, "provider")?;
    let updated_at_s: String = column(row, "updated_at")?;

    Ok(UserPermissions {
        user_id,
        perm: perm_s.parse::<Perms>()?,
        kind: PermKind::from(kind_s),
        ids: decode_ids(ids_blob)?,
        provider: provider_s.parse::<ProviderType>()?,
        updated_at: parse_datetime(&updated_at_s)?,
    })
}

pub fn repo_permissions_from_row(row: &SqliteRow) -> PermsResult<RepoPermissions> {
    let repo_id: i32 = column(row, "repo_id")?;
    let perm_s: String = column(row, "permission")?;
    let ids_blob: Option<Vec<u8>> = column(row, "user_ids")?;
    let provider_s: String = column(row, "provider")?;
    let updated_at_s: String = column(row, "updated_at")?;

    Ok(RepoPermissions {
        repo_id,
        perm: perm_s.parse::<Perms>()?,
        user_ids: decode_ids(ids_blob)?,
        provider: provider_s.parse::<ProviderType>()?,
        updated_at: parse_datetime(&updated_at_s)?,
    })
}

pub fn pending_permissions_from_row(row: &SqliteRow) -> PermsResult<UserPendingPermissions> {
    let id: i32 = column(row, "id")?;
    let bind_id: String = column(row, "bind_id")?;
    let perm_s: String = column(row, "permission")?;
    let kind_s: String = column(row, "object_type")?;
    let ids_blob: Option<Vec<u8>> = column(row, "object_ids")?;
    let updated_at_s: String = column(row, "updated_at")?;

    Ok(UserPendingPermissions {
        id,
        bind_id,
        perm: perm_s.parse::<Perms>()?,
        kind: PermKind::from(kind_s),
        ids: decode_ids(ids_blob)?,
        updated_at: parse_datetime(&updated_at_s)?,
    })
}
