//! SQLite persistence for permission records.
//!
//! ID sets are stored as portable roaring blobs (NULL when never synced)
//! and timestamps as RFC 3339 text with nanosecond precision.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use super::row_parsers::{
    encode_ids, format_datetime, pending_permissions_from_row, repo_permissions_from_row,
    user_permissions_from_row,
};
use crate::authz::{IdSet, PermKind, Perms, ProviderType};
use crate::errors::{PermsError, PermsResult};
use crate::models::{RepoPermissions, UserPendingPermissions, UserPermissions};

#[derive(Debug, Clone)]
pub struct PermsStore {
    pool: SqlitePool,
}

impl PermsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // USER PERMISSIONS
    // =========================================================================

    pub async fn load_user_permissions(
        &self,
        user_id: i32,
        perm: Perms,
        kind: &PermKind,
    ) -> PermsResult<Option<UserPermissions>> {
        let mut conn = self.pool.acquire().await?;
        load_user(&mut conn, user_id, perm, kind).await
    }

    pub async fn upsert_user_permissions(&self, p: &UserPermissions) -> PermsResult<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_user(&mut conn, p).await
    }

    // =========================================================================
    // REPO PERMISSIONS
    // =========================================================================

    pub async fn load_repo_permissions(&self, repo_id: i32, perm: Perms) -> PermsResult<Option<RepoPermissions>> {
        let mut conn = self.pool.acquire().await?;
        load_repo(&mut conn, repo_id, perm).await
    }

    pub async fn upsert_repo_permissions(&self, p: &RepoPermissions) -> PermsResult<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_repo(&mut conn, p).await
    }

    // =========================================================================
    // PENDING PERMISSIONS
    // =========================================================================

    pub async fn load_pending_permissions(
        &self,
        bind_id: &str,
        perm: Perms,
        kind: &PermKind,
    ) -> PermsResult<Option<UserPendingPermissions>> {
        let mut conn = self.pool.acquire().await?;
        load_pending(&mut conn, bind_id, perm, kind).await
    }

    /// Records that each of `bind_ids` may access `repo_id`, creating pending
    /// rows for bind IDs seen for the first time.
    pub async fn set_repo_pending_permissions(
        &self,
        repo_id: i32,
        perm: Perms,
        kind: &PermKind,
        bind_ids: &[String],
        now: DateTime<Utc>,
    ) -> PermsResult<()> {
        let repo_id_u32 = non_negative_id("repo_id", repo_id)?;

        let mut tx = self.pool.begin().await?;
        for bind_id in bind_ids {
            let mut pending = load_pending(&mut tx, bind_id, perm, kind)
                .await?
                .unwrap_or_else(|| UserPendingPermissions::new(bind_id.as_str(), perm, kind.clone()));

            let mut ids = pending.ids.take().unwrap_or_default();
            ids.add(repo_id_u32);
            pending.ids = Some(ids);
            pending.updated_at = now;

            upsert_pending(&mut tx, &pending).await?;
        }
        tx.commit().await?;

        tracing::debug!(repo_id, perm = %perm, bind_ids = bind_ids.len(), "pending permissions recorded");
        Ok(())
    }

    /// Moves the pending permissions of `bind_id` onto `user_id`.
    ///
    /// Within one transaction: the pending IDs are merged into the user's
    /// record, the user is added to every affected repository record, and the
    /// pending row is deleted. Returns `None` when nothing was pending.
    pub async fn grant_pending_permissions(
        &self,
        user_id: i32,
        bind_id: &str,
        perm: Perms,
        kind: &PermKind,
        now: DateTime<Utc>,
    ) -> PermsResult<Option<UserPermissions>> {
        let user_id_u32 = non_negative_id("user_id", user_id)?;

        let mut tx = self.pool.begin().await?;

        let pending = match load_pending(&mut tx, bind_id, perm, kind).await? {
            Some(pending) => pending,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };
        let pending_ids = pending.ids.clone().unwrap_or_default();

        let mut ids = load_user(&mut tx, user_id, perm, kind)
            .await?
            .and_then(|existing| existing.ids)
            .unwrap_or_default();
        ids.union_with(&pending_ids);

        let granted = UserPermissions::new(user_id, perm, kind.clone())
            .with_ids(ids, now)
            .with_provider(ProviderType::Sourcegraph);
        upsert_user(&mut tx, &granted).await?;

        if kind.is_repos() {
            for repo_id in pending_ids.iter() {
                let repo_id = i32::try_from(repo_id)
                    .map_err(|_| PermsError::internal(format!("repo id {repo_id} exceeds i32")))?;
                let repo = match load_repo(&mut tx, repo_id, perm).await? {
                    Some(mut repo) => {
                        let mut user_ids = repo.user_ids.take().unwrap_or_default();
                        user_ids.add(user_id_u32);
                        repo.user_ids = Some(user_ids);
                        repo
                    }
                    None => RepoPermissions::new(repo_id, perm)
                        .with_user_ids(std::iter::once(user_id_u32).collect(), now),
                };
                upsert_repo(&mut tx, &repo).await?;
            }
        }

        sqlx::query("DELETE FROM user_pending_permissions WHERE id = ?")
            .bind(pending.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            user_id,
            bind_id = %bind_id,
            granted = pending_ids.cardinality(),
            "pending permissions granted"
        );
        Ok(Some(granted))
    }
}

fn non_negative_id(name: &str, id: i32) -> PermsResult<u32> {
    u32::try_from(id).map_err(|_| PermsError::bad_request(format!("{name} must be non-negative, got {id}")))
}

async fn load_user(
    conn: &mut SqliteConnection,
    user_id: i32,
    perm: Perms,
    kind: &PermKind,
) -> PermsResult<Option<UserPermissions>> {
    let row = sqlx::query(
        "SELECT user_id, permission, object_type, object_ids, provider, updated_at \
         FROM user_permissions WHERE user_id = ? AND permission = ? AND object_type = ?",
    )
    .bind(user_id)
    .bind(perm.as_str())
    .bind(kind.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(user_permissions_from_row).transpose()
}

async fn upsert_user(conn: &mut SqliteConnection, p: &UserPermissions) -> PermsResult<()> {
    sqlx::query::<Sqlite>(
        "INSERT INTO user_permissions (user_id, permission, object_type, object_ids, provider, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT (user_id, permission, object_type) DO UPDATE SET \
         object_ids = excluded.object_ids, provider = excluded.provider, updated_at = excluded.updated_at",
    )
    .bind(p.user_id)
    .bind(p.perm.as_str())
    .bind(p.kind.as_str())
    .bind(encode_ids(p.ids.as_ref())?)
    .bind(p.provider.as_str())
    .bind(format_datetime(&p.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn load_repo(conn: &mut SqliteConnection, repo_id: i32, perm: Perms) -> PermsResult<Option<RepoPermissions>> {
    let row = sqlx::query(
        "SELECT repo_id, permission, user_ids, provider, updated_at \
         FROM repo_permissions WHERE repo_id = ? AND permission = ?",
    )
    .bind(repo_id)
    .bind(perm.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(repo_permissions_from_row).transpose()
}

async fn upsert_repo(conn: &mut SqliteConnection, p: &RepoPermissions) -> PermsResult<()> {
    sqlx::query::<Sqlite>(
        "INSERT INTO repo_permissions (repo_id, permission, user_ids, provider, updated_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT (repo_id, permission) DO UPDATE SET \
         user_ids = excluded.user_ids, provider = excluded.provider, updated_at = excluded.updated_at",
    )
    .bind(p.repo_id)
    .bind(p.perm.as_str())
    .bind(encode_ids(p.user_ids.as_ref())?)
    .bind(p.provider.as_str())
    .bind(format_datetime(&p.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn load_pending(
    conn: &mut SqliteConnection,
    bind_id: &str,
    perm: Perms,
    kind: &PermKind,
) -> PermsResult<Option<UserPendingPermissions>> {
    let row = sqlx::query(
        "SELECT id, bind_id, permission, object_type, object_ids, updated_at \
         FROM user_pending_permissions WHERE bind_id = ? AND permission = ? AND object_type = ?",
    )
    .bind(bind_id)
    .bind(perm.as_str())
    .bind(kind.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(pending_permissions_from_row).transpose()
}

async fn upsert_pending(conn: &mut SqliteConnection, p: &UserPendingPermissions) -> PermsResult<()> {
    sqlx::query::<Sqlite>(
        "INSERT INTO user_pending_permissions (bind_id, permission, object_type, object_ids, updated_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT (bind_id, permission, object_type) DO UPDATE SET \
         object_ids = excluded.object_ids, updated_at = excluded.updated_at",
    )
    .bind(p.bind_id.as_str())
    .bind(p.perm.as_str())
    .bind(p.kind.as_str())
    .bind(encode_ids(p.ids.as_ref())?)
    .bind(format_datetime(&p.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// IDs in ascending order, empty when the set is absent.
pub fn sorted_ids(ids: Option<&IdSet>) -> Vec<u32> {
    ids.map(|ids| ids.iter().collect()).unwrap_or_default()
}
