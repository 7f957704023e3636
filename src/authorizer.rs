use std::sync::Arc;

use chrono::TimeDelta;

use crate::authz::{PermKind, Perms, RepoLike, RepoPerms};
use crate::config::PermsConfig;
use crate::errors::PermsResult;
use crate::models::{PermissionsRecord, RepoPermissions, UserPermissions};
use crate::sync::PermsSyncer;
use crate::utils::utc_now;

/// Read path: cache first, then storage, re-syncing anything past its TTL.
///
/// A stored row that fails to decode is treated as missing. A failed re-sync
/// falls back to the stale snapshot when there is one; the sync error is only
/// returned when nothing was ever synced.
#[derive(Clone)]
pub struct Authorizer {
    syncer: PermsSyncer,
    user_ttl: TimeDelta,
    repo_ttl: TimeDelta,
}

impl Authorizer {
    pub fn new(syncer: PermsSyncer, config: &PermsConfig) -> Self {
        Self {
            syncer,
            user_ttl: config.user_ttl,
            repo_ttl: config.repo_ttl,
        }
    }

    pub fn syncer(&self) -> &PermsSyncer {
        &self.syncer
    }

    pub async fn user_permissions(&self, user_id: i32, perm: Perms) -> PermsResult<Arc<UserPermissions>> {
        let kind = PermKind::Repos;
        let cache = self.syncer.cache();

        let current = match cache.user(user_id, perm, &kind).await {
            Some(snapshot) => Some(snapshot),
            None => match self.syncer.store().load_user_permissions(user_id, perm, &kind).await {
                Ok(Some(stored)) => Some(cache.publish_user_if_absent(stored).await),
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(user_id, perm = %perm, error = %err, "unreadable stored user permissions, re-syncing");
                    None
                }
            },
        };

        if let Some(snapshot) = &current {
            if snapshot.id_set().is_some() && !snapshot.expired(self.user_ttl, utc_now()) {
                return Ok(Arc::clone(snapshot));
            }
        }

        match self.syncer.sync_user_permissions(user_id, perm, &kind).await {
            Ok(fresh) => Ok(fresh),
            Err(err) => match current {
                Some(stale) => {
                    tracing::warn!(
                        user_id,
                        perm = %perm,
                        error = %err,
                        updated_at = %stale.updated_at,
                        "serving stale user permissions"
                    );
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    pub async fn repo_permissions(&self, repo_id: i32, perm: Perms) -> PermsResult<Arc<RepoPermissions>> {
        let cache = self.syncer.cache();

        let current = match cache.repo(repo_id, perm).await {
            Some(snapshot) => Some(snapshot),
            None => match self.syncer.store().load_repo_permissions(repo_id, perm).await {
                Ok(Some(stored)) => Some(cache.publish_repo_if_absent(stored).await),
                Ok(None) => None,
                Err(err) => {
                    tracing::warn!(repo_id, perm = %perm, error = %err, "unreadable stored repo permissions, re-syncing");
                    None
                }
            },
        };

        if let Some(snapshot) = &current {
            if snapshot.id_set().is_some() && !snapshot.expired(self.repo_ttl, utc_now()) {
                return Ok(Arc::clone(snapshot));
            }
        }

        match self.syncer.sync_repo_permissions(repo_id, perm).await {
            Ok(fresh) => Ok(fresh),
            Err(err) => match current {
                Some(stale) => {
                    tracing::warn!(
                        repo_id,
                        perm = %perm,
                        error = %err,
                        updated_at = %stale.updated_at,
                        "serving stale repo permissions"
                    );
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    /// The subset of `repos` the user may perform `perm` on, in input order.
    ///
    /// The filter runs on a cloned snapshot, outside any cache lock.
    pub async fn authorized_repos<'a, R: RepoLike>(
        &self,
        user_id: i32,
        perm: Perms,
        repos: &'a [R],
    ) -> PermsResult<Vec<RepoPerms<'a, R>>> {
        if repos.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.user_permissions(user_id, perm).await?;
        let authorized = snapshot.authorized_repos(repos);

        tracing::debug!(
            user_id,
            perm = %perm,
            candidates = repos.len(),
            authorized = authorized.len(),
            "resolved authorized repositories"
        );
        Ok(authorized)
    }
}
