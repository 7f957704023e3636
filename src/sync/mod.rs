//! Permission sync - turns provider data into published snapshots
//!
//! A sync builds a brand new record, persists it, then swaps it into the
//! cache. If the provider or the store fails, nothing already published is
//! touched and callers keep serving the previous snapshot.

mod provider;

pub use provider::{PermsProvider, StaticProvider};

use std::sync::Arc;

use crate::authz::{PermKind, Perms};
use crate::cache::PermsCache;
use crate::db::PermsStore;
use crate::errors::{PermsError, PermsResult};
use crate::models::{PermissionsRecord, RepoPermissions, UserPermissions};
use crate::utils::utc_now;

#[derive(Clone)]
pub struct PermsSyncer {
    provider: Arc<dyn PermsProvider>,
    store: PermsStore,
    cache: Arc<PermsCache>,
}

impl PermsSyncer {
    pub fn new(provider: Arc<dyn PermsProvider>, store: PermsStore, cache: Arc<PermsCache>) -> Self {
        Self { provider, store, cache }
    }

    pub fn store(&self) -> &PermsStore {
        &self.store
    }

    pub fn cache(&self) -> &Arc<PermsCache> {
        &self.cache
    }

    pub async fn sync_user_permissions(
        &self,
        user_id: i32,
        perm: Perms,
        kind: &PermKind,
    ) -> PermsResult<Arc<UserPermissions>> {
        let provider = self.provider.provider_type();
        let ids = self
            .provider
            .fetch_user_perms(user_id, perm, kind)
            .await
            .map_err(|err| {
                tracing::warn!(
                    user_id,
                    provider = %provider,
                    error = %err,
                    "failed to fetch user permissions, keeping last snapshot"
                );
                into_sync_error(err)
            })?;

        let perms = UserPermissions::new(user_id, perm, kind.clone())
            .with_ids(ids, utc_now())
            .with_provider(provider);
        self.store.upsert_user_permissions(&perms).await?;
        perms.trace("user permissions synced");

        Ok(self.cache.publish_user(perms).await)
    }

    pub async fn sync_repo_permissions(&self, repo_id: i32, perm: Perms) -> PermsResult<Arc<RepoPermissions>> {
        let provider = self.provider.provider_type();
        let user_ids = self
            .provider
            .fetch_repo_perms(repo_id, perm)
            .await
            .map_err(|err| {
                tracing::warn!(
                    repo_id,
                    provider = %provider,
                    error = %err,
                    "failed to fetch repo permissions, keeping last snapshot"
                );
                into_sync_error(err)
            })?;

        let perms = RepoPermissions::new(repo_id, perm)
            .with_user_ids(user_ids, utc_now())
            .with_provider(provider);
        self.store.upsert_repo_permissions(&perms).await?;
        perms.trace("repo permissions synced");

        Ok(self.cache.publish_repo(perms).await)
    }

    /// Binds the pending permissions of `bind_id` to a newly created user and
    /// publishes the resulting snapshots.
    pub async fn grant_pending_permissions(
        &self,
        user_id: i32,
        bind_id: &str,
        perm: Perms,
        kind: &PermKind,
    ) -> PermsResult<Option<Arc<UserPermissions>>> {
        let granted = match self
            .store
            .grant_pending_permissions(user_id, bind_id, perm, kind, utc_now())
            .await?
        {
            Some(granted) => granted,
            None => return Ok(None),
        };

        if kind.is_repos() {
            if let Some(ids) = granted.ids.as_ref() {
                for repo_id in ids.iter().filter_map(|id| i32::try_from(id).ok()) {
                    if self.cache.repo(repo_id, perm).await.is_none() {
                        continue;
                    }
                    if let Some(repo) = self.store.load_repo_permissions(repo_id, perm).await? {
                        self.cache.publish_repo(repo).await;
                    }
                }
            }
        }

        Ok(Some(self.cache.publish_user(granted).await))
    }
}

fn into_sync_error(err: PermsError) -> PermsError {
    match err {
        PermsError::Sync(_) => err,
        other => PermsError::sync(other.to_string()),
    }
}
