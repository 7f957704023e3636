//! In-memory snapshot cache for permission records.
//!
//! Snapshots are shared as `Arc` and never edited: publishing a refresh swaps
//! the map entry for a new `Arc`, so readers holding an old snapshot keep
//! seeing the old bitmap and timestamp.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::authz::{PermKind, Perms};
use crate::models::{RepoPermissions, UserPermissions};

type UserKey = (i32, Perms, PermKind);
type RepoKey = (i32, Perms);

#[derive(Debug, Default)]
pub struct PermsCache {
    users: RwLock<HashMap<UserKey, Arc<UserPermissions>>>,
    repos: RwLock<HashMap<RepoKey, Arc<RepoPermissions>>>,
}

impl PermsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user(&self, user_id: i32, perm: Perms, kind: &PermKind) -> Option<Arc<UserPermissions>> {
        self.users
            .read()
            .await
            .get(&(user_id, perm, kind.clone()))
            .cloned()
    }

    /// Replaces the cached snapshot for the record's key and returns the new one.
    pub async fn publish_user(&self, perms: UserPermissions) -> Arc<UserPermissions> {
        let snapshot = Arc::new(perms);
        let key = (snapshot.user_id, snapshot.perm, snapshot.kind.clone());
        self.users.write().await.insert(key, Arc::clone(&snapshot));
        snapshot
    }

    /// Caches `perms` unless a snapshot for its key already exists, returning
    /// whichever snapshot ends up cached.
    pub async fn publish_user_if_absent(&self, perms: UserPermissions) -> Arc<UserPermissions> {
        let key = (perms.user_id, perms.perm, perms.kind.clone());
        let mut users = self.users.write().await;
        Arc::clone(users.entry(key).or_insert_with(|| Arc::new(perms)))
    }

    pub async fn evict_user(&self, user_id: i32, perm: Perms, kind: &PermKind) -> Option<Arc<UserPermissions>> {
        self.users.write().await.remove(&(user_id, perm, kind.clone()))
    }

    pub async fn len_users(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn repo(&self, repo_id: i32, perm: Perms) -> Option<Arc<RepoPermissions>> {
        self.repos.read().await.get(&(repo_id, perm)).cloned()
    }

    pub async fn publish_repo_if_absent(&self, perms: RepoPermissions) -> Arc<RepoPermissions> {
        let key = (perms.repo_id, perms.perm);
        let mut repos = self.repos.write().await;
        Arc::clone(repos.entry(key).or_insert_with(|| Arc::new(perms)))
    }

    pub async fn publish_repo(&self, perms: RepoPermissions) -> Arc<RepoPermissions> {
        let snapshot = Arc::new(perms);
        let key = (snapshot.repo_id, snapshot.perm);
        self.repos.write().await.insert(key, Arc::clone(&snapshot));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::IdSet;
    use chrono::{TimeDelta, Utc};

    #[tokio::test]
    async fn test_publish_replaces_without_touching_old_snapshot() {
        let cache = PermsCache::new();
        let t0 = Utc::now();

        let first = cache
            .publish_user(
                UserPermissions::new(1, Perms::Read, PermKind::Repos).with_ids([1, 2].into_iter().collect(), t0),
            )
            .await;

        let held = cache.user(1, Perms::Read, &PermKind::Repos).await.unwrap();
        assert!(Arc::ptr_eq(&first, &held));

        let t1 = t0 + TimeDelta::minutes(10);
        cache
            .publish_user(UserPermissions::new(1, Perms::Read, PermKind::Repos).with_ids([9].into_iter().collect(), t1))
            .await;

        assert_eq!(held.updated_at, t0);
        assert_eq!(held.ids.as_ref().map(IdSet::cardinality), Some(2));
        assert!(held.ids.as_ref().unwrap().contains(1));

        let current = cache.user(1, Perms::Read, &PermKind::Repos).await.unwrap();
        assert_eq!(current.updated_at, t1);
        assert!(current.ids.as_ref().unwrap().contains(9));
        assert_eq!(cache.len_users().await, 1);
    }

    #[tokio::test]
    async fn test_keys_separate_perm_and_kind() {
        let cache = PermsCache::new();
        cache.publish_user(UserPermissions::new(1, Perms::Read, PermKind::Repos)).await;

        assert!(cache.user(1, Perms::Write, &PermKind::Repos).await.is_none());
        assert!(cache.user(1, Perms::Read, &PermKind::from("labels")).await.is_none());
        assert!(cache.evict_user(1, Perms::Read, &PermKind::Repos).await.is_some());
        assert!(cache.user(1, Perms::Read, &PermKind::Repos).await.is_none());
    }

    #[tokio::test]
    async fn test_publish_if_absent_keeps_existing() {
        let cache = PermsCache::new();
        let t0 = Utc::now();
        let newer = cache
            .publish_user(UserPermissions::new(2, Perms::Read, PermKind::Repos).with_ids(IdSet::new(), t0))
            .await;

        let older = UserPermissions::new(2, Perms::Read, PermKind::Repos)
            .with_ids(IdSet::new(), t0 - TimeDelta::hours(1));
        let winner = cache.publish_user_if_absent(older).await;
        assert!(Arc::ptr_eq(&newer, &winner));
    }

    #[tokio::test]
    async fn test_repo_snapshots() {
        let cache = PermsCache::new();
        assert!(cache.repo(5, Perms::Read).await.is_none());
        cache
            .publish_repo(RepoPermissions::new(5, Perms::Read).with_user_ids([3].into_iter().collect(), Utc::now()))
            .await;
        let snapshot = cache.repo(5, Perms::Read).await.unwrap();
        assert!(snapshot.allows_user(3));
    }
}
