use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::authz::{IdSet, PermKind, Perms, ProviderType};
use crate::errors::{PermsError, PermsResult};

/// Source of truth for permission data (code host API, identity provider, ...).
///
/// Implementations return the complete set of IDs for the requested tuple;
/// the syncer turns it into a new snapshot.
#[async_trait]
pub trait PermsProvider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    /// Object IDs of `kind` the user may perform `perm` on.
    async fn fetch_user_perms(&self, user_id: i32, perm: Perms, kind: &PermKind) -> PermsResult<IdSet>;

    /// User IDs that may perform `perm` on the repository.
    async fn fetch_repo_perms(&self, repo_id: i32, perm: Perms) -> PermsResult<IdSet>;
}

/// Seed file layout accepted by `StaticProvider::from_json`
#[derive(Debug, Deserialize)]
struct Seed {
    provider: ProviderType,
    #[serde(default)]
    users: Vec<UserSeed>,
    #[serde(default)]
    repos: Vec<RepoSeed>,
}

#[derive(Debug, Deserialize)]
struct UserSeed {
    user_id: i32,
    #[serde(default)]
    perm: Perms,
    repo_ids: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct RepoSeed {
    repo_id: i32,
    #[serde(default)]
    perm: Perms,
    user_ids: Vec<u32>,
}

/// Map-backed provider used for seeding from files and in tests.
///
/// Users or repositories it has never heard of get an empty set.
#[derive(Debug)]
pub struct StaticProvider {
    provider: ProviderType,
    users: RwLock<HashMap<(i32, Perms), IdSet>>,
    repos: RwLock<HashMap<(i32, Perms), IdSet>>,
    failure: RwLock<Option<String>>,
}

impl StaticProvider {
    pub fn new(provider: ProviderType) -> Self {
        Self {
            provider,
            users: RwLock::new(HashMap::new()),
            repos: RwLock::new(HashMap::new()),
            failure: RwLock::new(None),
        }
    }

    pub fn from_json(raw: &str) -> PermsResult<Self> {
        let seed: Seed = serde_json::from_str(raw)
            .map_err(|err| PermsError::bad_request(format!("invalid provider seed: {err}")))?;

        let users: HashMap<(i32, Perms), IdSet> = seed
            .users
            .into_iter()
            .map(|u| ((u.user_id, u.perm), u.repo_ids.into_iter().collect()))
            .collect();
        let repos: HashMap<(i32, Perms), IdSet> = seed
            .repos
            .into_iter()
            .map(|r| ((r.repo_id, r.perm), r.user_ids.into_iter().collect()))
            .collect();

        Ok(Self {
            provider: seed.provider,
            users: RwLock::new(users),
            repos: RwLock::new(repos),
            failure: RwLock::new(None),
        })
    }

    pub async fn set_user_ids(&self, user_id: i32, perm: Perms, ids: impl IntoIterator<Item = u32>) {
        self.users.write().await.insert((user_id, perm), ids.into_iter().collect());
    }

    pub async fn set_repo_user_ids(&self, repo_id: i32, perm: Perms, ids: impl IntoIterator<Item = u32>) {
        self.repos.write().await.insert((repo_id, perm), ids.into_iter().collect());
    }

    /// Makes every fetch fail with `message` until called with `None`.
    pub async fn fail_with(&self, message: Option<&str>) {
        *self.failure.write().await = message.map(str::to_string);
    }

    async fn check_available(&self) -> PermsResult<()> {
        match self.failure.read().await.as_ref() {
            Some(message) => Err(PermsError::sync(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PermsProvider for StaticProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider
    }

    async fn fetch_user_perms(&self, user_id: i32, perm: Perms, kind: &PermKind) -> PermsResult<IdSet> {
        self.check_available().await?;
        if !kind.is_repos() {
            return Err(PermsError::sync(format!("provider {} cannot list {kind} permissions", self.provider)));
        }

        Ok(self
            .users
            .read()
            .await
            .get(&(user_id, perm))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_repo_perms(&self, repo_id: i32, perm: Perms) -> PermsResult<IdSet> {
        self.check_available().await?;
        Ok(self
            .repos
            .read()
            .await
            .get(&(repo_id, perm))
            .cloned()
            .unwrap_or_default())
    }
}
