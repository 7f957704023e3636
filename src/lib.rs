pub mod authorizer;
pub mod authz;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod sync;
pub mod utils;

// Re-export commonly used items for tests
pub use authorizer::Authorizer;
pub use authz::{IdSet, PermKind, Perms, ProviderType, RepoLike, RepoPerms};
pub use cache::PermsCache;
pub use config::PermsConfig;
pub use db::PermsStore;
pub use errors::{PermsError, PermsResult};
pub use models::{PermissionsRecord, Repo, RepoPermissions, UserPendingPermissions, UserPermissions};
pub use sync::{PermsProvider, PermsSyncer, StaticProvider};
