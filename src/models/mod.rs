pub mod permissions;
pub mod repo;

pub use permissions::{PermissionsRecord, RepoPermissions, UserPendingPermissions, UserPermissions};
pub use repo::Repo;
