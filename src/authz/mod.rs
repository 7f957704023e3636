//! Authorization module - permission vocabulary and evaluation
//!
//! This module holds the pieces every permission record shares:
//! - Compressed ID sets (`IdSet`)
//! - The TTL expiry policy
//! - The repository resolver that intersects a user's IDs with candidates
//! - The diagnostics projection used for tracing

pub mod bitmap;
pub mod diagnostics;
pub mod expiry;
pub mod resolver;

pub use bitmap::IdSet;
pub use diagnostics::{render_fields, Field, FieldValue, TracingFields};
pub use expiry::is_expired;
pub use resolver::{authorized_repos, RepoLike, RepoPerms};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PermsError;

/// Action being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perms {
    Read,
    Write,
    Admin,
}

impl Perms {
    pub fn as_str(&self) -> &'static str {
        match self {
            Perms::Read => "read",
            Perms::Write => "write",
            Perms::Admin => "admin",
        }
    }
}

impl Default for Perms {
    fn default() -> Self {
        Perms::Read
    }
}

impl fmt::Display for Perms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Perms {
    type Err = PermsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(Perms::Read),
            "write" => Ok(Perms::Write),
            "admin" => Ok(Perms::Admin),
            other => Err(PermsError::bad_request(format!("unknown permission: {other}"))),
        }
    }
}

/// Class of object a permission record governs.
///
/// Only `Repos` can be answered by the resolver. Any other kind found in
/// storage or reported by a provider is kept verbatim in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PermKind {
    Repos,
    Unknown(String),
}

impl PermKind {
    pub fn as_str(&self) -> &str {
        match self {
            PermKind::Repos => "repos",
            PermKind::Unknown(other) => other.as_str(),
        }
    }

    pub fn is_repos(&self) -> bool {
        matches!(self, PermKind::Repos)
    }
}

impl Default for PermKind {
    fn default() -> Self {
        PermKind::Repos
    }
}

impl fmt::Display for PermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for PermKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "repos" => PermKind::Repos,
            _ => PermKind::Unknown(value),
        }
    }
}

impl From<&str> for PermKind {
    fn from(value: &str) -> Self {
        PermKind::from(value.to_string())
    }
}

impl From<PermKind> for String {
    fn from(value: PermKind) -> Self {
        match value {
            PermKind::Repos => "repos".to_string(),
            PermKind::Unknown(other) => other,
        }
    }
}

/// External system of record that produced a permission record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "sourcegraph")]
    Sourcegraph,
    #[serde(rename = "bitbucketServer")]
    BitbucketServer,
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "gitlab")]
    GitLab,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Sourcegraph => "sourcegraph",
            ProviderType::BitbucketServer => "bitbucketServer",
            ProviderType::GitHub => "github",
            ProviderType::GitLab => "gitlab",
        }
    }
}

impl Default for ProviderType {
    fn default() -> Self {
        ProviderType::Sourcegraph
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = PermsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sourcegraph" => Ok(ProviderType::Sourcegraph),
            "bitbucketServer" => Ok(ProviderType::BitbucketServer),
            "github" => Ok(ProviderType::GitHub),
            "gitlab" => Ok(ProviderType::GitLab),
            other => Err(PermsError::bad_request(format!("unknown provider: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perms_parse_is_case_insensitive() {
        assert_eq!("READ".parse::<Perms>().unwrap(), Perms::Read);
        assert_eq!(" write ".parse::<Perms>().unwrap(), Perms::Write);
        assert!("owner".parse::<Perms>().is_err());
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let kind = PermKind::from("labels");
        assert_eq!(kind, PermKind::Unknown("labels".to_string()));
        assert_eq!(kind.to_string(), "labels");
        assert!(!kind.is_repos());
        assert!(PermKind::from("repos").is_repos());
    }

    #[test]
    fn test_provider_round_trips_through_str() {
        for provider in [
            ProviderType::Sourcegraph,
            ProviderType::BitbucketServer,
            ProviderType::GitHub,
            ProviderType::GitLab,
        ] {
            assert_eq!(provider.as_str().parse::<ProviderType>().unwrap(), provider);
        }
        assert!("gitea".parse::<ProviderType>().is_err());
    }

    #[test]
    fn test_kind_serializes_as_plain_string() {
        let json = serde_json::to_string(&PermKind::Repos).unwrap();
        assert_eq!(json, "\"repos\"");
        let back: PermKind = serde_json::from_str("\"files\"").unwrap();
        assert_eq!(back, PermKind::Unknown("files".to_string()));
    }
}
