use chrono::TimeDelta;

use crate::errors::{PermsError, PermsResult};

const DEFAULT_TTL_SECS: i64 = 600;

/// Runtime settings, read from the environment (`.env` is honoured by the binary).
#[derive(Debug, Clone)]
pub struct PermsConfig {
    pub database_url: String,
    /// How long a user's snapshot is trusted before it must be re-synced
    pub user_ttl: TimeDelta,
    /// How long a repository's snapshot is trusted before it must be re-synced
    pub repo_ttl: TimeDelta,
}

impl PermsConfig {
    pub fn from_env() -> PermsResult<Self> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| PermsError::configuration("DATABASE_URL not set"))?;

        Ok(Self {
            database_url,
            user_ttl: ttl_from_var("USER_PERMS_TTL_SECS", std::env::var("USER_PERMS_TTL_SECS").ok())?,
            repo_ttl: ttl_from_var("REPO_PERMS_TTL_SECS", std::env::var("REPO_PERMS_TTL_SECS").ok())?,
        })
    }

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            user_ttl: TimeDelta::seconds(DEFAULT_TTL_SECS),
            repo_ttl: TimeDelta::seconds(DEFAULT_TTL_SECS),
        }
    }

    pub fn with_user_ttl(mut self, ttl: TimeDelta) -> Self {
        self.user_ttl = ttl;
        self
    }

    pub fn with_repo_ttl(mut self, ttl: TimeDelta) -> Self {
        self.repo_ttl = ttl;
        self
    }
}

fn ttl_from_var(name: &str, value: Option<String>) -> PermsResult<TimeDelta> {
    let secs = match value {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|secs| *secs >= 0)
            .ok_or_else(|| PermsError::configuration(format!("{name} must be a non-negative integer")))?,
        None => DEFAULT_TTL_SECS,
    };

    TimeDelta::try_seconds(secs)
        .ok_or_else(|| PermsError::configuration(format!("{name} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_defaults_when_unset() {
        let ttl = ttl_from_var("USER_PERMS_TTL_SECS", None).unwrap();
        assert_eq!(ttl, TimeDelta::seconds(600));
    }

    #[test]
    fn test_ttl_parses_seconds() {
        let ttl = ttl_from_var("USER_PERMS_TTL_SECS", Some(" 30 ".to_string())).unwrap();
        assert_eq!(ttl, TimeDelta::seconds(30));
    }

    #[test]
    fn test_ttl_rejects_malformed_values() {
        for raw in ["abc", "-5", "1.5", ""] {
            let err = ttl_from_var("REPO_PERMS_TTL_SECS", Some(raw.to_string())).unwrap_err();
            assert!(matches!(err, PermsError::Configuration(_)), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_builder_overrides_ttls() {
        let config = PermsConfig::new("sqlite::memory:")
            .with_user_ttl(TimeDelta::seconds(1))
            .with_repo_ttl(TimeDelta::seconds(2));
        assert_eq!(config.user_ttl, TimeDelta::seconds(1));
        assert_eq!(config.repo_ttl, TimeDelta::seconds(2));
    }
}
