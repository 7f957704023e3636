use chrono::{DateTime, TimeDelta, Utc};

use crate::authz::{self, Field, IdSet, PermKind, Perms, ProviderType, RepoLike, RepoPerms, TracingFields};

/// Behaviour shared by every permission snapshot.
///
/// Records are immutable once built; a refresh produces a new record.
pub trait PermissionsRecord: TracingFields {
    fn updated_at(&self) -> DateTime<Utc>;

    /// The authorized ID set, `None` when nothing has been synced yet.
    fn id_set(&self) -> Option<&IdSet>;

    /// Returns true if this record has outlived `ttl` at `now`.
    fn expired(&self, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
        authz::is_expired(self.updated_at(), ttl, now)
    }

    /// Emits the record's diagnostics fields as a debug event.
    fn trace(&self, message: &str) {
        let fields = authz::render_fields(&self.tracing_fields());
        tracing::debug!(fields = %fields, "{}", message);
    }
}

// =============================================================================
// USER PERMISSIONS
// =============================================================================

/// Object IDs of `kind` a user may perform `perm` on, as reported by `provider`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPermissions {
    pub user_id: i32,
    pub perm: Perms,
    pub kind: PermKind,
    pub ids: Option<IdSet>,
    pub provider: ProviderType,
    pub updated_at: DateTime<Utc>,
}

impl UserPermissions {
    /// A record with no synced data yet.
    pub fn new(user_id: i32, perm: Perms, kind: PermKind) -> Self {
        Self {
            user_id,
            perm,
            kind,
            ids: None,
            provider: ProviderType::default(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn with_ids(mut self, ids: IdSet, updated_at: DateTime<Utc>) -> Self {
        self.ids = Some(ids);
        self.updated_at = updated_at;
        self
    }

    pub fn with_provider(mut self, provider: ProviderType) -> Self {
        self.provider = provider;
        self
    }

    pub fn authorized_repos<'a, R: RepoLike>(&self, repos: &'a [R]) -> Vec<RepoPerms<'a, R>> {
        authz::authorized_repos(self, repos)
    }
}

impl TracingFields for UserPermissions {
    fn record_type() -> &'static str {
        "user_permissions"
    }

    fn tracing_fields(&self) -> Vec<Field> {
        let prefix = Self::record_type();
        let mut fields = vec![
            Field::int32(format!("{prefix}.user_id"), self.user_id),
            Field::string(format!("{prefix}.perm"), self.perm.as_str()),
            Field::string(format!("{prefix}.kind"), self.kind.as_str()),
            Field::string(format!("{prefix}.provider"), self.provider.as_str()),
        ];

        if let Some(ids) = &self.ids {
            fields.push(Field::uint64(format!("{prefix}.ids.count"), ids.cardinality()));
            fields.push(Field::string(format!("{prefix}.updated_at"), self.updated_at.to_rfc3339()));
        }

        fields
    }
}

impl PermissionsRecord for UserPermissions {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn id_set(&self) -> Option<&IdSet> {
        self.ids.as_ref()
    }
}

// =============================================================================
// REPO PERMISSIONS
// =============================================================================

/// User IDs allowed to perform `perm` on a repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoPermissions {
    pub repo_id: i32,
    pub perm: Perms,
    pub user_ids: Option<IdSet>,
    pub provider: ProviderType,
    pub updated_at: DateTime<Utc>,
}

impl RepoPermissions {
    pub fn new(repo_id: i32, perm: Perms) -> Self {
        Self {
            repo_id,
            perm,
            user_ids: None,
            provider: ProviderType::default(),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn with_user_ids(mut self, user_ids: IdSet, updated_at: DateTime<Utc>) -> Self {
        self.user_ids = Some(user_ids);
        self.updated_at = updated_at;
        self
    }

    pub fn with_provider(mut self, provider: ProviderType) -> Self {
        self.provider = provider;
        self
    }

    pub fn allows_user(&self, user_id: i32) -> bool {
        match (self.user_ids.as_ref(), u32::try_from(user_id)) {
            (Some(ids), Ok(id)) => id != 0 && ids.contains(id),
            _ => false,
        }
    }
}

impl TracingFields for RepoPermissions {
    fn record_type() -> &'static str {
        "repo_permissions"
    }

    fn tracing_fields(&self) -> Vec<Field> {
        let prefix = Self::record_type();
        let mut fields = vec![
            Field::int32(format!("{prefix}.repo_id"), self.repo_id),
            Field::string(format!("{prefix}.perm"), self.perm.as_str()),
            Field::string(format!("{prefix}.provider"), self.provider.as_str()),
        ];

        if let Some(ids) = &self.user_ids {
            fields.push(Field::uint64(format!("{prefix}.user_ids.count"), ids.cardinality()));
            fields.push(Field::string(format!("{prefix}.updated_at"), self.updated_at.to_rfc3339()));
        }

        fields
    }
}

impl PermissionsRecord for RepoPermissions {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn id_set(&self) -> Option<&IdSet> {
        self.user_ids.as_ref()
    }
}

// =============================================================================
// USER PENDING PERMISSIONS
// =============================================================================

/// Permissions held by a user that exists on the code host but has not been
/// created locally yet. `bind_id` (username or email) maps the stub to the
/// real user once it is created.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPendingPermissions {
    pub id: i32,
    pub bind_id: String,
    pub perm: Perms,
    pub kind: PermKind,
    pub ids: Option<IdSet>,
    pub updated_at: DateTime<Utc>,
}

impl UserPendingPermissions {
    pub fn new(bind_id: impl Into<String>, perm: Perms, kind: PermKind) -> Self {
        Self {
            id: 0,
            bind_id: bind_id.into(),
            perm,
            kind,
            ids: None,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    pub fn with_ids(mut self, ids: IdSet, updated_at: DateTime<Utc>) -> Self {
        self.ids = Some(ids);
        self.updated_at = updated_at;
        self
    }
}

impl TracingFields for UserPendingPermissions {
    fn record_type() -> &'static str {
        "user_pending_permissions"
    }

    fn tracing_fields(&self) -> Vec<Field> {
        let prefix = Self::record_type();
        let mut fields = vec![
            Field::int32(format!("{prefix}.id"), self.id),
            Field::string(format!("{prefix}.bind_id"), self.bind_id.as_str()),
            Field::string(format!("{prefix}.perm"), self.perm.as_str()),
            Field::string(format!("{prefix}.kind"), self.kind.as_str()),
        ];

        if let Some(ids) = &self.ids {
            fields.push(Field::uint64(format!("{prefix}.ids.count"), ids.cardinality()));
            fields.push(Field::string(format!("{prefix}.updated_at"), self.updated_at.to_rfc3339()));
        }

        fields
    }
}

impl PermissionsRecord for UserPendingPermissions {
    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn id_set(&self) -> Option<&IdSet> {
        self.ids.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::FieldValue;
    use chrono::TimeZone;

    fn names(fields: &[Field]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_user_fields_without_ids() {
        let p = UserPermissions::new(7, Perms::Read, PermKind::Repos);
        assert_eq!(
            names(&p.tracing_fields()),
            vec![
                "user_permissions.user_id",
                "user_permissions.perm",
                "user_permissions.kind",
                "user_permissions.provider",
            ]
        );
    }

    #[test]
    fn test_user_fields_with_empty_ids() {
        let p = UserPermissions::new(7, Perms::Read, PermKind::Repos).with_ids(IdSet::new(), t0());
        let fields = p.tracing_fields();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[4], Field::uint64("user_permissions.ids.count", 0));
        assert_eq!(
            fields[5].value,
            FieldValue::Str("2024-03-01T12:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_repo_fields() {
        let p = RepoPermissions::new(3, Perms::Write).with_provider(ProviderType::GitLab);
        let fields = p.tracing_fields();
        assert_eq!(
            names(&fields),
            vec!["repo_permissions.repo_id", "repo_permissions.perm", "repo_permissions.provider"]
        );
        assert_eq!(fields[2].value, FieldValue::Str("gitlab".to_string()));

        let p = p.with_user_ids([1, 2, 3].into_iter().collect(), t0());
        let fields = p.tracing_fields();
        assert_eq!(fields[3], Field::uint64("repo_permissions.user_ids.count", 3));
        assert_eq!(fields[4].name, "repo_permissions.updated_at");
    }

    #[test]
    fn test_pending_fields() {
        let mut p = UserPendingPermissions::new("alice", Perms::Read, PermKind::Repos);
        p.id = 11;
        let fields = p.tracing_fields();
        assert_eq!(fields[0], Field::int32("user_pending_permissions.id", 11));
        assert_eq!(fields[1], Field::string("user_pending_permissions.bind_id", "alice"));
        assert_eq!(fields.len(), 4);

        let p = p.with_ids([5].into_iter().collect(), t0());
        assert_eq!(p.tracing_fields().len(), 6);
    }

    #[test]
    fn test_projection_does_not_mutate() {
        let p = UserPermissions::new(1, Perms::Read, PermKind::Repos).with_ids([1].into_iter().collect(), t0());
        let before = p.clone();
        let _ = p.tracing_fields();
        p.trace("inspect");
        assert_eq!(p, before);
    }

    #[test]
    fn test_expired_shared_by_all_records() {
        let ttl = TimeDelta::minutes(5);
        let user = UserPermissions::new(1, Perms::Read, PermKind::Repos).with_ids(IdSet::new(), t0());
        let repo = RepoPermissions::new(1, Perms::Read).with_user_ids(IdSet::new(), t0());
        let pending = UserPendingPermissions::new("bob", Perms::Read, PermKind::Repos).with_ids(IdSet::new(), t0());

        let at_boundary = t0() + ttl;
        let just_before = at_boundary - TimeDelta::nanoseconds(1);
        assert!(user.expired(ttl, at_boundary) && !user.expired(ttl, just_before));
        assert!(repo.expired(ttl, at_boundary) && !repo.expired(ttl, just_before));
        assert!(pending.expired(ttl, at_boundary) && !pending.expired(ttl, just_before));
    }

    #[test]
    fn test_repo_allows_user() {
        let p = RepoPermissions::new(1, Perms::Read).with_user_ids([4].into_iter().collect(), t0());
        assert!(p.allows_user(4));
        assert!(!p.allows_user(5));
        assert!(!p.allows_user(-4));
        assert!(!RepoPermissions::new(1, Perms::Read).allows_user(4));
    }
}
