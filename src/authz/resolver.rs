use super::Perms;
use crate::models::permissions::UserPermissions;

/// Anything the resolver can check against a user's authorized IDs.
///
/// ID 0 is reserved and never authorized.
pub trait RepoLike {
    fn id(&self) -> i32;
}

impl<T: RepoLike + ?Sized> RepoLike for &T {
    fn id(&self) -> i32 {
        (**self).id()
    }
}

/// A candidate repository paired with the permission granted on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoPerms<'a, R> {
    pub repo: &'a R,
    pub perms: Perms,
}

/// Returns the candidates whose IDs are present in `perms`, in input order.
///
/// Evaluation order:
/// 1. non-repository kind -> empty
/// 2. absent or empty ID set -> empty
/// 3. keep each candidate with a non-zero ID that is a member
///
/// Duplicate candidates are each tested and each kept.
pub fn authorized_repos<'a, R: RepoLike>(
    perms: &UserPermissions,
    candidates: &'a [R],
) -> Vec<RepoPerms<'a, R>> {
    if !perms.kind.is_repos() {
        tracing::debug!(
            user_id = perms.user_id,
            kind = %perms.kind,
            "permission kind cannot answer repository queries"
        );
        return Vec::new();
    }

    let ids = match perms.ids.as_ref() {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Vec::new(),
    };

    candidates
        .iter()
        .filter(|repo| match u32::try_from(repo.id()) {
            Ok(id) => id != 0 && ids.contains(id),
            Err(_) => false,
        })
        .map(|repo| RepoPerms {
            repo,
            perms: perms.perm,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{IdSet, PermKind, ProviderType};
    use crate::models::repo::Repo;
    use chrono::Utc;

    fn user_perms(kind: PermKind, ids: Option<IdSet>) -> UserPermissions {
        UserPermissions {
            user_id: 1,
            perm: Perms::Read,
            kind,
            ids,
            provider: ProviderType::Sourcegraph,
            updated_at: Utc::now(),
        }
    }

    fn repos(ids: &[i32]) -> Vec<Repo> {
        ids.iter().map(|id| Repo::new(*id, format!("repo-{id}"))).collect()
    }

    #[test]
    fn test_filters_in_candidate_order() {
        let perms = user_perms(PermKind::Repos, Some([2, 5].into_iter().collect()));
        let candidates = repos(&[0, 2, 3, 5]);

        let got = authorized_repos(&perms, &candidates);
        let ids: Vec<i32> = got.iter().map(|rp| rp.repo.id).collect();
        assert_eq!(ids, vec![2, 5]);
        assert!(got.iter().all(|rp| rp.perms == Perms::Read));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let perms = user_perms(PermKind::Repos, Some([2].into_iter().collect()));
        let candidates = repos(&[2, 2]);

        let got = authorized_repos(&perms, &candidates);
        assert_eq!(got.len(), 2);
        assert!(got.iter().all(|rp| rp.repo.id == 2));
    }

    #[test]
    fn test_other_kind_returns_empty() {
        let perms = user_perms(
            PermKind::Unknown("labels".to_string()),
            Some([1, 2, 3].into_iter().collect()),
        );
        assert!(authorized_repos(&perms, &repos(&[1, 2, 3])).is_empty());
    }

    #[test]
    fn test_absent_and_empty_ids_return_empty() {
        let absent = user_perms(PermKind::Repos, None);
        assert!(authorized_repos(&absent, &repos(&[1])).is_empty());

        let empty = user_perms(PermKind::Repos, Some(IdSet::new()));
        assert!(authorized_repos(&empty, &repos(&[1])).is_empty());
    }

    #[test]
    fn test_zero_and_negative_ids_never_match() {
        let perms = user_perms(PermKind::Repos, Some([0, 1].into_iter().collect()));
        let candidates = repos(&[0, -1, 1]);
        let got = authorized_repos(&perms, &candidates);
        let ids: Vec<i32> = got.iter().map(|rp| rp.repo.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_works_with_borrowed_candidates() {
        let perms = user_perms(PermKind::Repos, Some([9].into_iter().collect()));
        let owned = repos(&[8, 9]);
        let borrowed: Vec<&Repo> = owned.iter().collect();
        let got = authorized_repos(&perms, &borrowed);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].repo.id, 9);
    }
}
