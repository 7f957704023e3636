use crate::authz::RepoLike;

/// Minimal repository entity as returned by a repository listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    pub id: i32,
    pub name: String,
}

impl Repo {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

impl RepoLike for Repo {
    fn id(&self) -> i32 {
        self.id
    }
}
