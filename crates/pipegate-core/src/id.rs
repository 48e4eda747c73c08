//! Repository identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of a repository, independent of its (renameable) path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct RepoId(Uuid);

impl RepoId {
    /// Allocate a fresh, time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RepoId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RepoId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RepoId> for Uuid {
    fn from(id: RepoId) -> Self {
        id.0
    }
}

impl std::str::FromStr for RepoId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
