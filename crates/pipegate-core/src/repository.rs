//! Repository types: lifecycle states, references and the resolved entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::id::RepoId;

/// Lifecycle state of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoState {
    Active,
    Archived,
    Importing,
    Migrating,
}

impl RepoState {
    pub const ALL: [RepoState; 4] = [
        RepoState::Active,
        RepoState::Archived,
        RepoState::Importing,
        RepoState::Migrating,
    ];
}

impl std::fmt::Display for RepoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoState::Active => write!(f, "active"),
            RepoState::Archived => write!(f, "archived"),
            RepoState::Importing => write!(f, "importing"),
            RepoState::Migrating => write!(f, "migrating"),
        }
    }
}

impl std::str::FromStr for RepoState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(RepoState::Active),
            "archived" => Ok(RepoState::Archived),
            "importing" => Ok(RepoState::Importing),
            "migrating" => Ok(RepoState::Migrating),
            _ => Err(format!("Unknown repository state: {}", s)),
        }
    }
}

/// A resolved repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepoId,
    /// Last path segment, unique within the parent space.
    pub identifier: String,
    /// Full path including parent spaces, e.g. `org/repo1`.
    pub path: String,
    pub state: RepoState,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a caller refers to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RepoRef {
    Id(RepoId),
    Path(String),
}

impl RepoRef {
    /// Parse a caller-supplied reference.
    ///
    /// Anything that parses as a UUID is treated as an id, everything else as
    /// a path. Surrounding slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(ResolveError::InvalidRef(raw.to_string()));
        }
        if let Ok(id) = trimmed.parse::<RepoId>() {
            return Ok(RepoRef::Id(id));
        }
        Ok(RepoRef::Path(trimmed.to_string()))
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoRef::Id(id) => write!(f, "{}", id),
            RepoRef::Path(path) => write!(f, "{}", path),
        }
    }
}
