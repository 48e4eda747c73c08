//! PostgreSQL repository resolver.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipegate_core::{CallContext, RepoFinder, RepoId, RepoRef, RepoState, Repository, ResolveError};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::{DbError, DbResult};

const SELECT_REPOSITORY: &str = r#"
    SELECT id, identifier, path, state, default_branch, created_at, updated_at
    FROM repositories
"#;

/// Database row for repositories.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RepositoryRow {
    pub id: Uuid,
    pub identifier: String,
    pub path: String,
    pub state: String,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RepositoryRow> for Repository {
    type Error = DbError;

    fn try_from(row: RepositoryRow) -> Result<Self, Self::Error> {
        let state: RepoState = row
            .state
            .parse()
            .map_err(|e: String| DbError::InvalidData(e))?;

        Ok(Repository {
            id: RepoId::from(row.id),
            identifier: row.identifier,
            path: row.path,
            state,
            default_branch: row.default_branch,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<DbError> for ResolveError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => ResolveError::NotFound(msg),
            other => ResolveError::Backend(other.to_string()),
        }
    }
}

/// Resolves repositories from the `repositories` table.
pub struct PgRepoFinder {
    pool: PgPool,
}

impl PgRepoFinder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: RepoId) -> DbResult<Repository> {
        let row = sqlx::query_as::<_, RepositoryRow>(&format!("{SELECT_REPOSITORY} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("repository {}", id)))?;
        row.try_into()
    }

    /// Paths match case-insensitively.
    pub async fn get_by_path(&self, path: &str) -> DbResult<Repository> {
        let row = sqlx::query_as::<_, RepositoryRow>(&format!(
            "{SELECT_REPOSITORY} WHERE LOWER(path) = LOWER($1)"
        ))
        .bind(path)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("repository with path {}", path)))?;
        row.try_into()
    }

    pub async fn find(&self, repo_ref: &RepoRef) -> DbResult<Repository> {
        match repo_ref {
            RepoRef::Id(id) => self.get_by_id(*id).await,
            RepoRef::Path(path) => self.get_by_path(path).await,
        }
    }
}

#[async_trait]
impl RepoFinder for PgRepoFinder {
    async fn find_by_ref(
        &self,
        _ctx: &CallContext,
        repo_ref: &RepoRef,
    ) -> Result<Arc<Repository>, ResolveError> {
        debug!(repo_ref = %repo_ref, "Resolving repository from database");
        let repo = self.find(repo_ref).await?;
        Ok(Arc::new(repo))
    }
}
