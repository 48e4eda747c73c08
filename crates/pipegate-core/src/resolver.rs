//! Repository resolution seam.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::ResolveError;
use crate::repository::{RepoRef, Repository};

/// Looks up repositories by reference.
///
/// Implementations may cache; the returned handle is shared and must not be
/// mutated by callers.
#[async_trait]
pub trait RepoFinder: Send + Sync {
    /// Fails with [`ResolveError::NotFound`] when nothing matches.
    async fn find_by_ref(
        &self,
        ctx: &CallContext,
        repo_ref: &RepoRef,
    ) -> Result<Arc<Repository>, ResolveError>;
}
