//! Authorization seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::CallContext;
use crate::error::AuthzError;
use crate::permission::Permission;
use crate::session::Session;

/// Where a resource lives: the parent space path and the repository inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub space_path: String,
    pub repo: String,
}

impl Scope {
    /// Split a repository path into its parent space and its last segment.
    ///
    /// `org/team/repo1` becomes space `org/team`, repo `repo1`. A path with no
    /// separator has an empty space path.
    pub fn for_repo_path(repo_path: &str) -> Self {
        match repo_path.rsplit_once('/') {
            Some((space, repo)) => Self {
                space_path: space.to_string(),
                repo: repo.to_string(),
            },
            None => Self {
                space_path: String::new(),
                repo: repo_path.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pipeline,
}

/// The object a permission is requested on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub identifier: String,
}

impl Resource {
    pub fn pipeline(identifier: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Pipeline,
            identifier: identifier.into(),
        }
    }
}

/// Decides whether a session may exercise a permission on a scoped resource.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// `Ok(false)` is a clean denial; `Err` means no decision could be made.
    async fn check(
        &self,
        ctx: &CallContext,
        session: &Session,
        scope: &Scope,
        resource: &Resource,
        permission: Permission,
    ) -> Result<bool, AuthzError>;
}

/// Check `permission` on the pipeline `pipeline_identifier` of the repository at `repo_path`.
pub async fn check_pipeline(
    ctx: &CallContext,
    authorizer: &dyn Authorizer,
    session: &Session,
    repo_path: &str,
    pipeline_identifier: &str,
    permission: Permission,
) -> Result<(), AuthzError> {
    let scope = Scope::for_repo_path(repo_path);
    let resource = Resource::pipeline(pipeline_identifier);

    if authorizer
        .check(ctx, session, &scope, &resource, permission)
        .await?
    {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(format!(
            "{} lacks {} on {}/{}",
            session.principal.uid, permission, repo_path, pipeline_identifier
        )))
    }
}
