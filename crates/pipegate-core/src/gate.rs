//! Scoped pipeline access gate.
//!
//! Every pipeline operation goes through [`AccessGate::check_pipeline_access`]
//! before touching executions: resolve the repository, check its lifecycle
//! state, then authorize the session on the pipeline. Each step must pass
//! before the next one starts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::authz::{Authorizer, check_pipeline};
use crate::context::CallContext;
use crate::error::{GateError, GateStep, ResolveError};
use crate::permission::Permission;
use crate::repository::{RepoRef, Repository};
use crate::resolver::RepoFinder;
use crate::session::Session;
use crate::state::{AllowedStates, RepoStatePolicy};

/// Guards pipeline operations. Cheap to share; holds no per-call state.
pub struct AccessGate {
    finder: Arc<dyn RepoFinder>,
    state_policy: Arc<dyn RepoStatePolicy>,
    authorizer: Arc<dyn Authorizer>,
    call_timeout: Option<Duration>,
}

impl AccessGate {
    pub fn new(
        finder: Arc<dyn RepoFinder>,
        state_policy: Arc<dyn RepoStatePolicy>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            finder,
            state_policy,
            authorizer,
            call_timeout: None,
        }
    }

    /// Bound every call to `timeout`, on top of any deadline the caller's context carries.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Resolve `repo_ref`, check its state admits `permission`, and check the
    /// session holds `permission` on `pipeline_identifier` inside it.
    ///
    /// Returns the resolver's repository handle unchanged on success.
    pub async fn check_pipeline_access(
        &self,
        ctx: &CallContext,
        session: &Session,
        repo_ref: &str,
        pipeline_identifier: &str,
        permission: Permission,
        allowed: &AllowedStates,
    ) -> Result<Arc<Repository>, GateError> {
        let ctx = match self.call_timeout {
            Some(timeout) => ctx.clone().with_timeout(timeout),
            None => ctx.clone(),
        };

        debug!(
            repo_ref,
            pipeline = pipeline_identifier,
            %permission,
            principal = %session.principal.uid,
            "Checking pipeline access"
        );

        let repo = self.resolve(&ctx, repo_ref).await?;

        ctx.run(
            self.state_policy
                .check_repo_state(&ctx, session, &repo, permission, allowed),
        )
        .await
        .map_err(|interrupted| interrupted.at(GateStep::CheckState))??;

        let decision = ctx
            .run(check_pipeline(
                &ctx,
                self.authorizer.as_ref(),
                session,
                &repo.path,
                pipeline_identifier,
                permission,
            ))
            .await
            .map_err(|interrupted| interrupted.at(GateStep::Authorize))?;

        if let Err(cause) = decision {
            warn!(
                repo = %repo.path,
                pipeline = pipeline_identifier,
                %permission,
                principal = %session.principal.uid,
                error = %cause,
                "Pipeline access denied"
            );
            return Err(GateError::Authorization {
                permission,
                pipeline: pipeline_identifier.to_string(),
            });
        }

        Ok(repo)
    }

    async fn resolve(
        &self,
        ctx: &CallContext,
        repo_ref: &str,
    ) -> Result<Arc<Repository>, GateError> {
        ctx.check()
            .map_err(|interrupted| interrupted.at(GateStep::Resolve))?;

        let resolution = |source| GateError::Resolution {
            reference: repo_ref.to_string(),
            source,
        };

        let parsed = RepoRef::parse(repo_ref).map_err(resolution)?;
        let found = ctx
            .run(self.finder.find_by_ref(ctx, &parsed))
            .await
            .map_err(|interrupted| interrupted.at(GateStep::Resolve))?;

        match found {
            Ok(repo) => Ok(repo),
            Err(ResolveError::Cancelled) => Err(GateError::Cancelled {
                step: GateStep::Resolve,
            }),
            Err(source) => {
                info!(repo_ref, error = %source, "Failed to find repository by ref");
                Err(resolution(source))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{Resource, Scope};
    use crate::error::{AuthzError, ErrorKind, StateViolation};
    use crate::id::RepoId;
    use crate::repository::RepoState;
    use crate::session::{Principal, PrincipalKind};
    use crate::state::StatePolicy;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn repository(path: &str, state: RepoState) -> Arc<Repository> {
        Arc::new(Repository {
            id: RepoId::new(),
            identifier: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            state,
            default_branch: "main".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        })
    }

    fn session() -> Session {
        Session::new(Principal {
            id: 42,
            uid: "alice".to_string(),
            kind: PrincipalKind::User,
        })
    }

    #[derive(Default)]
    struct StubFinder {
        repos: HashMap<String, Arc<Repository>>,
        hang: bool,
        cancelled: bool,
        cancel_caller: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RepoFinder for StubFinder {
        async fn find_by_ref(
            &self,
            ctx: &CallContext,
            repo_ref: &RepoRef,
        ) -> Result<Arc<Repository>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.cancel_caller {
                ctx.cancel();
            }
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.cancelled {
                return Err(ResolveError::Cancelled);
            }
            self.repos
                .get(&repo_ref.to_string())
                .cloned()
                .ok_or_else(|| ResolveError::NotFound(repo_ref.to_string()))
        }
    }

    #[derive(Default)]
    struct CountingPolicy {
        inner: StatePolicy,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RepoStatePolicy for CountingPolicy {
        async fn check_repo_state(
            &self,
            ctx: &CallContext,
            session: &Session,
            repo: &Repository,
            permission: Permission,
            allowed: &AllowedStates,
        ) -> Result<(), StateViolation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner
                .check_repo_state(ctx, session, repo, permission, allowed)
                .await
        }
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Allow,
        Deny,
        PipelineMissing,
        Hang,
    }

    struct StubAuthorizer {
        outcome: Outcome,
        calls: AtomicUsize,
    }

    impl StubAuthorizer {
        fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Authorizer for StubAuthorizer {
        async fn check(
            &self,
            _ctx: &CallContext,
            _session: &Session,
            _scope: &Scope,
            resource: &Resource,
            _permission: Permission,
        ) -> Result<bool, AuthzError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcome {
                Outcome::Allow => Ok(true),
                Outcome::Deny => Ok(false),
                Outcome::PipelineMissing => {
                    Err(AuthzError::NotFound(format!("pipeline {}", resource.identifier)))
                }
                Outcome::Hang => std::future::pending().await,
            }
        }
    }

    struct Harness {
        finder: Arc<StubFinder>,
        policy: Arc<CountingPolicy>,
        authorizer: Arc<StubAuthorizer>,
        gate: AccessGate,
    }

    impl Harness {
        fn new(finder: StubFinder, outcome: Outcome) -> Self {
            let finder = Arc::new(finder);
            let policy = Arc::new(CountingPolicy::default());
            let authorizer = Arc::new(StubAuthorizer::new(outcome));
            let gate = AccessGate::new(finder.clone(), policy.clone(), authorizer.clone());
            Self {
                finder,
                policy,
                authorizer,
                gate,
            }
        }

        fn with_repo(repo: Arc<Repository>, outcome: Outcome) -> Self {
            let mut finder = StubFinder::default();
            finder.repos.insert(repo.path.clone(), repo);
            Self::new(finder, outcome)
        }

        fn calls(&self) -> (usize, usize, usize) {
            (
                self.finder.calls.load(Ordering::SeqCst),
                self.policy.calls.load(Ordering::SeqCst),
                self.authorizer.calls.load(Ordering::SeqCst),
            )
        }

        async fn check(
            &self,
            ctx: &CallContext,
            repo_ref: &str,
            permission: Permission,
            allowed: &AllowedStates,
        ) -> Result<Arc<Repository>, GateError> {
            self.gate
                .check_pipeline_access(ctx, &session(), repo_ref, "build", permission, allowed)
                .await
        }
    }

    #[tokio::test]
    async fn test_missing_repository_stops_at_resolution() {
        let harness = Harness::new(StubFinder::default(), Outcome::Allow);

        let err = harness
            .check(
                &CallContext::new(),
                "missing/repo",
                Permission::PipelineView,
                &AllowedStates::unrestricted(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GateError::Resolution {
                source: ResolveError::NotFound(_),
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(harness.calls(), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_invalid_reference_never_reaches_finder() {
        let harness = Harness::new(StubFinder::default(), Outcome::Allow);

        let err = harness
            .check(
                &CallContext::new(),
                "/",
                Permission::PipelineView,
                &AllowedStates::unrestricted(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GateError::Resolution {
                source: ResolveError::InvalidRef(_),
                ..
            }
        ));
        assert_eq!(harness.calls(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_archived_repo_rejects_execute_before_authorization() {
        let harness = Harness::with_repo(
            repository("org/repo1", RepoState::Archived),
            Outcome::Allow,
        );

        let err = harness
            .check(
                &CallContext::new(),
                "org/repo1",
                Permission::PipelineExecute,
                &AllowedStates::of(&[RepoState::Active]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::StateViolation(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(harness.calls(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_unauthorized_session_is_rejected() {
        let harness = Harness::with_repo(repository("org/repo1", RepoState::Active), Outcome::Deny);

        let err = harness
            .check(
                &CallContext::new(),
                "org/repo1",
                Permission::PipelineView,
                &AllowedStates::unrestricted(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GateError::Authorization { .. }));
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(harness.calls(), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_denial_does_not_reveal_pipeline_existence() {
        let repo = repository("org/repo1", RepoState::Active);
        let denied = Harness::with_repo(repo.clone(), Outcome::Deny);
        let missing = Harness::with_repo(repo, Outcome::PipelineMissing);
        let ctx = CallContext::new();
        let allowed = AllowedStates::unrestricted();

        let denied = denied
            .check(&ctx, "org/repo1", Permission::PipelineExecute, &allowed)
            .await
            .unwrap_err();
        let missing = missing
            .check(&ctx, "org/repo1", Permission::PipelineExecute, &allowed)
            .await
            .unwrap_err();

        assert_eq!(denied.to_string(), missing.to_string());
        assert_eq!(denied.kind(), missing.kind());
        assert!(std::error::Error::source(&missing).is_none());
    }

    #[tokio::test]
    async fn test_success_returns_resolved_repository() {
        let repo = repository("org/repo1", RepoState::Active);
        let harness = Harness::with_repo(repo.clone(), Outcome::Allow);

        let found = harness
            .check(
                &CallContext::new(),
                "org/repo1",
                Permission::PipelineExecute,
                &AllowedStates::unrestricted(),
            )
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&found, &repo));
        assert_eq!(*found, *repo);
        assert_eq!(harness.calls(), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let harness =
            Harness::with_repo(repository("org/repo1", RepoState::Active), Outcome::Allow);
        let ctx = CallContext::new();
        ctx.cancel();

        let err = harness
            .check(
                &ctx,
                "org/repo1",
                Permission::PipelineView,
                &AllowedStates::unrestricted(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GateError::Cancelled {
                step: GateStep::Resolve
            }
        ));
        assert_eq!(harness.calls(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_cancelled_after_resolution_skips_state_check() {
        let repo = repository("org/repo1", RepoState::Active);
        let mut finder = StubFinder {
            cancel_caller: true,
            ..Default::default()
        };
        finder.repos.insert(repo.path.clone(), repo);
        let harness = Harness::new(finder, Outcome::Allow);
        let ctx = CallContext::new();

        let err = harness
            .check(
                &ctx,
                "org/repo1",
                Permission::PipelineView,
                &AllowedStates::unrestricted(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GateError::Cancelled {
                step: GateStep::CheckState
            }
        ));
        assert!(ctx.is_cancelled());
        assert_eq!(harness.calls(), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_cancelled_while_authorizing() {
        let harness = Harness::with_repo(repository("org/repo1", RepoState::Active), Outcome::Hang);
        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = harness
            .check(
                &ctx,
                "org/repo1",
                Permission::PipelineExecute,
                &AllowedStates::unrestricted(),
            )
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(err.step(), GateStep::Authorize);
        assert_eq!(harness.calls(), (1, 1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_aborts_slow_resolution() {
        let finder = StubFinder {
            hang: true,
            ..Default::default()
        };
        let mut harness = Harness::new(finder, Outcome::Allow);
        harness.gate = AccessGate::new(
            harness.finder.clone(),
            harness.policy.clone(),
            harness.authorizer.clone(),
        )
        .with_call_timeout(Duration::from_millis(100));

        let err = harness
            .check(
                &CallContext::new(),
                "org/repo1",
                Permission::PipelineView,
                &AllowedStates::unrestricted(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GateError::DeadlineExceeded {
                step: GateStep::Resolve
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(harness.calls(), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_resolver_cancellation_is_not_a_resolution_failure() {
        let finder = StubFinder {
            cancelled: true,
            ..Default::default()
        };
        let harness = Harness::new(finder, Outcome::Allow);

        let err = harness
            .check(
                &CallContext::new(),
                "org/repo1",
                Permission::PipelineView,
                &AllowedStates::unrestricted(),
            )
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(harness.calls(), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_concurrent_checks_are_independent() {
        let mut finder = StubFinder::default();
        for i in 0..8 {
            let repo = repository(&format!("org/repo{}", i), RepoState::Active);
            finder.repos.insert(repo.path.clone(), repo);
        }
        let harness = Arc::new(Harness::new(finder, Outcome::Allow));

        let mut handles = Vec::new();
        for i in 0..8 {
            let harness = harness.clone();
            handles.push(tokio::spawn(async move {
                harness
                    .check(
                        &CallContext::new(),
                        &format!("org/repo{}", i),
                        Permission::PipelineView,
                        &AllowedStates::unrestricted(),
                    )
                    .await
                    .map(|repo| repo.path.clone())
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap().unwrap(), format!("org/repo{}", i));
        }
        assert_eq!(harness.calls(), (8, 8, 8));
    }
}
