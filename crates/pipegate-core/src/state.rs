//! Repository state policy.
//!
//! Decides whether a repository's lifecycle state admits a permission. The
//! caller may narrow the acceptable states per call with [`AllowedStates`];
//! an empty set defers to [`StateRules::default_states`].

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::debug;

use crate::context::CallContext;
use crate::error::StateViolation;
use crate::permission::{Permission, PermissionClass};
use crate::repository::{RepoState, Repository};
use crate::session::Session;

/// Finite set of repository states a caller accepts for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedStates(BTreeSet<RepoState>);

impl AllowedStates {
    /// No restriction: the policy's default set applies.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn of(states: &[RepoState]) -> Self {
        states.iter().copied().collect()
    }

    pub fn contains(&self, state: RepoState) -> bool {
        self.0.contains(&state)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RepoState> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<RepoState> for AllowedStates {
    fn from_iter<I: IntoIterator<Item = RepoState>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Checks a repository's state against a requested permission.
#[async_trait]
pub trait RepoStatePolicy: Send + Sync {
    async fn check_repo_state(
        &self,
        ctx: &CallContext,
        session: &Session,
        repo: &Repository,
        permission: Permission,
        allowed: &AllowedStates,
    ) -> Result<(), StateViolation>;
}

/// Which states are acceptable by default and which permission classes each admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRules {
    default_states: AllowedStates,
    permits: BTreeMap<RepoState, BTreeSet<PermissionClass>>,
}

impl Default for StateRules {
    /// Active and archived repositories are acceptable unless the caller says
    /// otherwise. Archived repositories are read-only; every other state
    /// admits both classes once the caller accepts it.
    fn default() -> Self {
        let both = BTreeSet::from([PermissionClass::Read, PermissionClass::Write]);
        let read_only = BTreeSet::from([PermissionClass::Read]);

        Self {
            default_states: AllowedStates::of(&[RepoState::Active, RepoState::Archived]),
            permits: BTreeMap::from([
                (RepoState::Active, both.clone()),
                (RepoState::Archived, read_only),
                (RepoState::Importing, both.clone()),
                (RepoState::Migrating, both),
            ]),
        }
    }
}

impl StateRules {
    pub fn default_states(&self) -> &AllowedStates {
        &self.default_states
    }

    pub fn set_default_states(&mut self, states: AllowedStates) {
        self.default_states = states;
    }

    pub fn set_permits(
        &mut self,
        state: RepoState,
        classes: impl IntoIterator<Item = PermissionClass>,
    ) {
        self.permits.insert(state, classes.into_iter().collect());
    }

    pub fn permits(&self, state: RepoState, class: PermissionClass) -> bool {
        self.permits
            .get(&state)
            .is_some_and(|classes| classes.contains(&class))
    }

    /// The caller's set if it names any state, otherwise the default set.
    pub fn accepted<'a>(&'a self, allowed: &'a AllowedStates) -> &'a AllowedStates {
        if allowed.is_empty() {
            &self.default_states
        } else {
            allowed
        }
    }

    pub fn evaluate(
        &self,
        repo: &Repository,
        permission: Permission,
        allowed: &AllowedStates,
    ) -> Result<(), StateViolation> {
        let accepted = self.accepted(allowed).contains(repo.state);
        if accepted && self.permits(repo.state, permission.class()) {
            return Ok(());
        }

        debug!(
            repo = %repo.path,
            state = %repo.state,
            %permission,
            accepted,
            "Repository state rejects permission"
        );
        Err(StateViolation {
            path: repo.path.clone(),
            state: repo.state,
            permission,
        })
    }
}

/// The rule-driven [`RepoStatePolicy`].
#[derive(Debug, Clone, Default)]
pub struct StatePolicy {
    rules: StateRules,
}

impl StatePolicy {
    pub fn new(rules: StateRules) -> Self {
        Self { rules }
    }
}

#[async_trait]
impl RepoStatePolicy for StatePolicy {
    async fn check_repo_state(
        &self,
        _ctx: &CallContext,
        _session: &Session,
        repo: &Repository,
        permission: Permission,
        allowed: &AllowedStates,
    ) -> Result<(), StateViolation> {
        self.rules.evaluate(repo, permission, allowed)
    }
}
