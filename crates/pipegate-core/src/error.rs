//! Error types for PipeGate.

use std::fmt;

use thiserror::Error;

use crate::permission::Permission;
use crate::repository::RepoState;

/// The step of the access gate an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStep {
    Resolve,
    CheckState,
    Authorize,
}

impl fmt::Display for GateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateStep::Resolve => write!(f, "resolve"),
            GateStep::CheckState => write!(f, "state check"),
            GateStep::Authorize => write!(f, "authorize"),
        }
    }
}

/// Failure of a repository resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("invalid repository reference: {0}")]
    InvalidRef(String),

    #[error("repository lookup failed: {0}")]
    Backend(String),

    #[error("repository lookup cancelled")]
    Cancelled,
}

/// Repository state does not allow the requested permission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("repository '{path}' is {state}: {permission} is not allowed")]
pub struct StateViolation {
    pub path: String,
    pub state: RepoState,
    pub permission: Permission,
}

/// Failure of an authorizer.
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("authorization backend failed: {0}")]
    Backend(String),
}

/// Errors returned by the access gate.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("failed to find repository by ref '{reference}': {source}")]
    Resolution {
        reference: String,
        #[source]
        source: ResolveError,
    },

    #[error(transparent)]
    StateViolation(#[from] StateViolation),

    /// Deliberately carries no cause: forbidden and not-found look the same.
    #[error("not authorized to {permission} pipeline '{pipeline}'")]
    Authorization {
        permission: Permission,
        pipeline: String,
    },

    #[error("cancelled during {step}")]
    Cancelled { step: GateStep },

    #[error("deadline exceeded during {step}")]
    DeadlineExceeded { step: GateStep },
}

/// Coarse classification of a gate failure, for request handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Forbidden,
    Cancelled,
    Timeout,
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::Resolution { .. } => ErrorKind::NotFound,
            GateError::StateViolation(_) => ErrorKind::InvalidState,
            GateError::Authorization { .. } => ErrorKind::Forbidden,
            GateError::Cancelled { .. } => ErrorKind::Cancelled,
            GateError::DeadlineExceeded { .. } => ErrorKind::Timeout,
        }
    }

    /// True for both explicit cancellation and deadline expiry.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            GateError::Cancelled { .. } | GateError::DeadlineExceeded { .. }
        )
    }

    /// The step that failed.
    pub fn step(&self) -> GateStep {
        match self {
            GateError::Resolution { .. } => GateStep::Resolve,
            GateError::StateViolation(_) => GateStep::CheckState,
            GateError::Authorization { .. } => GateStep::Authorize,
            GateError::Cancelled { step } | GateError::DeadlineExceeded { step } => *step,
        }
    }
}
