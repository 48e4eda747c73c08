//! Core domain types and the pipeline access gate for PipeGate.
//!
//! This crate contains:
//! - Repository identifiers, references and lifecycle states
//! - Sessions, permissions and the authorization seam
//! - The repository state policy
//! - The call context used for cancellation and deadlines
//! - The access gate that ties resolution, state and authorization together

pub mod authz;
pub mod context;
pub mod error;
pub mod gate;
pub mod id;
pub mod permission;
pub mod repository;
pub mod resolver;
pub mod session;
pub mod state;

pub use authz::{Authorizer, Resource, ResourceKind, Scope, check_pipeline};
pub use context::CallContext;
pub use error::{AuthzError, ErrorKind, GateError, GateStep, ResolveError, StateViolation};
pub use gate::AccessGate;
pub use id::RepoId;
pub use permission::{Permission, PermissionClass};
pub use repository::{RepoRef, RepoState, Repository};
pub use resolver::RepoFinder;
pub use session::{Principal, PrincipalKind, Session};
pub use state::{AllowedStates, RepoStatePolicy, StatePolicy, StateRules};
