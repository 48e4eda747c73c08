//! The authenticated caller.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    ServiceAccount,
    Service,
}

/// The identity a session acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: i64,
    pub uid: String,
    pub kind: PrincipalKind,
}

/// An authenticated session. Validity is established before it reaches the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub principal: Principal,
}

impl Session {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }
}
