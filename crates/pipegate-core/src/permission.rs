//! Permissions requested against pipelines.

use serde::{Deserialize, Serialize};

/// An operation a session asks to perform on a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "pipeline:view")]
    PipelineView,
    #[serde(rename = "pipeline:edit")]
    PipelineEdit,
    #[serde(rename = "pipeline:delete")]
    PipelineDelete,
    #[serde(rename = "pipeline:execute")]
    PipelineExecute,
}

/// Whether a permission only reads or also changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionClass {
    Read,
    Write,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::PipelineView,
        Permission::PipelineEdit,
        Permission::PipelineDelete,
        Permission::PipelineExecute,
    ];

    pub fn class(&self) -> PermissionClass {
        match self {
            Permission::PipelineView => PermissionClass::Read,
            Permission::PipelineEdit | Permission::PipelineDelete | Permission::PipelineExecute => {
                PermissionClass::Write
            }
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::PipelineView => write!(f, "pipeline:view"),
            Permission::PipelineEdit => write!(f, "pipeline:edit"),
            Permission::PipelineDelete => write!(f, "pipeline:delete"),
            Permission::PipelineExecute => write!(f, "pipeline:execute"),
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    /// Accepts both the qualified form (`pipeline:view`) and the bare verb (`view`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let verb = lower.strip_prefix("pipeline:").unwrap_or(&lower);
        match verb {
            "view" => Ok(Permission::PipelineView),
            "edit" => Ok(Permission::PipelineEdit),
            "delete" => Ok(Permission::PipelineDelete),
            "execute" => Ok(Permission::PipelineExecute),
            _ => Err(format!("Unknown permission: {}", s)),
        }
    }
}

impl std::fmt::Display for PermissionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionClass::Read => write!(f, "read"),
            PermissionClass::Write => write!(f, "write"),
        }
    }
}

impl std::str::FromStr for PermissionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(PermissionClass::Read),
            "write" => Ok(PermissionClass::Write),
            _ => Err(format!("Unknown permission class: {}", s)),
        }
    }
}
