//! Gate configuration parsing.
//!
//! ```kdl
//! gate {
//!     call-timeout-ms 5000
//! }
//! states {
//!     default "active" "archived"
//!     state "archived" permits="read"
//!     state "importing" permits="read" permits="write"
//! }
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use kdl::{KdlDocument, KdlNode};
use pipegate_core::{
    AccessGate, AllowedStates, Authorizer, PermissionClass, RepoFinder, RepoState, StatePolicy,
    StateRules,
};
use tracing::debug;

use crate::{ConfigError, ConfigResult};

/// Settings for an [`AccessGate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateConfig {
    /// Upper bound for one gate call. `None` leaves it to the caller's context.
    pub call_timeout: Option<Duration>,
    pub state_rules: StateRules,
}

impl GateConfig {
    pub fn state_policy(&self) -> StatePolicy {
        StatePolicy::new(self.state_rules.clone())
    }

    /// Wire a gate from this configuration and the given collaborators.
    pub fn build_gate(
        &self,
        finder: Arc<dyn RepoFinder>,
        authorizer: Arc<dyn Authorizer>,
    ) -> AccessGate {
        let gate = AccessGate::new(finder, Arc::new(self.state_policy()), authorizer);
        match self.call_timeout {
            Some(timeout) => gate.with_call_timeout(timeout),
            None => gate,
        }
    }
}

/// Read and parse a gate configuration file.
pub fn load_gate_config(path: impl AsRef<Path>) -> ConfigResult<GateConfig> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading gate configuration");
    let content = std::fs::read_to_string(path)?;
    parse_gate_config(&content)
}

/// Parse a gate configuration from KDL text. Missing sections keep their defaults.
pub fn parse_gate_config(kdl: &str) -> ConfigResult<GateConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = GateConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "gate" => {
                config.call_timeout = parse_gate_section(node)?;
            }
            "states" => {
                parse_states_section(node, &mut config.state_rules)?;
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn parse_gate_section(node: &KdlNode) -> ConfigResult<Option<Duration>> {
    let mut call_timeout = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "call-timeout-ms" {
                let millis = get_first_int_arg(child).ok_or_else(|| {
                    ConfigError::MissingField("gate.call-timeout-ms".to_string())
                })?;
                if millis <= 0 || millis > u64::MAX as i128 {
                    return Err(ConfigError::InvalidValue {
                        field: "gate.call-timeout-ms".to_string(),
                        message: format!(
                            "must be a positive number of milliseconds, got {}",
                            millis
                        ),
                    });
                }
                call_timeout = Some(Duration::from_millis(millis as u64));
            }
        }
    }

    Ok(call_timeout)
}

fn parse_states_section(node: &KdlNode, rules: &mut StateRules) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        match child.name().value() {
            "default" => {
                let names = get_all_string_args(child);
                if names.is_empty() {
                    return Err(ConfigError::MissingField("states.default".to_string()));
                }
                let states = names
                    .iter()
                    .map(|name| parse_state(name, "states.default"))
                    .collect::<ConfigResult<AllowedStates>>()?;
                rules.set_default_states(states);
            }
            "state" => {
                let name = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("state name".to_string()))?;
                let state = parse_state(&name, "state")?;
                let classes = parse_permits(child, &name)?;
                rules.set_permits(state, classes);
            }
            _ => {}
        }
    }

    Ok(())
}

fn parse_state(name: &str, field: &str) -> ConfigResult<RepoState> {
    name.parse().map_err(|message| ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    })
}

fn parse_permits(node: &KdlNode, state: &str) -> ConfigResult<Vec<PermissionClass>> {
    let field = format!("state '{}' permits", state);
    let values = get_string_list_prop(node, "permits");
    if values.is_empty() {
        return Err(ConfigError::MissingField(field));
    }

    let mut classes = Vec::new();
    for value in &values {
        if value == "none" {
            continue;
        }
        let class = value
            .parse::<PermissionClass>()
            .map_err(|message| ConfigError::InvalidValue {
                field: field.clone(),
                message,
            })?;
        classes.push(class);
    }
    Ok(classes)
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_first_int_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

/// Collect every `name="..."` property, so repeated properties accumulate.
fn get_string_list_prop(node: &KdlNode, name: &str) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_some_and(|n| n.value() == name))
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}
