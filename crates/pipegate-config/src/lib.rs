//! KDL configuration parsing for PipeGate.
//!
//! This crate handles parsing of:
//! - Gate settings (per-call timeout)
//! - Repository state policy rules

pub mod error;
pub mod gate;

pub use error::{ConfigError, ConfigResult};
pub use gate::{GateConfig, load_gate_config, parse_gate_config};
