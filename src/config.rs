//! Agent configuration, loadable from JSON or the process environment.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Knobs for one agent
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VmConfig {
    /// Nested activations allowed before a RangeError is raised
    pub max_call_depth: usize,
    /// Operand stack capacity reserved per activation
    pub initial_stack_capacity: usize,
    /// Emit a `trace!` event per dispatched opcode
    pub trace_dispatch: bool,
    /// Validate packages handed to `run_script`/`run_module`
    pub validate_on_load: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
            initial_stack_capacity: 32,
            trace_dispatch: false,
            validate_on_load: true,
        }
    }
}

impl VmConfig {
    /// Parse a JSON object; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Defaults overridden by `JSVM_MAX_CALL_DEPTH`, `JSVM_STACK_CAPACITY`,
    /// `JSVM_TRACE` and `JSVM_VALIDATE`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = lookup("JSVM_MAX_CALL_DEPTH") {
            config.max_call_depth = parse_number("JSVM_MAX_CALL_DEPTH", &value)?;
        }
        if let Some(value) = lookup("JSVM_STACK_CAPACITY") {
            config.initial_stack_capacity = parse_number("JSVM_STACK_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("JSVM_TRACE") {
            config.trace_dispatch = parse_flag("JSVM_TRACE", &value)?;
        }
        if let Some(value) = lookup("JSVM_VALIDATE") {
            config.validate_on_load = parse_flag("JSVM_VALIDATE", &value)?;
        }
        Ok(config)
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
