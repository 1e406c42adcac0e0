//! Common configuration types for Huddle components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default log filter when `ROOM_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "room_core=info";

/// Configuration loading errors shared by every crate in the workspace.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// `tracing` env-filter directive (e.g. `room_core=debug`)
    pub log_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let log_filter = vars
            .get("ROOM_LOG")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let json_logs = match vars.get("ROOM_LOG_JSON").map(String::as_str) {
            None => false,
            Some(value) => parse_bool(value).ok_or_else(|| {
                ConfigError::InvalidValue(format!("ROOM_LOG_JSON must be a boolean, got '{value}'"))
            })?,
        };

        Ok(Self {
            log_filter,
            json_logs,
        })
    }
}

/// Parse the boolean spellings accepted in environment variables.
#[must_use]
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
