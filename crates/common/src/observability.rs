//! `tracing` subscriber initialisation.
//!
//! Library crates only emit events; the embedding application (or a test
//! harness) installs the subscriber once at startup.

use crate::config::ObservabilityConfig;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Failure to install the global subscriber.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInstalled(String),
}

/// Install the global `tracing` subscriber described by `config`.
///
/// # Errors
///
/// Returns an error if the filter directive does not parse or if a global
/// subscriber has already been installed.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    let filter = EnvFilter::try_new(&config.log_filter)
        .map_err(|e| ObservabilityError::InvalidFilter(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| ObservabilityError::AlreadyInstalled(e.to_string()))
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| ObservabilityError::AlreadyInstalled(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = ObservabilityConfig {
            log_filter: "room_core=[".to_string(),
            json_logs: false,
        };

        assert!(matches!(
            init_tracing(&config),
            Err(ObservabilityError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_second_install_reports_already_installed() {
        let config = ObservabilityConfig::default();

        // The first call may race another test in this binary; only the
        // second outcome is deterministic.
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(ObservabilityError::AlreadyInstalled(_))
        ));
    }
}
