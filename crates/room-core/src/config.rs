//! Room configuration.
//!
//! Configuration is loaded from environment variables. The room token is
//! redacted in Debug output.

use crate::adapters::track_centric::PublishPriority;
use crate::room::ConnectOptions;
pub use common::config::ConfigError;
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

/// Default publish priority for the camera track.
pub const DEFAULT_CAMERA_PRIORITY: PublishPriority = PublishPriority::Low;

/// Default delay between publishing a replacement publisher and tearing down
/// the one it replaces.
pub const DEFAULT_CAMERA_SWITCH_GRACE_MS: u64 = 250;

/// Upper bound for the camera switch grace delay.
pub const MAX_CAMERA_SWITCH_GRACE_MS: u64 = 5000;

/// Settings the adapters need beyond the connect credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterSettings {
    /// Publish priority of the camera track (track-centric backend).
    pub camera_priority: PublishPriority,
    /// Grace delay between publishing a replacement camera publisher and
    /// unpublishing the original (publisher/subscriber backend).
    pub camera_switch_grace: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            camera_priority: DEFAULT_CAMERA_PRIORITY,
            camera_switch_grace: Duration::from_millis(DEFAULT_CAMERA_SWITCH_GRACE_MS),
        }
    }
}

/// Room configuration.
#[derive(Clone)]
pub struct RoomConfig {
    /// Room (session) name.
    pub room_name: String,

    /// Backend auth token.
    /// Protected by `SecretString` to prevent accidental logging.
    pub room_token: SecretString,

    /// Camera publish priority (default: low).
    pub camera_priority: PublishPriority,

    /// Camera switch grace delay (default: 250ms, max 5000ms).
    pub camera_switch_grace: Duration,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for RoomConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomConfig")
            .field("room_name", &self.room_name)
            .field("room_token", &"[REDACTED]")
            .field("camera_priority", &self.camera_priority)
            .field("camera_switch_grace", &self.camera_switch_grace)
            .finish()
    }
}

impl RoomConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let room_name = vars
            .get("ROOM_NAME")
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ROOM_NAME".to_string()))?
            .clone();

        let room_token = SecretString::from(
            vars.get("ROOM_TOKEN")
                .ok_or_else(|| ConfigError::MissingEnvVar("ROOM_TOKEN".to_string()))?
                .clone(),
        );

        let camera_priority = match vars.get("ROOM_CAMERA_PRIORITY") {
            None => DEFAULT_CAMERA_PRIORITY,
            Some(value) => value.parse().map_err(|()| {
                ConfigError::InvalidValue(format!(
                    "ROOM_CAMERA_PRIORITY must be low, standard or high, got '{value}'"
                ))
            })?,
        };

        let grace_ms = match vars.get("ROOM_CAMERA_SWITCH_GRACE_MS") {
            None => DEFAULT_CAMERA_SWITCH_GRACE_MS,
            Some(value) => value.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "ROOM_CAMERA_SWITCH_GRACE_MS must be a number of milliseconds: {e}"
                ))
            })?,
        };
        if grace_ms > MAX_CAMERA_SWITCH_GRACE_MS {
            return Err(ConfigError::InvalidValue(format!(
                "ROOM_CAMERA_SWITCH_GRACE_MS must be at most {}, got {grace_ms}",
                MAX_CAMERA_SWITCH_GRACE_MS
            )));
        }

        Ok(Self {
            room_name,
            room_token,
            camera_priority,
            camera_switch_grace: Duration::from_millis(grace_ms),
        })
    }

    /// Credentials for [`Room::connect`](crate::room::Room::connect).
    #[must_use]
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            room_name: self.room_name.clone(),
            room_token: self.room_token.clone(),
        }
    }

    #[must_use]
    pub fn adapter_settings(&self) -> AdapterSettings {
        AdapterSettings {
            camera_priority: self.camera_priority,
            camera_switch_grace: self.camera_switch_grace,
        }
    }
}
