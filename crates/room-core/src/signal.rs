//! Application-level signal events.
//!
//! Signals ride on each backend's data/messaging primitive as a JSON string:
//!
//! ```json
//! {"type":"ForceMute","to":"alice","from":"bob","payload":{"reason":"moderator"}}
//! ```
//!
//! Every participant receives every signal; only the addressed recipient acts
//! on it. Malformed or foreign payloads are dropped without surfacing an error.

use crate::errors::RoomError;
use common::types::Identity;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    /// Disable the recipient's microphone.
    ForceMute,
}

/// An out-of-band message between participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub to: Identity,
    pub from: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Map<String, serde_json::Value>>,
}

impl SignalEvent {
    /// A force-mute request from `from` addressed to `to`.
    #[must_use]
    pub fn force_mute(to: Identity, from: Identity) -> Self {
        Self {
            signal_type: SignalType::ForceMute,
            to,
            from,
            payload: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Map<String, serde_json::Value>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Serialize for the backend's data channel.
    pub fn encode(&self) -> Result<String, RoomError> {
        serde_json::to_string(self).map_err(|e| RoomError::Signaling(e.to_string()))
    }

    /// Parse a payload received from the data channel.
    ///
    /// Returns `None` for anything that is not a well-formed signal.
    #[must_use]
    pub fn decode(data: &str) -> Option<Self> {
        match serde_json::from_str(data) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!(
                    target: "room.signal",
                    error = %e,
                    len = data.len(),
                    "Dropping malformed signal payload"
                );
                None
            }
        }
    }

    #[must_use]
    pub fn is_addressed_to(&self, identity: &Identity) -> bool {
        &self.to == identity
    }
}

/// Decode inbound data and keep it only if addressed to `local`.
pub(crate) fn accept_inbound(data: &str, local: Option<&Identity>) -> Option<SignalEvent> {
    let event = SignalEvent::decode(data)?;
    let Some(local) = local else {
        debug!(target: "room.signal", "Dropping signal received without a local identity");
        return None;
    };
    if !event.is_addressed_to(local) {
        debug!(
            target: "room.signal",
            signal_type = ?event.signal_type,
            to = %event.to,
            "Ignoring signal addressed to another participant"
        );
        return None;
    }
    Some(event)
}
