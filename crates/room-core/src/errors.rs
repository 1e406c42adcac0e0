//! Room error types.
//!
//! Backend failures are reported by the vendor seams as [`BackendError`] and
//! classified by the adapters into [`RoomError`] according to the operation
//! that failed. Backend detail is kept for logs; [`RoomError::client_message`]
//! is what a UI should show.

use thiserror::Error;

/// Failure reported by a vendor backend seam.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend rejected the room token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Transport-level failure talking to the backend.
    #[error("Network error: {0}")]
    Network(String),

    /// Camera, microphone or screen capture could not be acquired.
    #[error("Device error: {0}")]
    Device(String),

    /// The backend refused the request (publish, subscribe, signal).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The session or publisher is already gone.
    #[error("Closed: {0}")]
    Closed(String),
}

/// Room error type.
///
/// Every rejected operation leaves the room's observable state (local tracks,
/// connection state, remote participants) exactly as it was before the call.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Hardware unavailable, denied, or missing from the supplied stream.
    #[error("Media acquisition failed: {0}")]
    Acquisition(String),

    /// Connecting to the room failed (bad token, network).
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Publishing local media failed mid-session.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Sending a signal event failed.
    #[error("Signaling failed: {0}")]
    Signaling(String),

    /// The operation requires a connected room.
    #[error("Room is not connected")]
    NotConnected,

    /// The operation is not valid in the room's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Unclassified backend failure.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl RoomError {
    /// Classify a backend failure raised while acquiring hardware.
    pub(crate) fn acquisition(err: BackendError) -> Self {
        match err {
            BackendError::Device(msg) => RoomError::Acquisition(msg),
            other => RoomError::Backend(other),
        }
    }

    /// Classify a backend failure raised while connecting.
    pub(crate) fn connection(err: BackendError) -> Self {
        RoomError::Connection(err.to_string())
    }

    /// Classify a backend failure raised while publishing.
    pub(crate) fn publish(err: BackendError) -> Self {
        match err {
            BackendError::Device(msg) => RoomError::Acquisition(msg),
            other => RoomError::Publish(other.to_string()),
        }
    }

    /// Classify a backend failure raised while signaling.
    pub(crate) fn signaling(err: BackendError) -> Self {
        match err {
            BackendError::Closed(_) => RoomError::NotConnected,
            other => RoomError::Signaling(other.to_string()),
        }
    }

    /// Returns a message safe to show to the user.
    ///
    /// Backend internals are not included.
    pub fn client_message(&self) -> String {
        match self {
            RoomError::Acquisition(_) => {
                "Could not access your camera or microphone".to_string()
            }
            RoomError::Connection(_) => "Could not join the room".to_string(),
            RoomError::Publish(_) => "Could not share your media".to_string(),
            RoomError::Signaling(_) => "Could not send the request".to_string(),
            RoomError::NotConnected => "You are not connected to a room".to_string(),
            RoomError::InvalidState(msg) => msg.clone(),
            RoomError::Backend(BackendError::Unauthorized(_)) => {
                "Your room access has expired".to_string()
            }
            RoomError::Backend(_) => "An internal error occurred".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_detail() {
        let err = RoomError::Publish("camera rejected by server".to_string());
        assert_eq!(
            format!("{err}"),
            "Publish failed: camera rejected by server"
        );

        let err = RoomError::from(BackendError::Network("reset".to_string()));
        assert_eq!(format!("{err}"), "Backend error: Network error: reset");
    }

    #[test]
    fn test_classification() {
        assert!(matches!(
            RoomError::acquisition(BackendError::Device("denied".to_string())),
            RoomError::Acquisition(msg) if msg == "denied"
        ));
        assert!(matches!(
            RoomError::publish(BackendError::Device("gone".to_string())),
            RoomError::Acquisition(_)
        ));
        assert!(matches!(
            RoomError::publish(BackendError::Rejected("quota".to_string())),
            RoomError::Publish(_)
        ));
        assert!(matches!(
            RoomError::signaling(BackendError::Closed("session".to_string())),
            RoomError::NotConnected
        ));
        assert!(matches!(
            RoomError::connection(BackendError::Unauthorized("expired".to_string())),
            RoomError::Connection(msg) if msg.contains("expired")
        ));
    }

    #[test]
    fn test_client_message_hides_backend_detail() {
        let err = RoomError::Connection("token sig mismatch for kid=abc".to_string());
        assert_eq!(err.client_message(), "Could not join the room");

        let err = RoomError::Backend(BackendError::Rejected("internal 0x45".to_string()));
        assert!(!err.client_message().contains("0x45"));

        let err = RoomError::InvalidState("Already connected".to_string());
        assert_eq!(err.client_message(), "Already connected");
    }
}
