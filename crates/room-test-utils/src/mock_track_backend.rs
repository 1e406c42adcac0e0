//! Mock track-centric backend.
//!
//! Provides a [`TrackBackend`] implementation that can be configured to:
//! - Report a local identity and a snapshot of members already present
//! - Reject connects or publishes with a chosen [`BackendError`]
//! - Record every call the adapter makes
//!
//! # Example
//!
//! ```rust,ignore
//! use room_test_utils::MockTrackBackend;
//!
//! let (backend, controller) = MockTrackBackend::builder()
//!     .identity("alice")
//!     .with_participant("bob")
//!     .build();
//!
//! // Move `backend` into a room, then drive it through `controller`.
//! controller.participant_connected("carol");
//! ```

use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use common::types::Identity;
use room_core::adapters::track_centric::{
    NativeConnectOptions, NativeLocalTrack, NativeRemoteTrack, NativeRoom, NativeTrackKind,
    NativeTrackRef, PublishPriority, TrackBackend, TrackEvent,
};
use room_core::errors::BackendError;
use room_core::media::{MediaKind, MediaStreamTrack, MediaTrackSettings, VideoDimensions};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::mpsc;

/// A call the adapter made on the mock backend.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackCall {
    Connect {
        room_name: String,
        tracks: Vec<String>,
    },
    Publish {
        name: String,
        priority: PublishPriority,
    },
    Unpublish {
        name: String,
    },
    SetEnabled {
        name: String,
        enabled: bool,
    },
    Restart {
        name: String,
        device_id: String,
    },
    SendData {
        payload: String,
    },
    Disconnect,
}

#[derive(Debug, Default)]
struct State {
    identity: String,
    participants: Vec<String>,
    connect_error: Option<BackendError>,
    fail_all_publishes: bool,
    publish_failures: HashMap<String, BackendError>,
    restart_error: Option<BackendError>,
    unpublish_error: Option<BackendError>,
    send_error: Option<BackendError>,
    calls: Vec<TrackCall>,
    published: Vec<NativeLocalTrack>,
    last_options: Option<NativeConnectOptions>,
    last_token: Option<String>,
    sender: Option<mpsc::UnboundedSender<TrackEvent>>,
}

impl State {
    fn publish_error(&self, name: &str) -> Option<BackendError> {
        if self.fail_all_publishes {
            return Some(BackendError::Rejected(format!("publish of {name} rejected")));
        }
        self.publish_failures.get(name).cloned()
    }
}

/// Mock [`TrackBackend`]. Build with [`MockTrackBackend::builder`].
#[derive(Debug)]
pub struct MockTrackBackend {
    state: Rc<RefCell<State>>,
}

impl MockTrackBackend {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> MockTrackBackendBuilder {
        MockTrackBackendBuilder::default()
    }
}

/// Builder for [`MockTrackBackend`] configuration.
#[derive(Debug, Default)]
pub struct MockTrackBackendBuilder {
    identity: Option<String>,
    participants: Vec<String>,
    connect_error: Option<BackendError>,
    fail_publish: bool,
}

impl MockTrackBackendBuilder {
    /// Set the identity the backend assigns to the local participant.
    #[must_use]
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Add a member that is already in the room when we connect.
    #[must_use]
    pub fn with_participant(mut self, identity: impl Into<String>) -> Self {
        self.participants.push(identity.into());
        self
    }

    /// Reject every connect with `error`.
    #[must_use]
    pub fn fail_connect(mut self, error: BackendError) -> Self {
        self.connect_error = Some(error);
        self
    }

    /// Reject every publish.
    #[must_use]
    pub fn fail_publish(mut self) -> Self {
        self.fail_publish = true;
        self
    }

    /// Build the backend and the controller that drives it.
    #[must_use]
    pub fn build(self) -> (MockTrackBackend, TrackBackendController) {
        let state = Rc::new(RefCell::new(State {
            identity: self.identity.unwrap_or_else(|| "local-user".to_string()),
            participants: self.participants,
            connect_error: self.connect_error,
            fail_all_publishes: self.fail_publish,
            ..State::default()
        }));
        (
            MockTrackBackend {
                state: Rc::clone(&state),
            },
            TrackBackendController { state },
        )
    }
}

#[async_trait(?Send)]
impl TrackBackend for MockTrackBackend {
    async fn connect(
        &mut self,
        token: &SecretString,
        options: &NativeConnectOptions,
        tracks: &[NativeLocalTrack],
    ) -> Result<NativeRoom, BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(TrackCall::Connect {
            room_name: options.name.clone(),
            tracks: tracks.iter().map(|t| t.name.clone()).collect(),
        });
        state.last_options = Some(options.clone());
        state.last_token = Some(token.expose_secret().to_string());
        if let Some(error) = state.connect_error.clone() {
            return Err(error);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.sender = Some(tx);
        state.published = tracks.to_vec();
        Ok(NativeRoom {
            local_identity: Identity::new(state.identity.clone()),
            participants: state.participants.iter().cloned().map(Identity::from).collect(),
            events: rx,
        })
    }

    async fn publish_track(
        &mut self,
        track: &NativeLocalTrack,
        priority: PublishPriority,
    ) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(TrackCall::Publish {
            name: track.name.clone(),
            priority,
        });
        if let Some(error) = state.publish_error(&track.name) {
            return Err(error);
        }
        state.published.push(track.clone());
        Ok(())
    }

    async fn unpublish_track(&mut self, track: &NativeLocalTrack) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(TrackCall::Unpublish {
            name: track.name.clone(),
        });
        if let Some(error) = state.unpublish_error.take() {
            return Err(error);
        }
        state.published.retain(|p| !p.media.same_as(&track.media));
        Ok(())
    }

    fn set_track_enabled(&mut self, track: &NativeLocalTrack, enabled: bool) {
        self.state.borrow_mut().calls.push(TrackCall::SetEnabled {
            name: track.name.clone(),
            enabled,
        });
    }

    async fn restart_track(
        &mut self,
        track: &NativeLocalTrack,
        device_id: &str,
    ) -> Result<MediaStreamTrack, BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(TrackCall::Restart {
            name: track.name.clone(),
            device_id: device_id.to_string(),
        });
        if let Some(error) = state.restart_error.clone() {
            return Err(error);
        }
        Ok(MediaStreamTrack::with_settings(
            track.media.kind(),
            MediaTrackSettings {
                device_id: Some(device_id.to_string()),
                ..MediaTrackSettings::default()
            },
        ))
    }

    fn send_data(&mut self, payload: &str) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(TrackCall::SendData {
            payload: payload.to_string(),
        });
        match state.send_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.calls.push(TrackCall::Disconnect);
        state.sender = None;
        state.published.clear();
    }
}

/// Drives a [`MockTrackBackend`] after it has been moved into a room.
#[derive(Debug, Clone)]
pub struct TrackBackendController {
    state: Rc<RefCell<State>>,
}

impl TrackBackendController {
    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TrackCall> {
        self.state.borrow().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Names of the tracks currently published, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<String> {
        self.state
            .borrow()
            .published
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    /// True if `media` is currently published under some name.
    #[must_use]
    pub fn is_published(&self, media: &MediaStreamTrack) -> bool {
        self.state
            .borrow()
            .published
            .iter()
            .any(|t| t.media.same_as(media))
    }

    /// Options passed to the last connect.
    #[must_use]
    pub fn last_connect_options(&self) -> Option<NativeConnectOptions> {
        self.state.borrow().last_options.clone()
    }

    /// Token passed to the last connect.
    #[must_use]
    pub fn last_token(&self) -> Option<String> {
        self.state.borrow().last_token.clone()
    }

    /// Reject publishes of tracks named `name`.
    pub fn fail_publish_of(&self, name: &str, error: BackendError) {
        self.state
            .borrow_mut()
            .publish_failures
            .insert(name.to_string(), error);
    }

    /// Accept every publish again.
    pub fn allow_publish(&self) {
        let mut state = self.state.borrow_mut();
        state.fail_all_publishes = false;
        state.publish_failures.clear();
    }

    /// Reject microphone restarts with `error`.
    pub fn fail_restart(&self, error: BackendError) {
        self.state.borrow_mut().restart_error = Some(error);
    }

    /// Reject the next unpublish with `error`.
    pub fn fail_next_unpublish(&self, error: BackendError) {
        self.state.borrow_mut().unpublish_error = Some(error);
    }

    /// Reject data sends with `error`.
    pub fn fail_send(&self, error: BackendError) {
        self.state.borrow_mut().send_error = Some(error);
    }

    /// Queue a native callback. Returns false when no session is open.
    pub fn emit(&self, event: TrackEvent) -> bool {
        self.state
            .borrow()
            .sender
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Close the callback stream as a crashed backend would.
    pub fn close_events(&self) {
        self.state.borrow_mut().sender = None;
    }

    pub fn participant_connected(&self, identity: &str) -> bool {
        self.emit(TrackEvent::ParticipantConnected {
            identity: Identity::from(identity),
        })
    }

    pub fn participant_disconnected(&self, identity: &str) -> bool {
        self.emit(TrackEvent::ParticipantDisconnected {
            identity: Identity::from(identity),
        })
    }

    /// Subscribe to a remote track. Returns the media delivered with it
    /// (`None` for data tracks).
    pub fn track_subscribed(
        &self,
        identity: &str,
        sid: &str,
        name: &str,
        kind: NativeTrackKind,
    ) -> Option<MediaStreamTrack> {
        self.track_subscribed_with(identity, sid, name, kind, true)
    }

    /// Subscribe to a remote track that starts out enabled or disabled.
    pub fn track_subscribed_with(
        &self,
        identity: &str,
        sid: &str,
        name: &str,
        kind: NativeTrackKind,
        enabled: bool,
    ) -> Option<MediaStreamTrack> {
        let media = match kind {
            NativeTrackKind::Audio => Some(MediaStreamTrack::new(MediaKind::Audio)),
            NativeTrackKind::Video => Some(MediaStreamTrack::new(MediaKind::Video)),
            NativeTrackKind::Data => None,
        };
        self.emit(TrackEvent::TrackSubscribed {
            identity: Identity::from(identity),
            track: NativeRemoteTrack {
                sid: sid.to_string(),
                name: name.to_string(),
                kind,
                media: media.clone(),
                enabled,
            },
        });
        media
    }

    pub fn track_unsubscribed(
        &self,
        identity: &str,
        sid: &str,
        name: &str,
        kind: NativeTrackKind,
    ) -> bool {
        self.emit(TrackEvent::TrackUnsubscribed {
            identity: Identity::from(identity),
            track: track_ref(sid, name, kind),
        })
    }

    pub fn track_unpublished(
        &self,
        identity: &str,
        sid: &str,
        name: &str,
        kind: NativeTrackKind,
    ) -> bool {
        self.emit(TrackEvent::TrackUnpublished {
            identity: Identity::from(identity),
            track: track_ref(sid, name, kind),
        })
    }

    pub fn track_enabled(
        &self,
        identity: &str,
        sid: &str,
        name: &str,
        kind: NativeTrackKind,
    ) -> bool {
        self.emit(TrackEvent::TrackEnabled {
            identity: Identity::from(identity),
            track: track_ref(sid, name, kind),
        })
    }

    pub fn track_disabled(
        &self,
        identity: &str,
        sid: &str,
        name: &str,
        kind: NativeTrackKind,
    ) -> bool {
        self.emit(TrackEvent::TrackDisabled {
            identity: Identity::from(identity),
            track: track_ref(sid, name, kind),
        })
    }

    pub fn track_dimensions_changed(
        &self,
        identity: &str,
        sid: &str,
        name: &str,
        dimensions: VideoDimensions,
    ) -> bool {
        self.emit(TrackEvent::TrackDimensionsChanged {
            identity: Identity::from(identity),
            track: track_ref(sid, name, NativeTrackKind::Video),
            dimensions,
        })
    }

    pub fn track_switched_off(&self, identity: &str, sid: &str, name: &str) -> bool {
        self.emit(TrackEvent::TrackSwitchedOff {
            identity: Identity::from(identity),
            track: track_ref(sid, name, NativeTrackKind::Video),
        })
    }

    pub fn track_switched_on(&self, identity: &str, sid: &str, name: &str) -> bool {
        self.emit(TrackEvent::TrackSwitchedOn {
            identity: Identity::from(identity),
            track: track_ref(sid, name, NativeTrackKind::Video),
        })
    }

    pub fn dominant_speaker_changed(&self, identity: Option<&str>) -> bool {
        self.emit(TrackEvent::DominantSpeakerChanged {
            identity: identity.map(Identity::from),
        })
    }

    /// Deliver a data track message from `identity`.
    pub fn data_received(&self, identity: &str, data: &str) -> bool {
        self.emit(TrackEvent::DataReceived {
            identity: Identity::from(identity),
            data: data.to_string(),
        })
    }

    /// End the session from the backend side.
    pub fn backend_disconnect(&self, error: Option<&str>) -> bool {
        self.emit(TrackEvent::Disconnected {
            error: error.map(str::to_string),
        })
    }
}

fn track_ref(sid: &str, name: &str, kind: NativeTrackKind) -> NativeTrackRef {
    NativeTrackRef {
        sid: sid.to_string(),
        name: name.to_string(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_track_backend_builder() {
        let (mut backend, controller) = MockTrackBackend::builder()
            .identity("alice")
            .with_participant("bob")
            .build();

        let room = backend
            .connect(
                &SecretString::from("token-1".to_string()),
                &NativeConnectOptions::recommended("standup"),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(room.local_identity, "alice");
        assert_eq!(room.participants, vec![Identity::from("bob")]);
        assert_eq!(controller.last_token().as_deref(), Some("token-1"));
        assert!(controller.participant_connected("carol"));
    }

    #[tokio::test]
    async fn test_mock_track_backend_rejects_connect() {
        let (mut backend, controller) = MockTrackBackend::builder()
            .fail_connect(BackendError::Unauthorized("expired".to_string()))
            .build();

        let result = backend
            .connect(
                &SecretString::from("token-1".to_string()),
                &NativeConnectOptions::recommended("standup"),
                &[],
            )
            .await;

        assert!(matches!(result, Err(BackendError::Unauthorized(_))));
        assert!(!controller.participant_connected("carol"));
    }
}
