//! The vendor-neutral Room contract.
//!
//! A room moves `Disconnected -> Connecting -> Connected -> Disconnected`.
//! Local hardware is acquired independently of the connection so it can be
//! previewed before joining. Backend callbacks are queued by the adapter and
//! translated into canonical [`RoomEvent`]s when the caller pumps them with
//! [`Room::dispatch_pending`] or [`Room::dispatch_next`].
//!
//! All operations take `&mut self`, so calls on one room never overlap.

use crate::errors::RoomError;
use crate::events::{EventBus, RoomEvent};
use crate::media::{MediaStream, MediaStreamTrack};
use crate::participant::Participant;
use crate::signal::{self, SignalEvent, SignalType};
use crate::track::{Track, TrackRole};
use async_trait::async_trait;
use common::secret::SecretString;
use common::types::Identity;
use std::collections::HashMap;
use tracing::info;

/// Connection state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Credentials for joining a room. The token is redacted in Debug output.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub room_name: String,
    pub room_token: SecretString,
}

impl ConnectOptions {
    #[must_use]
    pub fn new(room_name: impl Into<String>, room_token: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            room_token: SecretString::from(room_token.into()),
        }
    }
}

/// Local camera and microphone created from one hardware stream.
#[derive(Debug, Clone)]
pub struct LocalTracks {
    pub audio: Track,
    pub video: Track,
}

/// A single conferencing session.
#[async_trait(?Send)]
pub trait Room {
    /// Identity of the local participant; `None` until connected.
    fn identity(&self) -> Option<&Identity>;

    fn state(&self) -> ConnectionState;

    /// Remote participants. Never contains the local participant.
    fn participants(&self) -> &HashMap<Identity, Participant>;

    fn participant(&self, identity: &Identity) -> Option<&Participant> {
        self.participants().get(identity)
    }

    fn events(&self) -> &EventBus;

    /// Local track currently held in `role`.
    fn local_track(&self, role: TrackRole) -> Option<Track>;

    /// Reconstruct the local participant from local track state and
    /// [`Room::identity`]. `None` until connected.
    fn local_participant(&self) -> Option<Participant> {
        let mut participant = Participant::new(self.identity()?.clone());
        for role in TrackRole::ALL {
            if let Some(track) = self.local_track(role) {
                participant.set_track(track);
            }
        }
        Some(participant)
    }

    /// Bind the first audio and video track of a hardware stream as the local
    /// microphone and camera. Only valid while disconnected.
    async fn create_local_tracks(&mut self, stream: &MediaStream) -> Result<LocalTracks, RoomError>;

    /// Use `track` as the camera. Publishes immediately when connected.
    async fn start_camera(&mut self, track: MediaStreamTrack) -> Result<Track, RoomError>;

    /// Stop publishing and release the camera. No-op without a camera.
    async fn stop_camera(&mut self) -> Result<(), RoomError>;

    /// Replace the camera hardware, keeping the microphone published.
    async fn change_camera(&mut self, track: MediaStreamTrack) -> Result<Track, RoomError>;

    /// Toggle microphone publication without changing its track identity.
    fn enable_mic(&mut self, enable: bool);

    /// Swap the microphone hardware. `Ok(None)` when there is no microphone.
    async fn change_mic(&mut self, device_id: &str) -> Result<Option<Track>, RoomError>;

    async fn connect(&mut self, options: ConnectOptions) -> Result<(), RoomError>;

    /// Leave the room and release all local hardware. Idempotent.
    async fn disconnect(&mut self);

    /// Publish a screen-video (and optional screen-audio) pair.
    async fn start_screenshare(&mut self, stream: &MediaStream) -> Result<Track, RoomError>;

    /// Unpublish the screen pair. No-op when not sharing.
    async fn stop_screen_share(&mut self);

    /// Broadcast a signal to every participant.
    async fn signal(&mut self, event: &SignalEvent) -> Result<(), RoomError>;

    /// Route remote audio to `device_id`, now and for future subscriptions.
    fn set_audio_output_device(&mut self, device_id: &str);

    /// Translate every queued backend callback. Returns how many were handled.
    fn dispatch_pending(&mut self) -> usize;

    /// Wait for and translate the next backend callback. Returns false once
    /// the room is disconnected or the backend stream has closed.
    async fn dispatch_next(&mut self) -> bool;
}

/// Act on an inbound signal payload addressed to this room's identity.
pub(crate) fn handle_signal_data<R: Room + ?Sized>(room: &mut R, data: &str) {
    let local = room.identity().cloned();
    let Some(event) = signal::accept_inbound(data, local.as_ref()) else {
        return;
    };
    match event.signal_type {
        SignalType::ForceMute => {
            info!(
                target: "room.signal",
                from = %event.from,
                "Microphone force-disabled by remote participant"
            );
            room.enable_mic(false);
            room.events().emit(&RoomEvent::LocalMicForceDisabled);
        }
    }
}
