//! Room over a track-centric backend.
//!
//! Remote media arrives as independently subscribable named tracks attached to
//! long-lived participants, so translation is mostly one callback to one
//! canonical event. Two quirks need care:
//!
//! - Members already present at connect time never produce a
//!   participant-connected callback, only track subscriptions. They are taken
//!   from the connect snapshot and announced before any queued callback is
//!   dispatched.
//! - A same-name republish can deliver the replacement's subscription before
//!   the original's removal. Removal only takes a role's track when its id
//!   matches the native track being removed.

pub mod backend;
pub(crate) mod handle;

pub use backend::{
    NativeConnectOptions, NativeLocalTrack, NativeRemoteTrack, NativeRoom, NativeTrackKind,
    NativeTrackRef, PublishPriority, TrackBackend, TrackEvent,
};
pub use handle::TrackCentricHandle;

use crate::config::AdapterSettings;
use crate::errors::RoomError;
use crate::events::{EventBus, RoomEvent};
use crate::media::{MediaElement, MediaKind, MediaStream, MediaStreamTrack};
use crate::participant::Participant;
use crate::room::{self, ConnectOptions, ConnectionState, LocalTracks, Room};
use crate::signal::SignalEvent;
use crate::track::{Track, TrackHandle, TrackRole};
use async_trait::async_trait;
use common::types::{Identity, TrackId};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Recover a track's role from its native kind and name.
///
/// Unnamed or unknown names fall back to camera (video) and mic (audio).
/// Data tracks have no role.
#[must_use]
pub fn role_for(kind: NativeTrackKind, name: &str) -> Option<TrackRole> {
    let role = match (kind.media_kind()?, name) {
        (MediaKind::Video, "screen") => TrackRole::ScreenVideo,
        (MediaKind::Audio, "screen" | "screenAudio") => TrackRole::ScreenAudio,
        (MediaKind::Video, _) => TrackRole::Camera,
        (MediaKind::Audio, _) => TrackRole::Mic,
    };
    Some(role)
}

fn remote_track_id(sid: &str, role: TrackRole) -> TrackId {
    TrackId::new(format!("{sid}-{}", role.backend_name()))
}

/// A local track paired with the backend's view of it.
struct LocalEntry {
    track: Track,
    native: NativeLocalTrack,
}

impl LocalEntry {
    fn new(role: TrackRole, media: MediaStreamTrack) -> Self {
        let name = role.backend_name();
        let handle = TrackHandle::TrackCentric(TrackCentricHandle::new(None, name));
        Self {
            track: Track::local(role, media.clone(), handle),
            native: NativeLocalTrack {
                name: name.to_string(),
                media,
            },
        }
    }
}

#[derive(Default)]
struct LocalSlots {
    camera: Option<LocalEntry>,
    mic: Option<LocalEntry>,
    screen: Option<LocalEntry>,
    screen_audio: Option<LocalEntry>,
}

impl LocalSlots {
    fn slot(&self, role: TrackRole) -> &Option<LocalEntry> {
        match role {
            TrackRole::Camera => &self.camera,
            TrackRole::Mic => &self.mic,
            TrackRole::ScreenVideo => &self.screen,
            TrackRole::ScreenAudio => &self.screen_audio,
        }
    }

    fn slot_mut(&mut self, role: TrackRole) -> &mut Option<LocalEntry> {
        match role {
            TrackRole::Camera => &mut self.camera,
            TrackRole::Mic => &mut self.mic,
            TrackRole::ScreenVideo => &mut self.screen,
            TrackRole::ScreenAudio => &mut self.screen_audio,
        }
    }

    fn take_all(&mut self) -> Vec<LocalEntry> {
        TrackRole::ALL
            .into_iter()
            .filter_map(|role| self.slot_mut(role).take())
            .collect()
    }
}

/// [`Room`] implementation over a [`TrackBackend`].
pub struct TrackCentricRoom<B: TrackBackend> {
    backend: B,
    settings: AdapterSettings,
    state: ConnectionState,
    identity: Option<Identity>,
    participants: HashMap<Identity, Participant>,
    events: EventBus,
    native_events: Option<mpsc::UnboundedReceiver<TrackEvent>>,
    local: LocalSlots,
    audio_output: Option<String>,
}

impl<B: TrackBackend> TrackCentricRoom<B> {
    pub fn new(backend: B, settings: AdapterSettings) -> Self {
        Self {
            backend,
            settings,
            state: ConnectionState::Disconnected,
            identity: None,
            participants: HashMap::new(),
            events: EventBus::new(),
            native_events: None,
            local: LocalSlots::default(),
            audio_output: None,
        }
    }

    /// Store `entry` in its role, releasing whatever it replaces.
    fn install_local(&mut self, role: TrackRole, entry: LocalEntry) {
        let media = entry.native.media.clone();
        if let Some(previous) = self.local.slot_mut(role).replace(entry) {
            previous.track.detach();
            if !previous.native.media.same_as(&media) {
                previous.native.media.stop();
            }
        }
    }

    async fn publish_camera(&mut self, media: MediaStreamTrack) -> Result<Track, RoomError> {
        let entry = LocalEntry::new(TrackRole::Camera, media);
        if self.state == ConnectionState::Connected {
            self.backend
                .publish_track(&entry.native, self.settings.camera_priority)
                .await
                .map_err(RoomError::publish)?;
        }
        let track = entry.track.clone();
        self.local.camera = Some(entry);
        info!(
            target: "room.track_centric",
            track_id = %track.id(),
            published = self.state == ConnectionState::Connected,
            "Camera started"
        );
        Ok(track)
    }

    /// Publish the replacement first, then unpublish the original.
    async fn replace_camera(&mut self, media: MediaStreamTrack) -> Result<Track, RoomError> {
        let entry = LocalEntry::new(TrackRole::Camera, media);
        if self.state == ConnectionState::Connected {
            self.backend
                .publish_track(&entry.native, self.settings.camera_priority)
                .await
                .map_err(RoomError::publish)?;
            if let Some(previous) = self.local.camera.as_ref() {
                if let Err(e) = self.backend.unpublish_track(&previous.native).await {
                    warn!(
                        target: "room.track_centric",
                        error = %e,
                        "Failed to unpublish replaced camera, withdrawing replacement"
                    );
                    if let Err(withdraw) = self.backend.unpublish_track(&entry.native).await {
                        warn!(
                            target: "room.track_centric",
                            error = %withdraw,
                            "Failed to withdraw replacement camera"
                        );
                    }
                    return Err(RoomError::publish(e));
                }
            }
        }
        let track = entry.track.clone();
        self.install_local(TrackRole::Camera, entry);
        info!(
            target: "room.track_centric",
            track_id = %track.id(),
            device_id = ?track.media().device_id(),
            "Camera changed"
        );
        Ok(track)
    }

    /// Unpublish and release the screen pair. Returns false if none was active.
    async fn unpublish_screen(&mut self) -> bool {
        let entries: Vec<LocalEntry> = [
            self.local.screen.take(),
            self.local.screen_audio.take(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if entries.is_empty() {
            return false;
        }
        for entry in entries {
            if self.state == ConnectionState::Connected {
                if let Err(e) = self.backend.unpublish_track(&entry.native).await {
                    warn!(
                        target: "room.track_centric",
                        name = %entry.native.name,
                        error = %e,
                        "Failed to unpublish screen track"
                    );
                }
            }
            entry.track.stop();
        }
        true
    }

    /// Drop session state: remote participants, identity and callbacks.
    fn clear_session(&mut self) {
        self.native_events = None;
        self.identity = None;
        for (_, mut participant) in self.participants.drain() {
            for track in participant.take_all() {
                track.stop();
            }
        }
    }

    fn find_track(
        &self,
        identity: &Identity,
        native: &NativeTrackRef,
    ) -> Option<(Track, Participant)> {
        let role = role_for(native.kind, &native.name)?;
        let id = remote_track_id(&native.sid, role);
        let participant = self.participants.get(identity)?;
        let track = participant.track(role).filter(|t| t.id() == &id)?.clone();
        Some((track, participant.clone()))
    }

    fn handle_event(&mut self, event: TrackEvent) {
        match event {
            TrackEvent::ParticipantConnected { identity } => {
                self.on_participant_connected(identity)
            }
            TrackEvent::ParticipantDisconnected { identity } => {
                self.on_participant_disconnected(&identity);
            }
            TrackEvent::TrackSubscribed { identity, track } => {
                self.on_track_subscribed(identity, &track);
            }
            TrackEvent::TrackUnsubscribed { identity, track } => {
                self.on_track_removed(&identity, &track, false);
            }
            TrackEvent::TrackUnpublished { identity, track } => {
                self.on_track_removed(&identity, &track, true);
            }
            TrackEvent::TrackEnabled { identity, track } => {
                if let Some((track, participant)) = self.find_track(&identity, &track) {
                    track.set_enabled(true);
                    self.events.emit(&RoomEvent::TrackEnabled { track, participant });
                }
            }
            TrackEvent::TrackDisabled { identity, track } => {
                if let Some((track, participant)) = self.find_track(&identity, &track) {
                    track.set_enabled(false);
                    self.events.emit(&RoomEvent::TrackDisabled { track, participant });
                }
            }
            TrackEvent::TrackDimensionsChanged {
                identity,
                track,
                dimensions,
            } => {
                if let Some((track, participant)) = self.find_track(&identity, &track) {
                    track.media().set_dimensions(dimensions);
                    self.events
                        .emit(&RoomEvent::TrackDimensionsChanged { track, participant });
                }
            }
            TrackEvent::TrackSwitchedOff { identity, track } => {
                if let Some((track, participant)) = self.find_track(&identity, &track) {
                    self.events.emit(&RoomEvent::TrackSwitchedOff { track, participant });
                }
            }
            TrackEvent::TrackSwitchedOn { identity, track } => {
                if let Some((track, participant)) = self.find_track(&identity, &track) {
                    self.events.emit(&RoomEvent::TrackSwitchedOn { track, participant });
                }
            }
            TrackEvent::DominantSpeakerChanged { identity } => {
                let participant = identity.and_then(|id| self.participants.get(&id).cloned());
                self.events
                    .emit(&RoomEvent::DominantSpeakerChanged { participant });
            }
            TrackEvent::DataReceived { identity, data } => {
                debug!(
                    target: "room.track_centric",
                    from = %identity,
                    len = data.len(),
                    "Data track message received"
                );
                room::handle_signal_data(self, &data);
            }
            TrackEvent::Disconnected { error } => self.on_backend_disconnected(error),
        }
    }

    fn on_participant_connected(&mut self, identity: Identity) {
        if self.identity.as_ref() == Some(&identity) || self.participants.contains_key(&identity) {
            debug!(
                target: "room.track_centric",
                identity = %identity,
                "Ignoring duplicate participant connected"
            );
            return;
        }
        let participant = Participant::new(identity.clone());
        self.participants.insert(identity, participant.clone());
        self.events
            .emit(&RoomEvent::ParticipantConnected { participant });
    }

    fn on_participant_disconnected(&mut self, identity: &Identity) {
        let Some(participant) = self.participants.remove(identity) else {
            warn!(
                target: "room.track_centric",
                identity = %identity,
                "Disconnect for unknown participant"
            );
            return;
        };
        for track in participant.tracks() {
            track.stop();
        }
        self.events
            .emit(&RoomEvent::ParticipantDisconnected { participant });
    }

    fn on_track_subscribed(&mut self, identity: Identity, native: &NativeRemoteTrack) {
        let Some(role) = role_for(native.kind, &native.name) else {
            debug!(
                target: "room.track_centric",
                sid = %native.sid,
                "Ignoring data track subscription"
            );
            return;
        };
        let Some(media) = native.media.clone() else {
            warn!(
                target: "room.track_centric",
                sid = %native.sid,
                "Subscribed media track carries no media"
            );
            return;
        };

        if !self.participants.contains_key(&identity) {
            self.on_participant_connected(identity.clone());
        }

        let handle = TrackHandle::TrackCentric(TrackCentricHandle::new(
            Some(native.sid.clone()),
            native.name.clone(),
        ));
        let track = Track::remote(
            remote_track_id(&native.sid, role),
            role,
            media,
            handle,
            native.enabled,
        );
        if track.kind() == MediaKind::Audio {
            if let Some(device_id) = &self.audio_output {
                track.set_audio_output(device_id);
            }
            // Plays without a renderer.
            track.attach(&MediaElement::new());
        }

        let Some(participant) = self.participants.get_mut(&identity) else {
            return;
        };
        if let Some(displaced) = participant.set_track(track.clone()) {
            displaced.stop();
        }
        let participant = participant.clone();
        debug!(
            target: "room.track_centric",
            identity = %identity,
            track_id = %track.id(),
            role = ?role,
            "Track subscribed"
        );
        self.events
            .emit(&RoomEvent::TrackSubscribed { track, participant });
    }

    fn on_track_removed(
        &mut self,
        identity: &Identity,
        native: &NativeTrackRef,
        unpublished: bool,
    ) {
        let Some(role) = role_for(native.kind, &native.name) else {
            return;
        };
        let id = remote_track_id(&native.sid, role);
        let Some(participant) = self.participants.get_mut(identity) else {
            debug!(
                target: "room.track_centric",
                identity = %identity,
                "Track removal for unknown participant"
            );
            return;
        };
        let Some(track) = participant.take_track_if(role, &id) else {
            return;
        };
        track.stop();
        let participant = participant.clone();
        let event = if unpublished {
            RoomEvent::TrackUnpublished { track, participant }
        } else {
            RoomEvent::TrackUnsubscribed { track, participant }
        };
        self.events.emit(&event);
    }

    fn on_backend_disconnected(&mut self, error: Option<String>) {
        if self.state != ConnectionState::Connected {
            return;
        }
        warn!(
            target: "room.track_centric",
            error = ?error,
            "Backend ended the session"
        );
        self.clear_session();
        for entry in [self.local.screen.take(), self.local.screen_audio.take()]
            .into_iter()
            .flatten()
        {
            entry.track.stop();
        }
        self.state = ConnectionState::Disconnected;
        self.events.emit(&RoomEvent::Disconnected { error });
    }
}

#[async_trait(?Send)]
impl<B: TrackBackend> Room for TrackCentricRoom<B> {
    fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn participants(&self) -> &HashMap<Identity, Participant> {
        &self.participants
    }

    fn events(&self) -> &EventBus {
        &self.events
    }

    fn local_track(&self, role: TrackRole) -> Option<Track> {
        self.local.slot(role).as_ref().map(|entry| entry.track.clone())
    }

    async fn create_local_tracks(
        &mut self,
        stream: &MediaStream,
    ) -> Result<LocalTracks, RoomError> {
        if self.state != ConnectionState::Disconnected {
            return Err(RoomError::InvalidState(
                "Local tracks can only be created before joining".to_string(),
            ));
        }
        let audio = stream
            .audio_track()
            .cloned()
            .ok_or_else(|| RoomError::Acquisition("stream has no audio track".to_string()))?;
        let video = stream
            .video_track()
            .cloned()
            .ok_or_else(|| RoomError::Acquisition("stream has no video track".to_string()))?;

        let mic = LocalEntry::new(TrackRole::Mic, audio);
        let camera = LocalEntry::new(TrackRole::Camera, video);
        let tracks = LocalTracks {
            audio: mic.track.clone(),
            video: camera.track.clone(),
        };
        self.install_local(TrackRole::Mic, mic);
        self.install_local(TrackRole::Camera, camera);
        Ok(tracks)
    }

    async fn start_camera(&mut self, media: MediaStreamTrack) -> Result<Track, RoomError> {
        match self.local.camera.as_ref() {
            Some(camera) if camera.native.media.same_as(&media) => Ok(camera.track.clone()),
            Some(_) => self.replace_camera(media).await,
            None => self.publish_camera(media).await,
        }
    }

    async fn stop_camera(&mut self) -> Result<(), RoomError> {
        let Some(camera) = self.local.camera.take() else {
            return Ok(());
        };
        if self.state == ConnectionState::Connected {
            let result = self.backend.unpublish_track(&camera.native).await;
            if let Err(e) = result {
                self.local.camera = Some(camera);
                return Err(RoomError::publish(e));
            }
        }
        camera.track.stop();
        info!(target: "room.track_centric", "Camera stopped");
        Ok(())
    }

    async fn change_camera(&mut self, media: MediaStreamTrack) -> Result<Track, RoomError> {
        match self.local.camera.as_ref() {
            Some(camera) if camera.native.media.same_as(&media) => Ok(camera.track.clone()),
            Some(_) => self.replace_camera(media).await,
            None => self.publish_camera(media).await,
        }
    }

    fn enable_mic(&mut self, enable: bool) {
        let Some(mic) = self.local.mic.as_ref() else {
            debug!(target: "room.track_centric", "No microphone to toggle");
            return;
        };
        mic.native.media.set_enabled(enable);
        mic.track.set_enabled(enable);
        if self.state == ConnectionState::Connected {
            self.backend.set_track_enabled(&mic.native, enable);
        }
    }

    async fn change_mic(&mut self, device_id: &str) -> Result<Option<Track>, RoomError> {
        let Some(native) = self.local.mic.as_ref().map(|mic| mic.native.clone()) else {
            return Ok(None);
        };
        let media = self
            .backend
            .restart_track(&native, device_id)
            .await
            .map_err(RoomError::acquisition)?;

        let Some(mic) = self.local.mic.as_mut() else {
            return Ok(None);
        };
        media.set_enabled(mic.track.is_enabled());
        let previous = mic.track.replace_media(media.clone());
        if !previous.same_as(&media) {
            previous.stop();
        }
        mic.native.media = media;
        info!(target: "room.track_centric", device_id = %device_id, "Microphone changed");
        Ok(Some(mic.track.clone()))
    }

    #[instrument(
        skip_all,
        name = "room.track_centric.connect",
        fields(room_name = %options.room_name)
    )]
    async fn connect(&mut self, options: ConnectOptions) -> Result<(), RoomError> {
        if self.state != ConnectionState::Disconnected {
            return Err(RoomError::InvalidState(format!(
                "Cannot connect while {:?}",
                self.state
            )));
        }
        self.state = ConnectionState::Connecting;

        let native_options = NativeConnectOptions::recommended(&options.room_name);
        let tracks: Vec<NativeLocalTrack> = [&self.local.camera, &self.local.mic]
            .into_iter()
            .flatten()
            .map(|entry| entry.native.clone())
            .collect();
        info!(
            target: "room.track_centric",
            room_name = %options.room_name,
            tracks = tracks.len(),
            "Connecting to room"
        );

        let native = match self
            .backend
            .connect(&options.room_token, &native_options, &tracks)
            .await
        {
            Ok(native) => native,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                warn!(target: "room.track_centric", error = %e, "Connect failed");
                return Err(RoomError::connection(e));
            }
        };

        self.identity = Some(native.local_identity);
        self.native_events = Some(native.events);
        self.state = ConnectionState::Connected;

        // Announce members that were already present before any queued
        // callback can reference them.
        for identity in native.participants {
            self.on_participant_connected(identity);
        }

        info!(
            target: "room.track_centric",
            identity = ?self.identity,
            participants = self.participants.len(),
            "Connected to room"
        );
        Ok(())
    }

    async fn disconnect(&mut self) {
        let was_connected = self.state == ConnectionState::Connected;
        if self.state != ConnectionState::Disconnected {
            self.backend.disconnect().await;
        }
        self.clear_session();
        for entry in self.local.take_all() {
            entry.track.stop();
        }
        self.state = ConnectionState::Disconnected;
        if was_connected {
            info!(target: "room.track_centric", "Disconnected from room");
            self.events.emit(&RoomEvent::Disconnected { error: None });
        }
    }

    async fn start_screenshare(&mut self, stream: &MediaStream) -> Result<Track, RoomError> {
        if self.state != ConnectionState::Connected {
            return Err(RoomError::NotConnected);
        }
        let video = stream.video_track().cloned().ok_or_else(|| {
            RoomError::Acquisition("screen capture has no video track".to_string())
        })?;
        let screen = LocalEntry::new(TrackRole::ScreenVideo, video);
        let screen_audio = stream
            .audio_track()
            .cloned()
            .map(|audio| LocalEntry::new(TrackRole::ScreenAudio, audio));

        self.backend
            .publish_track(&screen.native, PublishPriority::Standard)
            .await
            .map_err(RoomError::publish)?;
        if let Some(audio) = &screen_audio {
            let published = self
                .backend
                .publish_track(&audio.native, PublishPriority::Standard)
                .await;
            if let Err(e) = published {
                let rolled_back = self.backend.unpublish_track(&screen.native).await;
                if let Err(rollback) = rolled_back {
                    warn!(
                        target: "room.track_centric",
                        error = %rollback,
                        "Failed to roll back screen video"
                    );
                }
                return Err(RoomError::publish(e));
            }
        }

        self.unpublish_screen().await;
        let track = screen.track.clone();
        self.local.screen = Some(screen);
        self.local.screen_audio = screen_audio;
        info!(
            target: "room.track_centric",
            track_id = %track.id(),
            with_audio = self.local.screen_audio.is_some(),
            "Screen share started"
        );
        Ok(track)
    }

    async fn stop_screen_share(&mut self) {
        if self.unpublish_screen().await {
            info!(target: "room.track_centric", "Screen share stopped");
        }
    }

    async fn signal(&mut self, event: &SignalEvent) -> Result<(), RoomError> {
        if self.state != ConnectionState::Connected {
            return Err(RoomError::NotConnected);
        }
        let payload = event.encode()?;
        self.backend
            .send_data(&payload)
            .map_err(RoomError::signaling)?;
        debug!(
            target: "room.track_centric",
            signal_type = ?event.signal_type,
            to = %event.to,
            "Signal sent"
        );
        Ok(())
    }

    fn set_audio_output_device(&mut self, device_id: &str) {
        self.audio_output = Some(device_id.to_string());
        for participant in self.participants.values() {
            for track in participant.tracks() {
                track.set_audio_output(device_id);
            }
        }
    }

    fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self
            .native_events
            .as_mut()
            .and_then(|events| events.try_recv().ok())
        {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    async fn dispatch_next(&mut self) -> bool {
        let Some(events) = self.native_events.as_mut() else {
            return false;
        };
        let next = events.recv().await;
        match next {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => {
                debug!(target: "room.track_centric", "Backend event stream closed");
                self.native_events = None;
                false
            }
        }
    }
}
