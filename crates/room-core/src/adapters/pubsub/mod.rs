//! Room over a publisher/subscriber backend.
//!
//! The backend publishes whole streams (at most one audio and one video track
//! each) and hands back rendering elements instead of tracks. This adapter
//! synthesizes role-level tracks from those elements:
//!
//! - Each remote stream is subscribed on creation. Its tracks are built once
//!   the subscriber's element exists, with ids derived from the stream id, so
//!   a replacement stream never shares ids with the stream it replaces.
//! - Audio enabled state follows the stream's `hasAudio` property.
//! - Participant identity is parsed from connection metadata
//!   ([`resolve_identity`]). A participant lives while it holds a track.
//!
//! Audio and video cannot be unpublished independently. Switching cameras
//! builds a second publisher that carries a clone of the current audio,
//! publishes it, waits [`AdapterSettings::camera_switch_grace`] and only then
//! retires the original.

pub mod backend;
pub(crate) mod handle;
pub mod identity;

pub use backend::{
    NativeConnection, NativePublisher, NativeSession, NativeStream, PubSubBackend, PublisherId,
    PublisherOptions, SessionEvent, StreamId, StreamProperty, SubscriberId, VideoChangeReason,
};
pub use handle::PubSubHandle;
pub use identity::resolve_identity;

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

/// Video and audio roles carried by a stream with the given name.
#[must_use]
pub fn stream_roles(name: &str) -> (TrackRole, TrackRole) {
    if name == TrackRole::ScreenVideo.backend_name() {
        (TrackRole::ScreenVideo, TrackRole::ScreenAudio)
    } else {
        (TrackRole::Camera, TrackRole::Mic)
    }
}

/// `<stream>-<role>`. The stream's second and later video tracks get `-2`, `-3`, ...
fn remote_track_id(stream_id: &StreamId, role: TrackRole, generation: u32) -> TrackId {
    if generation == 0 {
        TrackId::new(format!("{stream_id}-{}", role.backend_name()))
    } else {
        TrackId::new(format!("{stream_id}-{}-{}", role.backend_name(), generation + 1))
    }
}

/// First track of `kind` in the element's source stream.
fn element_media(element: &MediaElement, kind: MediaKind) -> Option<MediaStreamTrack> {
    let stream = element.src_object()?;
    match kind {
        MediaKind::Audio => stream.audio_track().cloned(),
        MediaKind::Video => stream.video_track().cloned(),
    }
}

fn local_track(role: TrackRole, media: MediaStreamTrack) -> Track {
    Track::local(role, media, TrackHandle::PubSub(PubSubHandle::Published))
}

/// One of our publishers and the local tracks it carries.
struct LocalPublisher {
    id: PublisherId,
    video: Option<Track>,
    audio: Option<Track>,
}

impl LocalPublisher {
    /// Build local tracks from the publisher element, falling back to the
    /// sources it was created with.
    fn from_native(
        native: &NativePublisher,
        roles: (TrackRole, TrackRole),
        video: MediaStreamTrack,
        audio: Option<MediaStreamTrack>,
    ) -> Self {
        let (video_role, audio_role) = roles;
        let video = element_media(&native.element, MediaKind::Video).unwrap_or(video);
        let audio = element_media(&native.element, MediaKind::Audio)
            .or(audio)
            .map(|media| local_track(audio_role, media));
        Self {
            id: native.id.clone(),
            video: Some(local_track(video_role, video)),
            audio,
        }
    }

    fn stop_tracks(&self) {
        for track in [&self.video, &self.audio].into_iter().flatten() {
            track.stop();
        }
    }
}

/// What we know about a subscribed remote stream.
#[derive(Debug)]
struct RemoteStream {
    identity: Identity,
    video_role: TrackRole,
    audio_role: TrackRole,
    has_audio: bool,
    has_video: bool,
    subscriber: SubscriberId,
    element: Option<MediaElement>,
    video_track: Option<TrackId>,
    audio_track: Option<TrackId>,
    /// Video tracks built so far; names the next one.
    video_tracks_built: u32,
}

/// [`Room`] implementation over a [`PubSubBackend`].
pub struct PubSubRoom<B: PubSubBackend> {
    backend: B,
    settings: AdapterSettings,
    state: ConnectionState,
    identity: Option<Identity>,
    connection_id: Option<String>,
    participants: HashMap<Identity, Participant>,
    streams: HashMap<StreamId, RemoteStream>,
    events: EventBus,
    native_events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    publisher: Option<LocalPublisher>,
    screen: Option<LocalPublisher>,
    audio_output: Option<String>,
}

impl<B: PubSubBackend> PubSubRoom<B> {
    pub fn new(backend: B, settings: AdapterSettings) -> Self {
        Self {
            backend,
            settings,
            state: ConnectionState::Disconnected,
            identity: None,
            connection_id: None,
            participants: HashMap::new(),
            streams: HashMap::new(),
            events: EventBus::new(),
            native_events: None,
            publisher: None,
            screen: None,
            audio_output: None,
        }
    }

    fn camera_options(
        video: Option<MediaStreamTrack>,
        audio: Option<MediaStreamTrack>,
        publish_audio: bool,
    ) -> PublisherOptions {
        PublisherOptions {
            name: TrackRole::Camera.backend_name().to_string(),
            publish_video: video.is_some(),
            audio_source: audio,
            video_source: video,
            publish_audio,
        }
    }

    /// Create the first camera publisher, video only.
    async fn start_publisher(&mut self, media: MediaStreamTrack) -> Result<Track, RoomError> {
        let native = self
            .backend
            .init_publisher(Self::camera_options(Some(media.clone()), None, false))
            .await
            .map_err(RoomError::acquisition)?;
        if self.state == ConnectionState::Connected {
            let published = self.backend.publish(&native.id).await;
            if let Err(e) = published {
                self.backend.destroy_publisher(&native.id);
                return Err(RoomError::publish(e));
            }
        }
        let video_media = element_media(&native.element, MediaKind::Video).unwrap_or(media);
        let track = local_track(TrackRole::Camera, video_media);
        self.publisher = Some(LocalPublisher {
            id: native.id,
            video: Some(track.clone()),
            audio: None,
        });
        info!(
            target: "room.pubsub",
            track_id = %track.id(),
            published = self.state == ConnectionState::Connected,
            "Camera started"
        );
        Ok(track)
    }

    /// Replace the camera publisher with one that publishes `media`.
    ///
    /// The replacement carries a clone of the current audio so the microphone
    /// stays live, and is published before the original is retired.
    async fn switch_publisher(&mut self, media: MediaStreamTrack) -> Result<Track, RoomError> {
        let Some(current) = self.publisher.as_ref() else {
            return self.start_publisher(media).await;
        };
        let old_id = current.id.clone();
        let mic_enabled = current.audio.as_ref().is_none_or(Track::is_enabled);
        let audio_clone = current.audio.as_ref().map(|mic| {
            let clone = mic.media().clone_track();
            clone.set_enabled(mic_enabled);
            clone
        });

        let options = Self::camera_options(Some(media.clone()), audio_clone.clone(), mic_enabled);
        let native = match self.backend.init_publisher(options).await {
            Ok(native) => native,
            Err(e) => {
                if let Some(clone) = &audio_clone {
                    clone.stop();
                }
                return Err(RoomError::acquisition(e));
            }
        };

        if self.state == ConnectionState::Connected {
            let published = self.backend.publish(&native.id).await;
            if let Err(e) = published {
                self.backend.destroy_publisher(&native.id);
                if let Some(clone) = &audio_clone {
                    clone.stop();
                }
                warn!(target: "room.pubsub", error = %e, "Replacement publisher failed to publish");
                return Err(RoomError::publish(e));
            }
            // Both publishers are live here. The grace delay lets subscribers
            // pick up the replacement before the original disappears.
            tokio::time::sleep(self.settings.camera_switch_grace).await;
            self.backend.unpublish(&old_id);
        }
        self.backend.destroy_publisher(&old_id);

        let Some(previous) = self.publisher.take() else {
            return Err(RoomError::InvalidState(
                "camera publisher disappeared during switch".to_string(),
            ));
        };
        let video_media = element_media(&native.element, MediaKind::Video).unwrap_or(media);
        let camera = local_track(TrackRole::Camera, video_media);
        if let Some(old_camera) = &previous.video {
            old_camera.stop();
        }
        let mic = previous.audio.clone();
        if let (Some(mic), Some(clone)) = (&mic, audio_clone) {
            let audio_media = element_media(&native.element, MediaKind::Audio).unwrap_or(clone);
            let replaced = mic.replace_media(audio_media.clone());
            if !replaced.same_as(&audio_media) {
                replaced.stop();
            }
        }
        self.publisher = Some(LocalPublisher {
            id: native.id,
            video: Some(camera.clone()),
            audio: mic,
        });
        info!(
            target: "room.pubsub",
            track_id = %camera.id(),
            device_id = ?camera.media().device_id(),
            grace = ?self.settings.camera_switch_grace,
            "Camera changed"
        );
        Ok(camera)
    }

    fn retire_publisher(&mut self, publisher: &LocalPublisher) {
        if self.state == ConnectionState::Connected {
            self.backend.unpublish(&publisher.id);
        }
        self.backend.destroy_publisher(&publisher.id);
        publisher.stop_tracks();
    }

    /// Drop session state: streams, remote participants, identity and callbacks.
    fn clear_session(&mut self) {
        self.native_events = None;
        self.identity = None;
        self.connection_id = None;
        self.streams.clear();
        for (_, mut participant) in self.participants.drain() {
            for track in participant.take_all() {
                track.stop();
            }
        }
    }

    /// Store a remote track, announcing its participant first if new.
    fn add_remote_track(&mut self, identity: &Identity, track: Track) {
        if !self.participants.contains_key(identity) {
            let participant = Participant::new(identity.clone());
            self.participants.insert(identity.clone(), participant.clone());
            self.events
                .emit(&RoomEvent::ParticipantConnected { participant });
        }
        let Some(participant) = self.participants.get_mut(identity) else {
            return;
        };
        if let Some(displaced) = participant.set_track(track.clone()) {
            displaced.stop();
        }
        let participant = participant.clone();
        debug!(
            target: "room.pubsub",
            identity = %identity,
            track_id = %track.id(),
            role = ?track.role(),
            "Track subscribed"
        );
        self.events
            .emit(&RoomEvent::TrackSubscribed { track, participant });
    }

    /// Remove a participant that no longer holds any track.
    fn prune_participant(&mut self, identity: &Identity) {
        if !self
            .participants
            .get(identity)
            .is_some_and(|participant| !participant.has_tracks())
        {
            return;
        }
        if let Some(participant) = self.participants.remove(identity) {
            self.events
                .emit(&RoomEvent::ParticipantDisconnected { participant });
        }
    }

    fn stream_track(&self, stream_id: &StreamId, kind: MediaKind) -> Option<(Track, Participant)> {
        let stream = self.streams.get(stream_id)?;
        let id = match kind {
            MediaKind::Video => stream.video_track.as_ref()?,
            MediaKind::Audio => stream.audio_track.as_ref()?,
        };
        let participant = self.participants.get(&stream.identity)?;
        let track = participant.track_by_id(id)?.clone();
        Some((track, participant.clone()))
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::StreamCreated { stream } => self.on_stream_created(stream),
            SessionEvent::StreamDestroyed { stream } => self.on_stream_destroyed(&stream.id),
            SessionEvent::StreamPropertyChanged { stream, change } => {
                self.on_stream_property_changed(&stream.id, change);
            }
            SessionEvent::SubscriberVideoElementCreated {
                stream_id,
                subscriber,
                element,
            } => self.on_element_created(&stream_id, &subscriber, element),
            SessionEvent::SubscriberVideoElementPlaying { stream_id } => {
                self.on_element_playing(&stream_id);
            }
            SessionEvent::SubscriberVideoDisabled { stream_id, reason } => {
                if reason == VideoChangeReason::PublishVideo {
                    self.on_video_unpublished(&stream_id);
                } else {
                    debug!(
                        target: "room.pubsub",
                        stream_id = %stream_id,
                        reason = ?reason,
                        "Video disabled"
                    );
                }
            }
            SessionEvent::SubscriberVideoEnabled { stream_id, reason } => {
                if reason == VideoChangeReason::PublishVideo {
                    self.on_video_republished(&stream_id);
                } else {
                    debug!(
                        target: "room.pubsub",
                        stream_id = %stream_id,
                        reason = ?reason,
                        "Video enabled"
                    );
                }
            }
            SessionEvent::Signal { data, from } => {
                debug!(
                    target: "room.pubsub",
                    from = ?from.as_ref().and_then(|c| resolve_identity(&c.data)),
                    len = data.len(),
                    "Signal received"
                );
                room::handle_signal_data(self, &data);
            }
            SessionEvent::SessionDisconnected { reason } => self.on_session_disconnected(reason),
        }
    }

    fn on_stream_created(&mut self, stream: NativeStream) {
        if self.connection_id.as_deref() == Some(stream.connection.id.as_str()) {
            debug!(target: "room.pubsub", stream_id = %stream.id, "Ignoring own stream");
            return;
        }
        let Some(identity) = resolve_identity(&stream.connection.data) else {
            warn!(
                target: "room.pubsub",
                stream_id = %stream.id,
                connection_id = %stream.connection.id,
                "Ignoring stream with unresolvable identity"
            );
            return;
        };
        if self.identity.as_ref() == Some(&identity) {
            debug!(
                target: "room.pubsub",
                stream_id = %stream.id,
                connection_id = %stream.connection.id,
                "Ignoring stream published under local identity"
            );
            return;
        }
        let subscriber = match self.backend.subscribe(&stream.id) {
            Ok(subscriber) => subscriber,
            Err(e) => {
                warn!(
                    target: "room.pubsub",
                    stream_id = %stream.id,
                    error = %e,
                    "Failed to subscribe to stream"
                );
                return;
            }
        };
        let (video_role, audio_role) = stream_roles(&stream.name);
        debug!(
            target: "room.pubsub",
            stream_id = %stream.id,
            identity = %identity,
            name = %stream.name,
            "Stream subscribed"
        );
        self.streams.insert(
            stream.id,
            RemoteStream {
                identity,
                video_role,
                audio_role,
                has_audio: stream.has_audio,
                has_video: stream.has_video,
                subscriber,
                element: None,
                video_track: None,
                audio_track: None,
                video_tracks_built: 0,
            },
        );
    }

    fn on_element_created(
        &mut self,
        stream_id: &StreamId,
        subscriber: &SubscriberId,
        element: MediaElement,
    ) {
        let Some(stream) = self.streams.get_mut(stream_id) else {
            debug!(target: "room.pubsub", stream_id = %stream_id, "Element for unknown stream");
            return;
        };
        if &stream.subscriber != subscriber {
            debug!(target: "room.pubsub", stream_id = %stream_id, "Element for stale subscriber");
            return;
        }
        stream.element = Some(element.clone());
        let identity = stream.identity.clone();

        let mut tracks = Vec::new();
        if stream.has_video && stream.video_track.is_none() {
            if let Some(media) = element_media(&element, MediaKind::Video) {
                let id = remote_track_id(stream_id, stream.video_role, stream.video_tracks_built);
                stream.video_tracks_built += 1;
                let handle = TrackHandle::PubSub(PubSubHandle::subscribed(
                    stream_id.clone(),
                    element.clone(),
                ));
                stream.video_track = Some(id.clone());
                tracks.push(Track::remote(id, stream.video_role, media, handle, true));
            }
        }
        if stream.audio_track.is_none() {
            if let Some(media) = element_media(&element, MediaKind::Audio) {
                let id = remote_track_id(stream_id, stream.audio_role, 0);
                let handle = TrackHandle::PubSub(PubSubHandle::subscribed(
                    stream_id.clone(),
                    element.clone(),
                ));
                stream.audio_track = Some(id.clone());
                let track = Track::remote(id, stream.audio_role, media, handle, stream.has_audio);
                if let Some(device_id) = &self.audio_output {
                    track.set_audio_output(device_id);
                }
                tracks.push(track);
            }
        }

        for track in tracks {
            self.add_remote_track(&identity, track);
        }
    }

    /// The subscriber element started playing; its media may have changed.
    fn on_element_playing(&mut self, stream_id: &StreamId) {
        let Some(element) = self.streams.get(stream_id).and_then(|s| s.element.clone()) else {
            return;
        };
        let Some(media) = element_media(&element, MediaKind::Video) else {
            return;
        };
        let Some((track, _)) = self.stream_track(stream_id, MediaKind::Video) else {
            return;
        };
        if !track.media().same_as(&media) {
            track.replace_media(media);
            debug!(target: "room.pubsub", track_id = %track.id(), "Video media refreshed");
        }
    }

    fn on_video_unpublished(&mut self, stream_id: &StreamId) {
        let Some(stream) = self.streams.get_mut(stream_id) else {
            return;
        };
        let Some(id) = stream.video_track.take() else {
            return;
        };
        let identity = stream.identity.clone();
        let role = stream.video_role;
        let Some(participant) = self.participants.get_mut(&identity) else {
            return;
        };
        let Some(track) = participant.take_track_if(role, &id) else {
            return;
        };
        // The subscriber element still carries the stream's audio.
        track.detach();
        let participant = participant.clone();
        self.events
            .emit(&RoomEvent::TrackUnpublished { track, participant });
        self.prune_participant(&identity);
    }

    fn on_video_republished(&mut self, stream_id: &StreamId) {
        let Some(stream) = self.streams.get_mut(stream_id) else {
            return;
        };
        if stream.video_track.is_some() {
            return;
        }
        let Some(element) = stream.element.clone() else {
            return;
        };
        let Some(media) = element_media(&element, MediaKind::Video) else {
            debug!(target: "room.pubsub", stream_id = %stream_id, "Video enabled without media");
            return;
        };
        stream.has_video = true;
        let id = remote_track_id(stream_id, stream.video_role, stream.video_tracks_built);
        stream.video_tracks_built += 1;
        stream.video_track = Some(id.clone());
        let identity = stream.identity.clone();
        let handle = TrackHandle::PubSub(PubSubHandle::subscribed(stream_id.clone(), element));
        let track = Track::remote(id, stream.video_role, media, handle, true);
        self.add_remote_track(&identity, track);
    }

    fn on_stream_destroyed(&mut self, stream_id: &StreamId) {
        let Some(stream) = self.streams.remove(stream_id) else {
            debug!(target: "room.pubsub", stream_id = %stream_id, "Unknown stream destroyed");
            return;
        };
        let removals = [
            (stream.video_role, stream.video_track),
            (stream.audio_role, stream.audio_track),
        ];
        for (role, id) in removals {
            let Some(id) = id else {
                continue;
            };
            let Some(participant) = self.participants.get_mut(&stream.identity) else {
                break;
            };
            let Some(track) = participant.take_track_if(role, &id) else {
                continue;
            };
            track.stop();
            let participant = participant.clone();
            self.events
                .emit(&RoomEvent::TrackUnpublished { track, participant });
        }
        self.prune_participant(&stream.identity);
    }

    fn on_stream_property_changed(&mut self, stream_id: &StreamId, change: StreamProperty) {
        let Some(stream) = self.streams.get_mut(stream_id) else {
            return;
        };
        match change {
            StreamProperty::HasAudio(has_audio) => {
                stream.has_audio = has_audio;
                if let Some((track, participant)) = self.stream_track(stream_id, MediaKind::Audio) {
                    track.set_enabled(has_audio);
                    let event = if has_audio {
                        RoomEvent::TrackEnabled { track, participant }
                    } else {
                        RoomEvent::TrackDisabled { track, participant }
                    };
                    self.events.emit(&event);
                }
            }
            StreamProperty::HasVideo(has_video) => {
                stream.has_video = has_video;
                debug!(
                    target: "room.pubsub",
                    stream_id = %stream_id,
                    has_video,
                    "Stream video changed"
                );
            }
            StreamProperty::VideoDimensions(dimensions) => {
                if let Some((track, participant)) = self.stream_track(stream_id, MediaKind::Video) {
                    track.media().set_dimensions(dimensions);
                    self.events
                        .emit(&RoomEvent::TrackDimensionsChanged { track, participant });
                }
            }
        }
    }

    fn on_session_disconnected(&mut self, reason: Option<String>) {
        if self.state != ConnectionState::Connected {
            return;
        }
        warn!(target: "room.pubsub", reason = ?reason, "Backend ended the session");
        self.clear_session();
        if let Some(screen) = self.screen.take() {
            self.backend.destroy_publisher(&screen.id);
            screen.stop_tracks();
        }
        self.state = ConnectionState::Disconnected;
        self.events.emit(&RoomEvent::Disconnected { error: reason });
    }
}

#[async_trait(?Send)]
impl<B: PubSubBackend> Room for PubSubRoom<B> {
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
        let publisher = if role.is_screen() {
            self.screen.as_ref()
        } else {
            self.publisher.as_ref()
        }?;
        match role.kind() {
            MediaKind::Video => publisher.video.clone(),
            MediaKind::Audio => publisher.audio.clone(),
        }
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

        let options = Self::camera_options(
            Some(video.clone()),
            Some(audio.clone()),
            audio.is_enabled(),
        );
        let native = self
            .backend
            .init_publisher(options)
            .await
            .map_err(RoomError::acquisition)?;
        let publisher = LocalPublisher::from_native(
            &native,
            (TrackRole::Camera, TrackRole::Mic),
            video,
            Some(audio),
        );
        let (Some(audio), Some(video)) = (publisher.audio.clone(), publisher.video.clone()) else {
            self.backend.destroy_publisher(&native.id);
            return Err(RoomError::Acquisition(
                "publisher is missing local media".to_string(),
            ));
        };

        if let Some(previous) = self.publisher.replace(publisher) {
            self.backend.destroy_publisher(&previous.id);
            for track in [previous.video, previous.audio].into_iter().flatten() {
                track.detach();
                let media = track.media();
                if !media.same_as(&audio.media()) && !media.same_as(&video.media()) {
                    media.stop();
                }
            }
        }
        Ok(LocalTracks { audio, video })
    }

    async fn start_camera(&mut self, media: MediaStreamTrack) -> Result<Track, RoomError> {
        let current = self.publisher.as_ref().and_then(|p| p.video.clone());
        match current {
            Some(camera) if camera.media().same_as(&media) => Ok(camera),
            _ if self.publisher.is_some() => self.switch_publisher(media).await,
            _ => self.start_publisher(media).await,
        }
    }

    async fn stop_camera(&mut self) -> Result<(), RoomError> {
        let Some(publisher) = self.publisher.as_mut() else {
            return Ok(());
        };
        let Some(camera) = publisher.video.take() else {
            return Ok(());
        };
        let id = publisher.id.clone();
        let result = self.backend.publish_video(&id, false).await;
        if let Err(e) = result {
            if let Some(publisher) = self.publisher.as_mut() {
                publisher.video = Some(camera);
            }
            return Err(RoomError::publish(e));
        }
        camera.stop();
        info!(target: "room.pubsub", "Camera stopped");
        Ok(())
    }

    async fn change_camera(&mut self, media: MediaStreamTrack) -> Result<Track, RoomError> {
        self.start_camera(media).await
    }

    fn enable_mic(&mut self, enable: bool) {
        let Some(publisher) = self.publisher.as_ref() else {
            debug!(target: "room.pubsub", "No microphone to toggle");
            return;
        };
        let Some(mic) = publisher.audio.as_ref() else {
            debug!(target: "room.pubsub", "No microphone to toggle");
            return;
        };
        mic.media().set_enabled(enable);
        mic.set_enabled(enable);
        self.backend.publish_audio(&publisher.id, enable);
    }

    async fn change_mic(&mut self, device_id: &str) -> Result<Option<Track>, RoomError> {
        let Some((id, mic)) = self
            .publisher
            .as_ref()
            .and_then(|p| p.audio.clone().map(|mic| (p.id.clone(), mic)))
        else {
            return Ok(None);
        };
        let media = self
            .backend
            .set_audio_source(&id, device_id)
            .await
            .map_err(RoomError::acquisition)?;
        media.set_enabled(mic.is_enabled());
        let previous = mic.replace_media(media.clone());
        if !previous.same_as(&media) {
            previous.stop();
        }
        info!(target: "room.pubsub", device_id = %device_id, "Microphone changed");
        Ok(Some(mic))
    }

    #[instrument(skip_all, name = "room.pubsub.connect", fields(room_name = %options.room_name))]
    async fn connect(&mut self, options: ConnectOptions) -> Result<(), RoomError> {
        if self.state != ConnectionState::Disconnected {
            return Err(RoomError::InvalidState(format!(
                "Cannot connect while {:?}",
                self.state
            )));
        }
        let Some(publisher_id) = self.publisher.as_ref().map(|p| p.id.clone()) else {
            return Err(RoomError::InvalidState(
                "Cannot connect without local media".to_string(),
            ));
        };
        self.state = ConnectionState::Connecting;
        info!(target: "room.pubsub", room_name = %options.room_name, "Connecting to session");

        let session = match self
            .backend
            .connect(&options.room_name, &options.room_token)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                warn!(target: "room.pubsub", error = %e, "Connect failed");
                return Err(RoomError::connection(e));
            }
        };

        let Some(identity) = resolve_identity(&session.connection.data) else {
            self.backend.disconnect().await;
            self.state = ConnectionState::Disconnected;
            warn!(
                target: "room.pubsub",
                connection_id = %session.connection.id,
                "Connection metadata carries no identity"
            );
            return Err(RoomError::Connection(
                "connection metadata carries no identity".to_string(),
            ));
        };

        let published = self.backend.publish(&publisher_id).await;
        if let Err(e) = published {
            self.backend.disconnect().await;
            self.state = ConnectionState::Disconnected;
            warn!(target: "room.pubsub", error = %e, "Publish after connect failed");
            return Err(RoomError::publish(e));
        }

        self.identity = Some(identity);
        self.connection_id = Some(session.connection.id);
        self.native_events = Some(session.events);
        self.state = ConnectionState::Connected;
        info!(target: "room.pubsub", identity = ?self.identity, "Connected to session");
        Ok(())
    }

    async fn disconnect(&mut self) {
        let was_connected = self.state == ConnectionState::Connected;
        if self.state != ConnectionState::Disconnected {
            self.backend.disconnect().await;
        }
        self.clear_session();
        self.state = ConnectionState::Disconnected;
        for publisher in [self.screen.take(), self.publisher.take()].into_iter().flatten() {
            self.retire_publisher(&publisher);
        }
        if was_connected {
            info!(target: "room.pubsub", "Disconnected from session");
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
        let audio = stream.audio_track().cloned();
        let options = PublisherOptions {
            name: TrackRole::ScreenVideo.backend_name().to_string(),
            publish_audio: audio.is_some(),
            publish_video: true,
            audio_source: audio.clone(),
            video_source: Some(video.clone()),
        };
        let native = self
            .backend
            .init_publisher(options)
            .await
            .map_err(RoomError::acquisition)?;
        let screen = LocalPublisher::from_native(
            &native,
            (TrackRole::ScreenVideo, TrackRole::ScreenAudio),
            video,
            audio,
        );
        let Some(track) = screen.video.clone() else {
            self.backend.destroy_publisher(&native.id);
            return Err(RoomError::InvalidState("screen publisher has no video".to_string()));
        };
        let published = self.backend.publish(&native.id).await;
        if let Err(e) = published {
            self.backend.destroy_publisher(&native.id);
            return Err(RoomError::publish(e));
        }

        if let Some(previous) = self.screen.replace(screen) {
            self.retire_publisher(&previous);
        }
        info!(
            target: "room.pubsub",
            track_id = %track.id(),
            with_audio = self.local_track(TrackRole::ScreenAudio).is_some(),
            "Screen share started"
        );
        Ok(track)
    }

    async fn stop_screen_share(&mut self) {
        if let Some(screen) = self.screen.take() {
            self.retire_publisher(&screen);
            info!(target: "room.pubsub", "Screen share stopped");
        }
    }

    async fn signal(&mut self, event: &SignalEvent) -> Result<(), RoomError> {
        if self.state != ConnectionState::Connected {
            return Err(RoomError::NotConnected);
        }
        let payload = event.encode()?;
        self.backend
            .signal(&payload)
            .await
            .map_err(RoomError::signaling)?;
        debug!(
            target: "room.pubsub",
            signal_type = ?event.signal_type,
            to = %event.to,
            "Signal sent"
        );
        Ok(())
    }

    fn set_audio_output_device(&mut self, device_id: &str) {
        self.audio_output = Some(device_id.to_string());
        self.backend.set_audio_output_device(device_id);
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
                debug!(target: "room.pubsub", "Backend event stream closed");
                self.native_events = None;
                false
            }
        }
    }
}
