//! Mock publisher/subscriber backend.
//!
//! Provides a [`PubSubBackend`] implementation that can be configured to:
//! - Report connection metadata for the local identity
//! - Reject connects, publisher creation or publishes
//! - Record every call the adapter makes, with the (tokio) time it was made
//!
//! Publisher elements are created with the exact sources the publisher was
//! given, so local tracks share media handles with the caller's fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use room_test_utils::MockPubSubBackend;
//!
//! let (backend, controller) = MockPubSubBackend::builder().identity("alice").build();
//!
//! // Move `backend` into a room, then drive it through `controller`.
//! let stream = controller.add_remote_stream("bob", "stream-1", "camera", true, true);
//! controller.attach_subscriber_element(&stream.id, remote_media(true, true));
//! ```

use crate::fixtures::connection_data;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use room_core::adapters::pubsub::{
    NativeConnection, NativePublisher, NativeSession, NativeStream, PubSubBackend, PublisherId,
    PublisherOptions, SessionEvent, StreamId, StreamProperty, SubscriberId, VideoChangeReason,
};
use room_core::errors::BackendError;
use room_core::media::{MediaElement, MediaKind, MediaStream, MediaStreamTrack, MediaTrackSettings};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Connection id the mock assigns to the local session.
pub const LOCAL_CONNECTION_ID: &str = "conn-local";

/// A call the adapter made on the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubCall {
    InitPublisher {
        publisher: PublisherId,
        name: String,
        publish_audio: bool,
        publish_video: bool,
    },
    Connect {
        session: String,
    },
    Publish(PublisherId),
    Unpublish(PublisherId),
    DestroyPublisher(PublisherId),
    PublishVideo {
        publisher: PublisherId,
        enabled: bool,
    },
    PublishAudio {
        publisher: PublisherId,
        enabled: bool,
    },
    SetAudioSource {
        publisher: PublisherId,
        device_id: String,
    },
    Subscribe(StreamId),
    Signal(String),
    Disconnect,
    SetAudioOutputDevice(String),
}

#[derive(Debug)]
struct PublisherRecord {
    options: PublisherOptions,
    element: MediaElement,
    destroyed: bool,
}

#[derive(Debug, Default)]
struct State {
    connection_data: String,
    connect_error: Option<BackendError>,
    init_error: Option<BackendError>,
    publish_error: Option<BackendError>,
    signal_error: Option<BackendError>,
    next_publisher: u32,
    next_subscriber: u32,
    publishers: HashMap<PublisherId, PublisherRecord>,
    published: Vec<PublisherId>,
    subscribers: HashMap<StreamId, SubscriberId>,
    calls: Vec<(Instant, PubSubCall)>,
    audio_output: Option<String>,
    last_token: Option<String>,
    sender: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl State {
    fn record(&mut self, call: PubSubCall) {
        self.calls.push((Instant::now(), call));
    }
}

/// Mock [`PubSubBackend`]. Build with [`MockPubSubBackend::builder`].
#[derive(Debug)]
pub struct MockPubSubBackend {
    state: Rc<RefCell<State>>,
}

impl MockPubSubBackend {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> MockPubSubBackendBuilder {
        MockPubSubBackendBuilder::default()
    }
}

/// Builder for [`MockPubSubBackend`] configuration.
#[derive(Debug, Default)]
pub struct MockPubSubBackendBuilder {
    connection_data: Option<String>,
    connect_error: Option<BackendError>,
    fail_publish: bool,
}

impl MockPubSubBackendBuilder {
    /// Attach `{"identity": identity}` to the local connection.
    #[must_use]
    pub fn identity(mut self, identity: &str) -> Self {
        self.connection_data = Some(connection_data(identity));
        self
    }

    /// Attach raw metadata to the local connection.
    #[must_use]
    pub fn connection_data(mut self, data: impl Into<String>) -> Self {
        self.connection_data = Some(data.into());
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
    pub fn build(self) -> (MockPubSubBackend, PubSubBackendController) {
        let state = Rc::new(RefCell::new(State {
            connection_data: self
                .connection_data
                .unwrap_or_else(|| connection_data("local-user")),
            connect_error: self.connect_error,
            publish_error: self
                .fail_publish
                .then(|| BackendError::Rejected("publish rejected".to_string())),
            ..State::default()
        }));
        (
            MockPubSubBackend {
                state: Rc::clone(&state),
            },
            PubSubBackendController { state },
        )
    }
}

#[async_trait(?Send)]
impl PubSubBackend for MockPubSubBackend {
    async fn init_publisher(
        &mut self,
        options: PublisherOptions,
    ) -> Result<NativePublisher, BackendError> {
        let mut state = self.state.borrow_mut();
        state.next_publisher += 1;
        let id = PublisherId::new(format!("pub-{}", state.next_publisher));
        state.record(PubSubCall::InitPublisher {
            publisher: id.clone(),
            name: options.name.clone(),
            publish_audio: options.publish_audio,
            publish_video: options.publish_video,
        });
        if let Some(error) = state.init_error.clone() {
            return Err(error);
        }
        let sources: Vec<MediaStreamTrack> = [&options.audio_source, &options.video_source]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        let element = MediaElement::with_source(MediaStream::new(sources));
        state.publishers.insert(
            id.clone(),
            PublisherRecord {
                options,
                element: element.clone(),
                destroyed: false,
            },
        );
        Ok(NativePublisher { id, element })
    }

    async fn connect(
        &mut self,
        session: &str,
        token: &SecretString,
    ) -> Result<NativeSession, BackendError> {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::Connect {
            session: session.to_string(),
        });
        state.last_token = Some(token.expose_secret().to_string());
        if let Some(error) = state.connect_error.clone() {
            return Err(error);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.sender = Some(tx);
        Ok(NativeSession {
            connection: NativeConnection {
                id: LOCAL_CONNECTION_ID.to_string(),
                data: state.connection_data.clone(),
            },
            events: rx,
        })
    }

    async fn publish(&mut self, publisher: &PublisherId) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::Publish(publisher.clone()));
        if let Some(error) = state.publish_error.clone() {
            return Err(error);
        }
        state.published.push(publisher.clone());
        Ok(())
    }

    fn unpublish(&mut self, publisher: &PublisherId) {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::Unpublish(publisher.clone()));
        state.published.retain(|p| p != publisher);
    }

    fn destroy_publisher(&mut self, publisher: &PublisherId) {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::DestroyPublisher(publisher.clone()));
        state.published.retain(|p| p != publisher);
        if let Some(record) = state.publishers.get_mut(publisher) {
            record.destroyed = true;
            record.element.set_src_object(None);
            record.element.remove();
        }
    }

    async fn publish_video(
        &mut self,
        publisher: &PublisherId,
        enabled: bool,
    ) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::PublishVideo {
            publisher: publisher.clone(),
            enabled,
        });
        if let Some(record) = state.publishers.get_mut(publisher) {
            record.options.publish_video = enabled;
        }
        Ok(())
    }

    fn publish_audio(&mut self, publisher: &PublisherId, enabled: bool) {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::PublishAudio {
            publisher: publisher.clone(),
            enabled,
        });
        if let Some(record) = state.publishers.get_mut(publisher) {
            record.options.publish_audio = enabled;
        }
    }

    async fn set_audio_source(
        &mut self,
        publisher: &PublisherId,
        device_id: &str,
    ) -> Result<MediaStreamTrack, BackendError> {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::SetAudioSource {
            publisher: publisher.clone(),
            device_id: device_id.to_string(),
        });
        let Some(record) = state.publishers.get_mut(publisher) else {
            return Err(BackendError::Rejected(format!("unknown publisher {publisher}")));
        };
        let audio = MediaStreamTrack::with_settings(
            MediaKind::Audio,
            MediaTrackSettings {
                device_id: Some(device_id.to_string()),
                ..MediaTrackSettings::default()
            },
        );
        let mut sources = vec![audio.clone()];
        sources.extend(record.options.video_source.clone());
        record.element.set_src_object(Some(MediaStream::new(sources)));
        record.options.audio_source = Some(audio.clone());
        Ok(audio)
    }

    fn subscribe(&mut self, stream: &StreamId) -> Result<SubscriberId, BackendError> {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::Subscribe(stream.clone()));
        state.next_subscriber += 1;
        let subscriber = SubscriberId::new(format!("sub-{}", state.next_subscriber));
        state.subscribers.insert(stream.clone(), subscriber.clone());
        Ok(subscriber)
    }

    async fn signal(&mut self, data: &str) -> Result<(), BackendError> {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::Signal(data.to_string()));
        match state.signal_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn disconnect(&mut self) {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::Disconnect);
        state.sender = None;
        state.published.clear();
        state.subscribers.clear();
    }

    fn set_audio_output_device(&mut self, device_id: &str) {
        let mut state = self.state.borrow_mut();
        state.record(PubSubCall::SetAudioOutputDevice(device_id.to_string()));
        state.audio_output = Some(device_id.to_string());
    }
}

/// Drives a [`MockPubSubBackend`] after it has been moved into a room.
#[derive(Debug, Clone)]
pub struct PubSubBackendController {
    state: Rc<RefCell<State>>,
}

impl PubSubBackendController {
    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PubSubCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Every call made so far with the time it was made.
    #[must_use]
    pub fn timed_calls(&self) -> Vec<(Instant, PubSubCall)> {
        self.state.borrow().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Publishers currently published, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<PublisherId> {
        self.state.borrow().published.clone()
    }

    /// Publishers created and not yet destroyed.
    #[must_use]
    pub fn live_publishers(&self) -> Vec<PublisherId> {
        let state = self.state.borrow();
        let mut live: Vec<PublisherId> = state
            .publishers
            .iter()
            .filter(|(_, record)| !record.destroyed)
            .map(|(id, _)| id.clone())
            .collect();
        live.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        live
    }

    /// Options the publisher was created with, updated by later toggles.
    #[must_use]
    pub fn publisher_options(&self, publisher: &PublisherId) -> Option<PublisherOptions> {
        self.state
            .borrow()
            .publishers
            .get(publisher)
            .map(|record| record.options.clone())
    }

    /// Subscriber created for `stream`, if any.
    #[must_use]
    pub fn subscriber_for(&self, stream: &StreamId) -> Option<SubscriberId> {
        self.state.borrow().subscribers.get(stream).cloned()
    }

    /// Device passed to the global audio output switch.
    #[must_use]
    pub fn audio_output(&self) -> Option<String> {
        self.state.borrow().audio_output.clone()
    }

    /// Token passed to the last connect.
    #[must_use]
    pub fn last_token(&self) -> Option<String> {
        self.state.borrow().last_token.clone()
    }

    /// Reject every publish with `error`, or accept them again with `None`.
    pub fn set_publish_error(&self, error: Option<BackendError>) {
        self.state.borrow_mut().publish_error = error;
    }

    /// Reject publisher creation with `error`, or accept it again with `None`.
    pub fn set_init_error(&self, error: Option<BackendError>) {
        self.state.borrow_mut().init_error = error;
    }

    /// Reject signals with `error`.
    pub fn fail_signal(&self, error: BackendError) {
        self.state.borrow_mut().signal_error = Some(error);
    }

    /// Queue a native callback. Returns false when no session is open.
    pub fn emit(&self, event: SessionEvent) -> bool {
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

    /// Announce a remote stream published by `identity`.
    pub fn add_remote_stream(
        &self,
        identity: &str,
        stream_id: &str,
        name: &str,
        has_audio: bool,
        has_video: bool,
    ) -> NativeStream {
        let stream = remote_stream(identity, stream_id, name, has_audio, has_video);
        self.emit(SessionEvent::StreamCreated {
            stream: stream.clone(),
        });
        stream
    }

    /// Announce a stream whose connection carries arbitrary metadata.
    pub fn add_stream_with_data(
        &self,
        connection_data: &str,
        stream_id: &str,
        name: &str,
    ) -> NativeStream {
        let stream = NativeStream {
            id: StreamId::new(stream_id),
            name: name.to_string(),
            connection: NativeConnection {
                id: format!("conn-{stream_id}"),
                data: connection_data.to_string(),
            },
            has_audio: true,
            has_video: true,
        };
        self.emit(SessionEvent::StreamCreated {
            stream: stream.clone(),
        });
        stream
    }

    /// Create the subscriber element for `stream` with `media` as its source.
    ///
    /// Uses the subscriber the adapter created, or a stale id if it never
    /// subscribed.
    pub fn attach_subscriber_element(&self, stream: &StreamId, media: MediaStream) -> MediaElement {
        let subscriber = self
            .subscriber_for(stream)
            .unwrap_or_else(|| SubscriberId::new("sub-unknown"));
        let element = MediaElement::with_source(media);
        self.emit(SessionEvent::SubscriberVideoElementCreated {
            stream_id: stream.clone(),
            subscriber,
            element: element.clone(),
        });
        element
    }

    pub fn element_playing(&self, stream: &StreamId) -> bool {
        self.emit(SessionEvent::SubscriberVideoElementPlaying {
            stream_id: stream.clone(),
        })
    }

    pub fn video_disabled(&self, stream: &StreamId, reason: VideoChangeReason) -> bool {
        self.emit(SessionEvent::SubscriberVideoDisabled {
            stream_id: stream.clone(),
            reason,
        })
    }

    pub fn video_enabled(&self, stream: &StreamId, reason: VideoChangeReason) -> bool {
        self.emit(SessionEvent::SubscriberVideoEnabled {
            stream_id: stream.clone(),
            reason,
        })
    }

    pub fn property_changed(&self, stream: &NativeStream, change: StreamProperty) -> bool {
        self.emit(SessionEvent::StreamPropertyChanged {
            stream: stream.clone(),
            change,
        })
    }

    pub fn destroy_stream(&self, stream: &NativeStream) -> bool {
        self.emit(SessionEvent::StreamDestroyed {
            stream: stream.clone(),
        })
    }

    /// Deliver a signal sent by `identity`.
    pub fn signal_from(&self, identity: &str, data: &str) -> bool {
        self.emit(SessionEvent::Signal {
            data: data.to_string(),
            from: Some(NativeConnection {
                id: format!("conn-{identity}"),
                data: connection_data(identity),
            }),
        })
    }

    /// End the session from the backend side.
    pub fn session_disconnected(&self, reason: Option<&str>) -> bool {
        self.emit(SessionEvent::SessionDisconnected {
            reason: reason.map(str::to_string),
        })
    }
}

/// A remote stream whose connection metadata carries `identity`.
#[must_use]
pub fn remote_stream(
    identity: &str,
    stream_id: &str,
    name: &str,
    has_audio: bool,
    has_video: bool,
) -> NativeStream {
    NativeStream {
        id: StreamId::new(stream_id),
        name: name.to_string(),
        connection: NativeConnection {
            id: format!("conn-{identity}"),
            data: connection_data(identity),
        },
        has_audio,
        has_video,
    }
}
