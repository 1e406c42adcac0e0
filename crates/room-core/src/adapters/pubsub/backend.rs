//! Vendor seam for the publisher/subscriber backend.
//!
//! Media is published through publisher objects and received through
//! subscriber objects, one per remote stream. A stream carries at most one
//! audio and one video track and cannot publish them independently. The
//! element a publisher or subscriber renders into is the only reliable handle
//! to its media.

use crate::errors::BackendError;
use crate::media::{MediaElement, MediaStreamTrack, VideoDimensions};
use async_trait::async_trait;
use common::secret::SecretString;
use std::fmt;
use tokio::sync::mpsc;

macro_rules! native_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

native_id!(
    /// Backend id of one of our publishers.
    PublisherId
);
native_id!(
    /// Backend id of a published stream.
    StreamId
);
native_id!(
    /// Backend id of one of our subscribers.
    SubscriberId
);

/// Options for creating a publisher.
#[derive(Debug, Clone)]
pub struct PublisherOptions {
    /// Stream name remote participants see (`camera` or `screen`).
    pub name: String,
    pub audio_source: Option<MediaStreamTrack>,
    pub video_source: Option<MediaStreamTrack>,
    pub publish_audio: bool,
    pub publish_video: bool,
}

/// A publisher whose video element has been created.
#[derive(Debug, Clone)]
pub struct NativePublisher {
    pub id: PublisherId,
    /// The element's source stream holds the media actually published.
    pub element: MediaElement,
}

/// A backend connection and its application-defined metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeConnection {
    pub id: String,
    /// Opaque metadata attached at token issue (`{"identity":"…"}`).
    pub data: String,
}

/// A remote stream as announced by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStream {
    pub id: StreamId,
    pub name: String,
    pub connection: NativeConnection,
    pub has_audio: bool,
    pub has_video: bool,
}

/// A stream property the backend reports a change for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProperty {
    HasAudio(bool),
    HasVideo(bool),
    VideoDimensions(VideoDimensions),
}

/// Why a subscriber's video was disabled or enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoChangeReason {
    /// The publisher toggled video publication.
    PublishVideo,
    /// We toggled our own subscription to video.
    SubscribeToVideo,
    /// Bandwidth adaptation.
    QualityChanged,
    CodecNotSupported,
}

/// Native callbacks from the publisher/subscriber backend.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StreamCreated {
        stream: NativeStream,
    },
    StreamDestroyed {
        stream: NativeStream,
    },
    StreamPropertyChanged {
        stream: NativeStream,
        change: StreamProperty,
    },
    /// A subscriber's element exists; its source stream holds the media.
    SubscriberVideoElementCreated {
        stream_id: StreamId,
        subscriber: SubscriberId,
        element: MediaElement,
    },
    /// A subscriber's element started playing, possibly with new media.
    SubscriberVideoElementPlaying {
        stream_id: StreamId,
    },
    SubscriberVideoDisabled {
        stream_id: StreamId,
        reason: VideoChangeReason,
    },
    SubscriberVideoEnabled {
        stream_id: StreamId,
        reason: VideoChangeReason,
    },
    Signal {
        data: String,
        from: Option<NativeConnection>,
    },
    /// The session ended. `reason` is set when the backend ended it.
    SessionDisconnected {
        reason: Option<String>,
    },
}

/// A connected native session.
#[derive(Debug)]
pub struct NativeSession {
    pub connection: NativeConnection,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

/// Primitives of the publisher/subscriber backend.
#[async_trait(?Send)]
pub trait PubSubBackend {
    /// Create a publisher. Resolves once its video element exists.
    async fn init_publisher(
        &mut self,
        options: PublisherOptions,
    ) -> Result<NativePublisher, BackendError>;

    async fn connect(
        &mut self,
        session: &str,
        token: &SecretString,
    ) -> Result<NativeSession, BackendError>;

    async fn publish(&mut self, publisher: &PublisherId) -> Result<(), BackendError>;

    fn unpublish(&mut self, publisher: &PublisherId);

    fn destroy_publisher(&mut self, publisher: &PublisherId);

    async fn publish_video(
        &mut self,
        publisher: &PublisherId,
        enabled: bool,
    ) -> Result<(), BackendError>;

    fn publish_audio(&mut self, publisher: &PublisherId, enabled: bool);

    /// Switch the publisher's microphone. Returns the new audio track.
    async fn set_audio_source(
        &mut self,
        publisher: &PublisherId,
        device_id: &str,
    ) -> Result<MediaStreamTrack, BackendError>;

    fn subscribe(&mut self, stream: &StreamId) -> Result<SubscriberId, BackendError>;

    async fn signal(&mut self, data: &str) -> Result<(), BackendError>;

    async fn disconnect(&mut self);

    /// Global audio output switch for everything the backend renders.
    fn set_audio_output_device(&mut self, device_id: &str);
}
