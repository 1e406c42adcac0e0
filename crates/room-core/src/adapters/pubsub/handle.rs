//! Native track reference and rendering functions for the publisher/subscriber
//! backend.
//!
//! This backend renders into elements it hands out, so the adapter owns every
//! element a track is attached to: detaching unmounts it. Remote tracks keep
//! the subscriber's element, which is the only handle to the subscribed media.

use super::backend::StreamId;
use crate::media::MediaElement;
use crate::track::{TrackBinding, TrackOrigin};

/// Native reference carried by tracks of the publisher/subscriber backend.
#[derive(Debug, Clone)]
pub enum PubSubHandle {
    /// Local media owned by one of our publishers. The publisher may be
    /// replaced while the track lives on (camera switch).
    Published,
    /// Remote media received through a subscriber.
    Subscribed {
        stream_id: StreamId,
        source: MediaElement,
    },
}

impl PubSubHandle {
    #[must_use]
    pub fn subscribed(stream_id: StreamId, source: MediaElement) -> Self {
        PubSubHandle::Subscribed { stream_id, source }
    }

    /// Stream the track was received on; `None` for local tracks.
    #[must_use]
    pub fn stream_id(&self) -> Option<&StreamId> {
        match self {
            PubSubHandle::Published => None,
            PubSubHandle::Subscribed { stream_id, .. } => Some(stream_id),
        }
    }
}

impl PartialEq for PubSubHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PubSubHandle::Published, PubSubHandle::Published) => true,
            (
                PubSubHandle::Subscribed {
                    stream_id: a,
                    source: source_a,
                },
                PubSubHandle::Subscribed {
                    stream_id: b,
                    source: source_b,
                },
            ) => a == b && source_a.same_as(source_b),
            _ => false,
        }
    }
}

impl Eq for PubSubHandle {}

fn release(element: &MediaElement) {
    element.set_src_object(None);
    element.remove();
}

pub(crate) fn attach(_handle: &PubSubHandle, binding: &mut TrackBinding, element: &MediaElement) {
    if binding.is_bound(element) {
        return;
    }
    if let Some(previous) = binding.element.take() {
        if !previous.same_as(element) {
            release(&previous);
        }
    }
    binding.bind(element);
}

pub(crate) fn detach(_handle: &PubSubHandle, binding: &mut TrackBinding) {
    if let Some(element) = binding.element.take() {
        release(&element);
    }
}

pub(crate) fn stop(handle: &PubSubHandle, _origin: TrackOrigin, binding: &mut TrackBinding) {
    detach(handle, binding);
    binding.media.stop();
    if let PubSubHandle::Subscribed { source, .. } = handle {
        source.set_src_object(None);
    }
}
