//! Native track reference and rendering functions for the track-centric
//! backend.
//!
//! The backend's SDK binds media to elements itself; a detached element stays
//! mounted and is reused by the renderer. Remote media belongs to the backend
//! and is never stopped from here.

use crate::media::MediaElement;
use crate::track::{TrackBinding, TrackOrigin};
use tracing::trace;

/// Native reference carried by tracks of the track-centric backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackCentricHandle {
    sid: Option<String>,
    name: String,
}

impl TrackCentricHandle {
    #[must_use]
    pub fn new(sid: Option<String>, name: impl Into<String>) -> Self {
        Self {
            sid,
            name: name.into(),
        }
    }

    /// Backend-assigned track sid. Local tracks have none.
    #[must_use]
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    /// Backend-level track name (`camera`, `mic`, `screen`, `screenAudio`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn attach(
    handle: &TrackCentricHandle,
    binding: &mut TrackBinding,
    element: &MediaElement,
) {
    if binding.is_bound(element) {
        return;
    }
    if let Some(previous) = binding.element.take() {
        previous.set_src_object(None);
    }
    trace!(
        target: "room.track_centric",
        sid = ?handle.sid,
        name = %handle.name,
        "Attaching track"
    );
    binding.bind(element);
}

pub(crate) fn detach(_handle: &TrackCentricHandle, binding: &mut TrackBinding) {
    if let Some(element) = binding.element.take() {
        element.set_src_object(None);
    }
}

pub(crate) fn stop(handle: &TrackCentricHandle, origin: TrackOrigin, binding: &mut TrackBinding) {
    detach(handle, binding);
    if origin == TrackOrigin::Local {
        binding.media.stop();
    }
}
