//! Track: one elementary media stream with a role.
//!
//! A [`Track`] is a tagged variant rather than a per-vendor type: role, kind
//! and origin are plain data, and the adapter-specific native reference lives
//! in [`TrackHandle`]. `attach`, `detach` and `stop` dispatch on the handle
//! variant to functions provided by the owning adapter.

use crate::adapters::pubsub::{self, PubSubHandle};
use crate::adapters::track_centric::{self, TrackCentricHandle};
use crate::media::{MediaElement, MediaKind, MediaStream, MediaStreamTrack, VideoDimensions};
use common::types::TrackId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// What a track is used for within a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackRole {
    Camera,
    Mic,
    ScreenVideo,
    ScreenAudio,
}

impl TrackRole {
    pub const ALL: [TrackRole; 4] = [
        TrackRole::Camera,
        TrackRole::Mic,
        TrackRole::ScreenVideo,
        TrackRole::ScreenAudio,
    ];

    #[must_use]
    pub fn kind(self) -> MediaKind {
        match self {
            TrackRole::Camera | TrackRole::ScreenVideo => MediaKind::Video,
            TrackRole::Mic | TrackRole::ScreenAudio => MediaKind::Audio,
        }
    }

    /// Name the track is published under on either backend.
    #[must_use]
    pub fn backend_name(self) -> &'static str {
        match self {
            TrackRole::Camera => "camera",
            TrackRole::Mic => "mic",
            TrackRole::ScreenVideo => "screen",
            TrackRole::ScreenAudio => "screenAudio",
        }
    }

    #[must_use]
    pub fn is_screen(self) -> bool {
        matches!(self, TrackRole::ScreenVideo | TrackRole::ScreenAudio)
    }
}

/// Whether the track carries local hardware or remote media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrigin {
    Local,
    Remote,
}

/// Adapter-specific native reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackHandle {
    TrackCentric(TrackCentricHandle),
    PubSub(PubSubHandle),
}

/// Media and rendering surface currently bound to a track.
pub(crate) struct TrackBinding {
    pub(crate) media: MediaStreamTrack,
    pub(crate) element: Option<MediaElement>,
    pub(crate) audio_output: Option<String>,
}

impl TrackBinding {
    /// Bind a fresh stream of the current media to `element`.
    pub(crate) fn bind(&mut self, element: &MediaElement) {
        element.set_src_object(Some(MediaStream::new(vec![self.media.clone()])));
        if self.media.kind() == MediaKind::Audio {
            if let Some(device_id) = &self.audio_output {
                element.set_sink_id(device_id);
            }
        }
        self.element = Some(element.clone());
    }

    /// True if `element` is the attached element and shows the current media.
    pub(crate) fn is_bound(&self, element: &MediaElement) -> bool {
        self.element.as_ref().is_some_and(|e| e.same_as(element))
            && element.is_bound_to(&self.media)
    }
}

struct TrackInner {
    id: TrackId,
    role: TrackRole,
    origin: TrackOrigin,
    handle: TrackHandle,
    state: RefCell<TrackState>,
}

struct TrackState {
    binding: TrackBinding,
    enabled: bool,
}

/// One local-hardware or remote elementary stream.
///
/// Cloning a `Track` yields another handle to the same track.
#[derive(Clone)]
pub struct Track {
    inner: Rc<TrackInner>,
}

impl Track {
    fn build(
        id: TrackId,
        role: TrackRole,
        origin: TrackOrigin,
        media: MediaStreamTrack,
        handle: TrackHandle,
        enabled: bool,
    ) -> Self {
        Self {
            inner: Rc::new(TrackInner {
                id,
                role,
                origin,
                handle,
                state: RefCell::new(TrackState {
                    binding: TrackBinding {
                        media,
                        element: None,
                        audio_output: None,
                    },
                    enabled,
                }),
            }),
        }
    }

    /// Create a local track with a fresh `local-<role>-<uuid>` id.
    pub(crate) fn local(role: TrackRole, media: MediaStreamTrack, handle: TrackHandle) -> Self {
        let id = TrackId::generate(&format!("local-{}", role.backend_name()));
        let enabled = media.is_enabled();
        Self::build(id, role, TrackOrigin::Local, media, handle, enabled)
    }

    pub(crate) fn remote(
        id: TrackId,
        role: TrackRole,
        media: MediaStreamTrack,
        handle: TrackHandle,
        enabled: bool,
    ) -> Self {
        Self::build(id, role, TrackOrigin::Remote, media, handle, enabled)
    }

    #[must_use]
    pub fn id(&self) -> &TrackId {
        &self.inner.id
    }

    #[must_use]
    pub fn role(&self) -> TrackRole {
        self.inner.role
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.inner.role.kind()
    }

    #[must_use]
    pub fn origin(&self) -> TrackOrigin {
        self.inner.origin
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.inner.origin == TrackOrigin::Local
    }

    #[must_use]
    pub fn handle(&self) -> &TrackHandle {
        &self.inner.handle
    }

    /// Whether the track is currently contributing media.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.state.borrow().enabled
    }

    /// Whether the camera behind a video track supports pan/tilt/zoom.
    #[must_use]
    pub fn supports_ptz(&self) -> bool {
        self.kind() == MediaKind::Video && self.inner.state.borrow().binding.media.supports_ptz()
    }

    /// Frame size of a video track; `None` for audio.
    #[must_use]
    pub fn dimensions(&self) -> Option<VideoDimensions> {
        match self.kind() {
            MediaKind::Video => Some(self.inner.state.borrow().binding.media.dimensions()),
            MediaKind::Audio => None,
        }
    }

    /// The elementary stream currently backing this track.
    #[must_use]
    pub fn media(&self) -> MediaStreamTrack {
        self.inner.state.borrow().binding.media.clone()
    }

    /// The element this track is attached to, if any.
    #[must_use]
    pub fn element(&self) -> Option<MediaElement> {
        self.inner.state.borrow().binding.element.clone()
    }

    /// True once the backing media has been released.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.state.borrow().binding.media.is_ended()
    }

    /// Bind the track's live media to `element`.
    ///
    /// Attaching to the element it is already attached to does nothing;
    /// attaching to a different element releases the previous one.
    pub fn attach(&self, element: &MediaElement) {
        let mut state = self.inner.state.borrow_mut();
        match &self.inner.handle {
            TrackHandle::TrackCentric(handle) => {
                track_centric::handle::attach(handle, &mut state.binding, element);
            }
            TrackHandle::PubSub(handle) => {
                pubsub::handle::attach(handle, &mut state.binding, element);
            }
        }
    }

    /// Release the attached element. Safe to call when never attached.
    pub fn detach(&self) {
        let mut state = self.inner.state.borrow_mut();
        match &self.inner.handle {
            TrackHandle::TrackCentric(handle) => {
                track_centric::handle::detach(handle, &mut state.binding);
            }
            TrackHandle::PubSub(handle) => pubsub::handle::detach(handle, &mut state.binding),
        }
    }

    /// Detach and release whatever media this track owns.
    pub fn stop(&self) {
        let mut state = self.inner.state.borrow_mut();
        let origin = self.inner.origin;
        match &self.inner.handle {
            TrackHandle::TrackCentric(handle) => {
                track_centric::handle::stop(handle, origin, &mut state.binding);
            }
            TrackHandle::PubSub(handle) => pubsub::handle::stop(handle, origin, &mut state.binding),
        }
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.inner.state.borrow_mut().enabled = enabled;
    }

    /// Swap the backing media in place, keeping the id.
    ///
    /// An attached element is re-bound to the new media. Returns the media
    /// that was replaced; the caller decides whether to stop it.
    pub(crate) fn replace_media(&self, media: MediaStreamTrack) -> MediaStreamTrack {
        let mut state = self.inner.state.borrow_mut();
        let previous = std::mem::replace(&mut state.binding.media, media);
        if let Some(element) = state.binding.element.clone() {
            state.binding.bind(&element);
        }
        previous
    }

    /// Route audio to `device_id`, now and on every future attach.
    pub(crate) fn set_audio_output(&self, device_id: &str) {
        if self.kind() != MediaKind::Audio {
            return;
        }
        let mut state = self.inner.state.borrow_mut();
        state.binding.audio_output = Some(device_id.to_string());
        if let Some(element) = &state.binding.element {
            element.set_sink_id(device_id);
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Track {}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Track")
            .field("id", &self.inner.id)
            .field("role", &self.inner.role)
            .field("origin", &self.inner.origin)
            .field("enabled", &state.enabled)
            .field("attached", &state.binding.element.is_some())
            .finish()
    }
}
