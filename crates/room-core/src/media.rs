//! Host media primitives.
//!
//! These model the host platform's media objects: hardware or remote
//! elementary streams, streams that group them, and the elements they render
//! into. All of them are cheap, shared, single-threaded handles; cloning a
//! handle never copies the underlying media.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Kind of an elementary media stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Video frame size as reported by the host. Either side may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoDimensions {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl VideoDimensions {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }
}

/// Capture settings a track is created with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaTrackSettings {
    pub device_id: Option<String>,
    pub dimensions: VideoDimensions,
    /// Hardware supports remote pan/tilt/zoom.
    pub ptz: bool,
}

struct MediaTrackInner {
    id: String,
    kind: MediaKind,
    device_id: Option<String>,
    ptz: bool,
    state: RefCell<MediaTrackState>,
}

struct MediaTrackState {
    enabled: bool,
    ended: bool,
    dimensions: VideoDimensions,
}

/// A single hardware or remote elementary stream.
#[derive(Clone)]
pub struct MediaStreamTrack {
    inner: Rc<MediaTrackInner>,
}

impl MediaStreamTrack {
    /// Create a live, enabled track with default settings.
    #[must_use]
    pub fn new(kind: MediaKind) -> Self {
        Self::with_settings(kind, MediaTrackSettings::default())
    }

    /// Create a live, enabled track.
    #[must_use]
    pub fn with_settings(kind: MediaKind, settings: MediaTrackSettings) -> Self {
        Self {
            inner: Rc::new(MediaTrackInner {
                id: Uuid::new_v4().to_string(),
                kind,
                device_id: settings.device_id,
                ptz: settings.ptz,
                state: RefCell::new(MediaTrackState {
                    enabled: true,
                    ended: false,
                    dimensions: settings.dimensions,
                }),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.inner.kind
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.inner.device_id.as_deref()
    }

    #[must_use]
    pub fn supports_ptz(&self) -> bool {
        self.inner.ptz
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.state.borrow().enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.state.borrow_mut().enabled = enabled;
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.inner.state.borrow().ended
    }

    /// Release the underlying source. Idempotent.
    pub fn stop(&self) {
        self.inner.state.borrow_mut().ended = true;
    }

    #[must_use]
    pub fn dimensions(&self) -> VideoDimensions {
        self.inner.state.borrow().dimensions
    }

    pub fn set_dimensions(&self, dimensions: VideoDimensions) {
        self.inner.state.borrow_mut().dimensions = dimensions;
    }

    /// Create an independent track on the same source.
    ///
    /// The clone has its own id and lifetime: stopping either one leaves the
    /// other live.
    #[must_use]
    pub fn clone_track(&self) -> Self {
        let state = self.inner.state.borrow();
        let cloned = Self::with_settings(
            self.inner.kind,
            MediaTrackSettings {
                device_id: self.inner.device_id.clone(),
                dimensions: state.dimensions,
                ptz: self.inner.ptz,
            },
        );
        cloned.set_enabled(state.enabled);
        cloned
    }

    /// True if both handles refer to the same track.
    #[must_use]
    pub fn same_as(&self, other: &MediaStreamTrack) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MediaStreamTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("MediaStreamTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("device_id", &self.inner.device_id)
            .field("enabled", &state.enabled)
            .field("ended", &state.ended)
            .finish()
    }
}

/// Ordered set of elementary streams.
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<MediaStreamTrack>,
}

impl MediaStream {
    #[must_use]
    pub fn new(tracks: Vec<MediaStreamTrack>) -> Self {
        Self { tracks }
    }

    #[must_use]
    pub fn tracks(&self) -> &[MediaStreamTrack] {
        &self.tracks
    }

    pub fn add_track(&mut self, track: MediaStreamTrack) {
        self.tracks.push(track);
    }

    /// First audio track, if any.
    #[must_use]
    pub fn audio_track(&self) -> Option<&MediaStreamTrack> {
        self.tracks.iter().find(|t| t.kind() == MediaKind::Audio)
    }

    /// First video track, if any.
    #[must_use]
    pub fn video_track(&self) -> Option<&MediaStreamTrack> {
        self.tracks.iter().find(|t| t.kind() == MediaKind::Video)
    }

    /// True if `track` is one of this stream's tracks.
    #[must_use]
    pub fn contains(&self, track: &MediaStreamTrack) -> bool {
        self.tracks.iter().any(|t| t.same_as(track))
    }
}

#[derive(Default)]
struct ElementState {
    src_object: Option<MediaStream>,
    sink_id: Option<String>,
    mounted: bool,
}

/// A rendering surface (audio or video element).
#[derive(Clone)]
pub struct MediaElement {
    inner: Rc<RefCell<ElementState>>,
}

impl Default for MediaElement {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaElement {
    /// Create a mounted element with no source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ElementState {
                mounted: true,
                ..ElementState::default()
            })),
        }
    }

    /// Create a mounted element already bound to `stream`.
    #[must_use]
    pub fn with_source(stream: MediaStream) -> Self {
        let element = Self::new();
        element.set_src_object(Some(stream));
        element
    }

    #[must_use]
    pub fn src_object(&self) -> Option<MediaStream> {
        self.inner.borrow().src_object.clone()
    }

    pub fn set_src_object(&self, stream: Option<MediaStream>) {
        self.inner.borrow_mut().src_object = stream;
    }

    /// Audio output device this element plays through.
    #[must_use]
    pub fn sink_id(&self) -> Option<String> {
        self.inner.borrow().sink_id.clone()
    }

    pub fn set_sink_id(&self, device_id: &str) {
        self.inner.borrow_mut().sink_id = Some(device_id.to_string());
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.borrow().mounted
    }

    /// Unmount the element from the host's render tree.
    pub fn remove(&self) {
        self.inner.borrow_mut().mounted = false;
    }

    /// True if the element's source contains `track`.
    #[must_use]
    pub fn is_bound_to(&self, track: &MediaStreamTrack) -> bool {
        self.inner
            .borrow()
            .src_object
            .as_ref()
            .is_some_and(|stream| stream.contains(track))
    }

    #[must_use]
    pub fn same_as(&self, other: &MediaElement) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MediaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("MediaElement")
            .field("has_source", &state.src_object.is_some())
            .field("sink_id", &state.sink_id)
            .field("mounted", &state.mounted)
            .finish()
    }
}
