//! Vendor seam for the track-centric backend.
//!
//! The backend models remote media as independently subscribable, named
//! tracks attached to long-lived participants. Native callbacks are delivered
//! on the channel returned by [`TrackBackend::connect`], in the order the
//! backend reports them.

use crate::errors::BackendError;
use crate::media::{MediaKind, MediaStreamTrack, VideoDimensions};
use async_trait::async_trait;
use common::secret::SecretString;
use common::types::Identity;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;

/// Publish priority hint for a local track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishPriority {
    Low,
    Standard,
    High,
}

impl FromStr for PublishPriority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(PublishPriority::Low),
            "standard" => Ok(PublishPriority::Standard),
            "high" => Ok(PublishPriority::High),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PublishPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishPriority::Low => f.write_str("low"),
            PublishPriority::Standard => f.write_str("standard"),
            PublishPriority::High => f.write_str("high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkQuality {
    pub local: u8,
    pub remote: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoCodecPreference {
    pub codec: String,
    pub simulcast: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BandwidthMode {
    Collaboration,
    Grid,
    Presentation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSwitchOffMode {
    Detected,
    Predicted,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchOffControl {
    Auto,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandwidthProfile {
    pub mode: BandwidthMode,
    pub track_switch_off_mode: TrackSwitchOffMode,
    pub client_track_switch_off_control: SwitchOffControl,
}

/// Options handed to the backend's connect primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeConnectOptions {
    pub name: String,
    pub dominant_speaker: bool,
    pub network_quality: NetworkQuality,
    pub preferred_audio_codecs: Vec<String>,
    pub preferred_video_codecs: Vec<VideoCodecPreference>,
    pub bandwidth_profile: BandwidthProfile,
    /// Publish a data track for signals.
    pub data_track: bool,
}

impl NativeConnectOptions {
    /// The vendor-recommended profile for collaborative rooms.
    #[must_use]
    pub fn recommended(room_name: &str) -> Self {
        Self {
            name: room_name.to_string(),
            dominant_speaker: true,
            network_quality: NetworkQuality {
                local: 1,
                remote: 1,
            },
            preferred_audio_codecs: vec!["opus".to_string()],
            preferred_video_codecs: vec![VideoCodecPreference {
                codec: "VP8".to_string(),
                simulcast: true,
            }],
            bandwidth_profile: BandwidthProfile {
                mode: BandwidthMode::Collaboration,
                track_switch_off_mode: TrackSwitchOffMode::Detected,
                client_track_switch_off_control: SwitchOffControl::Auto,
            },
            data_track: true,
        }
    }
}

/// A local track as the backend sees it.
#[derive(Debug, Clone)]
pub struct NativeLocalTrack {
    pub name: String,
    pub media: MediaStreamTrack,
}

/// Kind of a native track. Data tracks carry signals, not media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeTrackKind {
    Audio,
    Video,
    Data,
}

impl NativeTrackKind {
    #[must_use]
    pub fn media_kind(self) -> Option<MediaKind> {
        match self {
            NativeTrackKind::Audio => Some(MediaKind::Audio),
            NativeTrackKind::Video => Some(MediaKind::Video),
            NativeTrackKind::Data => None,
        }
    }
}

/// Reference to a remote native track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTrackRef {
    pub sid: String,
    /// Backend-level track name; empty for unnamed tracks.
    pub name: String,
    pub kind: NativeTrackKind,
}

/// A remote native track delivered on subscription.
#[derive(Debug, Clone)]
pub struct NativeRemoteTrack {
    pub sid: String,
    pub name: String,
    pub kind: NativeTrackKind,
    /// Media for audio and video tracks; `None` for data tracks.
    pub media: Option<MediaStreamTrack>,
    pub enabled: bool,
}

impl NativeRemoteTrack {
    #[must_use]
    pub fn to_ref(&self) -> NativeTrackRef {
        NativeTrackRef {
            sid: self.sid.clone(),
            name: self.name.clone(),
            kind: self.kind,
        }
    }
}

/// Native callbacks from the track-centric backend.
#[derive(Debug, Clone)]
pub enum TrackEvent {
    ParticipantConnected { identity: Identity },
    ParticipantDisconnected { identity: Identity },
    TrackSubscribed { identity: Identity, track: NativeRemoteTrack },
    TrackUnsubscribed { identity: Identity, track: NativeTrackRef },
    TrackUnpublished { identity: Identity, track: NativeTrackRef },
    TrackEnabled { identity: Identity, track: NativeTrackRef },
    TrackDisabled { identity: Identity, track: NativeTrackRef },
    TrackDimensionsChanged {
        identity: Identity,
        track: NativeTrackRef,
        dimensions: VideoDimensions,
    },
    TrackSwitchedOff { identity: Identity, track: NativeTrackRef },
    TrackSwitchedOn { identity: Identity, track: NativeTrackRef },
    DominantSpeakerChanged { identity: Option<Identity> },
    DataReceived { identity: Identity, data: String },
    /// The backend ended the session.
    Disconnected { error: Option<String> },
}

/// A connected native room.
#[derive(Debug)]
pub struct NativeRoom {
    pub local_identity: Identity,
    /// Members present when the connection was established. The backend does
    /// not report them through `ParticipantConnected`.
    pub participants: Vec<Identity>,
    pub events: mpsc::UnboundedReceiver<TrackEvent>,
}

/// Primitives of the track-centric backend.
#[async_trait(?Send)]
pub trait TrackBackend {
    /// Join `options.name`, publishing `tracks` (and a data track).
    async fn connect(
        &mut self,
        token: &SecretString,
        options: &NativeConnectOptions,
        tracks: &[NativeLocalTrack],
    ) -> Result<NativeRoom, BackendError>;

    async fn publish_track(
        &mut self,
        track: &NativeLocalTrack,
        priority: PublishPriority,
    ) -> Result<(), BackendError>;

    async fn unpublish_track(&mut self, track: &NativeLocalTrack) -> Result<(), BackendError>;

    /// Toggle whether a published track contributes media.
    fn set_track_enabled(&mut self, track: &NativeLocalTrack, enabled: bool);

    /// Acquire `device_id` and swap it into the existing publication.
    async fn restart_track(
        &mut self,
        track: &NativeLocalTrack,
        device_id: &str,
    ) -> Result<MediaStreamTrack, BackendError>;

    /// Send over the native (unreliable) data track.
    fn send_data(&mut self, payload: &str) -> Result<(), BackendError>;

    async fn disconnect(&mut self);
}
