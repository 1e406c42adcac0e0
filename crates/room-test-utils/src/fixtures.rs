//! Pre-configured test data: hardware tracks, streams and identity payloads.

use room_core::media::{
    MediaKind, MediaStream, MediaStreamTrack, MediaTrackSettings, VideoDimensions,
};

/// Fixed device ids used across tests.
pub const DEFAULT_CAMERA: &str = "camera-default";
pub const DEFAULT_MICROPHONE: &str = "microphone-default";
pub const PTZ_CAMERA: &str = "camera-ptz";

/// A 640x480 camera track on `device_id`.
#[must_use]
pub fn camera(device_id: &str) -> MediaStreamTrack {
    MediaStreamTrack::with_settings(
        MediaKind::Video,
        MediaTrackSettings {
            device_id: Some(device_id.to_string()),
            dimensions: VideoDimensions::new(640, 480),
            ptz: false,
        },
    )
}

/// A 1920x1080 camera with pan/tilt/zoom support.
#[must_use]
pub fn ptz_camera(device_id: &str) -> MediaStreamTrack {
    MediaStreamTrack::with_settings(
        MediaKind::Video,
        MediaTrackSettings {
            device_id: Some(device_id.to_string()),
            dimensions: VideoDimensions::new(1920, 1080),
            ptz: true,
        },
    )
}

/// A microphone track on `device_id`.
#[must_use]
pub fn microphone(device_id: &str) -> MediaStreamTrack {
    MediaStreamTrack::with_settings(
        MediaKind::Audio,
        MediaTrackSettings {
            device_id: Some(device_id.to_string()),
            ..MediaTrackSettings::default()
        },
    )
}

/// What the host returns for a combined audio+video acquisition.
#[must_use]
pub fn camera_and_mic() -> MediaStream {
    MediaStream::new(vec![microphone(DEFAULT_MICROPHONE), camera(DEFAULT_CAMERA)])
}

/// A display capture, optionally with system audio.
#[must_use]
pub fn screen_capture(with_audio: bool) -> MediaStream {
    let mut stream = MediaStream::new(vec![MediaStreamTrack::with_settings(
        MediaKind::Video,
        MediaTrackSettings {
            device_id: Some("screen:0".to_string()),
            dimensions: VideoDimensions::new(2560, 1440),
            ptz: false,
        },
    )]);
    if with_audio {
        stream.add_track(MediaStreamTrack::new(MediaKind::Audio));
    }
    stream
}

/// Media a remote subscriber would receive: one audio and one video track.
#[must_use]
pub fn remote_media(with_audio: bool, with_video: bool) -> MediaStream {
    let mut stream = MediaStream::default();
    if with_audio {
        stream.add_track(MediaStreamTrack::new(MediaKind::Audio));
    }
    if with_video {
        stream.add_track(MediaStreamTrack::new(MediaKind::Video));
    }
    stream
}

/// Connection metadata carrying `identity`, as the token issuer attaches it.
#[must_use]
pub fn connection_data(identity: &str) -> String {
    serde_json::json!({ "identity": identity }).to_string()
}
