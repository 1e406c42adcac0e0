//! Tests for the publisher/subscriber room adapter.
//!
//! Drives a `PubSubRoom` over the mock backend from `room-test-utils`:
//! - Identity resolution from connection metadata (local and remote)
//! - Track synthesis from subscriber elements and per-stream track ids
//! - Camera switching through a second publisher with a grace delay
//! - Session teardown from either side

#![allow(clippy::unwrap_used, clippy::expect_used)]

use room_core::adapters::pubsub::{
    PubSubRoom, PublisherId, SessionEvent, StreamId, StreamProperty, VideoChangeReason,
};
use room_core::config::AdapterSettings;
use room_core::errors::{BackendError, RoomError};
use room_core::events::{RoomEvent, RoomEventKind};
use room_core::media::{MediaElement, MediaStream, VideoDimensions};
use room_core::room::{ConnectOptions, ConnectionState, Room};
use room_core::signal::SignalEvent;
use room_core::track::TrackRole;
use room_core::Identity;
use room_test_utils::{
    camera, camera_and_mic, remote_media, remote_stream, screen_capture, EventRecorder,
    MockPubSubBackend, MockPubSubBackendBuilder, PubSubBackendController, PubSubCall,
    LOCAL_CONNECTION_ID,
};
use std::time::Duration;

type TestRoom = PubSubRoom<MockPubSubBackend>;

fn options() -> ConnectOptions {
    ConnectOptions::new("standup", "session-token")
}

fn publisher(n: u32) -> PublisherId {
    PublisherId::new(format!("pub-{n}"))
}

/// Room with a camera+mic publisher (`pub-1`), connected as alice.
async fn connected(
    builder: MockPubSubBackendBuilder,
) -> (TestRoom, PubSubBackendController, EventRecorder) {
    let (backend, controller) = builder.identity("alice").build();
    let mut room = PubSubRoom::new(backend, AdapterSettings::default());
    let recorder = EventRecorder::attach(room.events());
    room.create_local_tracks(&camera_and_mic()).await.unwrap();
    room.connect(options()).await.unwrap();
    controller.clear_calls();
    (room, controller, recorder)
}

/// Announce bob's camera stream and deliver its subscriber element.
fn bob_joins(
    room: &mut TestRoom,
    controller: &PubSubBackendController,
    stream_id: &str,
) -> MediaElement {
    let stream = controller.add_remote_stream("bob", stream_id, "camera", true, true);
    room.dispatch_pending();
    let element = controller.attach_subscriber_element(&stream.id, remote_media(true, true));
    room.dispatch_pending();
    element
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[tokio::test]
async fn test_connect_publishes_prepared_publisher() {
    let (backend, controller) = MockPubSubBackend::builder().identity("alice").build();
    let mut room = PubSubRoom::new(backend, AdapterSettings::default());
    let tracks = room.create_local_tracks(&camera_and_mic()).await.unwrap();

    room.connect(options()).await.unwrap();

    assert_eq!(room.state(), ConnectionState::Connected);
    assert_eq!(room.identity(), Some(&Identity::from("alice")));
    assert_eq!(
        controller.calls(),
        vec![
            PubSubCall::InitPublisher {
                publisher: publisher(1),
                name: "camera".to_string(),
                publish_audio: true,
                publish_video: true,
            },
            PubSubCall::Connect {
                session: "standup".to_string(),
            },
            PubSubCall::Publish(publisher(1)),
        ]
    );
    assert_eq!(controller.last_token().as_deref(), Some("session-token"));
    assert_eq!(tracks.video.role(), TrackRole::Camera);
    assert_eq!(tracks.audio.role(), TrackRole::Mic);
}

#[tokio::test]
async fn test_connect_requires_local_media() {
    let (backend, controller) = MockPubSubBackend::builder().build();
    let mut room = PubSubRoom::new(backend, AdapterSettings::default());

    let result = room.connect(options()).await;

    assert!(matches!(result, Err(RoomError::InvalidState(_))));
    assert_eq!(room.state(), ConnectionState::Disconnected);
    assert!(controller.calls().is_empty());
}

#[tokio::test]
async fn test_connect_failure_leaves_room_disconnected() {
    let (backend, _controller) = MockPubSubBackend::builder()
        .fail_connect(BackendError::Unauthorized("token expired".to_string()))
        .build();
    let mut room = PubSubRoom::new(backend, AdapterSettings::default());
    let tracks = room.create_local_tracks(&camera_and_mic()).await.unwrap();

    let result = room.connect(options()).await;

    assert!(matches!(result, Err(RoomError::Connection(_))));
    assert_eq!(room.state(), ConnectionState::Disconnected);
    assert!(!tracks.video.is_stopped());
}

#[tokio::test]
async fn test_connect_without_resolvable_identity_is_abandoned() {
    let (backend, controller) = MockPubSubBackend::builder().connection_data("{}").build();
    let mut room = PubSubRoom::new(backend, AdapterSettings::default());
    room.create_local_tracks(&camera_and_mic()).await.unwrap();

    let result = room.connect(options()).await;

    assert!(matches!(result, Err(RoomError::Connection(_))));
    assert_eq!(room.state(), ConnectionState::Disconnected);
    assert_eq!(room.identity(), None);
    assert_eq!(controller.calls().last(), Some(&PubSubCall::Disconnect));
    assert!(controller.published().is_empty());
}

#[tokio::test]
async fn test_publish_failure_after_connect_disconnects_session() {
    let (backend, controller) = MockPubSubBackend::builder().fail_publish().build();
    let mut room = PubSubRoom::new(backend, AdapterSettings::default());
    room.create_local_tracks(&camera_and_mic()).await.unwrap();

    let result = room.connect(options()).await;

    assert!(matches!(result, Err(RoomError::Publish(_))));
    assert_eq!(room.state(), ConnectionState::Disconnected);
    assert_eq!(controller.calls().last(), Some(&PubSubCall::Disconnect));
    // The publisher survives for a retry.
    assert!(room.local_track(TrackRole::Camera).is_some());
}

#[tokio::test]
async fn test_disconnect_retires_publishers_once() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    let camera = room.local_track(TrackRole::Camera).unwrap();
    let mic = room.local_track(TrackRole::Mic).unwrap();
    bob_joins(&mut room, &controller, "S1");
    controller.clear_calls();

    room.disconnect().await;
    room.disconnect().await;

    assert_eq!(
        controller.calls(),
        vec![
            PubSubCall::Disconnect,
            PubSubCall::DestroyPublisher(publisher(1)),
        ]
    );
    assert!(camera.is_stopped());
    assert!(mic.is_stopped());
    assert!(room.participants().is_empty());
    assert!(controller.live_publishers().is_empty());
    assert_eq!(recorder.count(RoomEventKind::Disconnected), 1);
}

#[tokio::test]
async fn test_session_disconnected_keeps_camera_and_mic() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    bob_joins(&mut room, &controller, "S1");
    let screen = room.start_screenshare(&screen_capture(true)).await.unwrap();

    controller.session_disconnected(Some("networkDisconnected"));
    room.dispatch_pending();

    assert_eq!(room.state(), ConnectionState::Disconnected);
    assert!(room.participants().is_empty());
    assert!(screen.is_stopped());
    assert!(room.local_track(TrackRole::ScreenVideo).is_none());
    assert!(!room.local_track(TrackRole::Camera).unwrap().is_stopped());
    assert!(!room.local_track(TrackRole::Mic).unwrap().is_stopped());
    assert!(matches!(
        recorder.last(),
        Some(RoomEvent::Disconnected { error: Some(reason) }) if reason == "networkDisconnected"
    ));

    // A fresh session can publish the kept publisher again.
    room.connect(options()).await.unwrap();
    assert_eq!(controller.calls().last(), Some(&PubSubCall::Publish(publisher(1))));
}

#[tokio::test]
async fn test_dispatch_next_stops_when_backend_stream_closes() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    let stream = controller.add_remote_stream("bob", "S1", "camera", true, true);
    assert!(room.dispatch_next().await);
    controller.attach_subscriber_element(&stream.id, remote_media(true, true));
    controller.close_events();

    assert!(room.dispatch_next().await);
    assert!(!room.dispatch_next().await);
    assert_eq!(recorder.count(RoomEventKind::TrackSubscribed), 2);
}

// ============================================================================
// Remote streams
// ============================================================================

#[tokio::test]
async fn test_stream_tracks_appear_with_subscriber_element() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    let stream = controller.add_remote_stream("bob", "S1", "camera", true, true);
    room.dispatch_pending();

    // Subscribed, but nothing to show until the element exists.
    assert_eq!(controller.subscriber_for(&stream.id).unwrap().as_str(), "sub-1");
    assert!(recorder.events().is_empty());

    controller.attach_subscriber_element(&stream.id, remote_media(true, true));
    room.dispatch_pending();

    assert_eq!(
        recorder.kinds(),
        vec![
            RoomEventKind::ParticipantConnected,
            RoomEventKind::TrackSubscribed,
            RoomEventKind::TrackSubscribed,
        ]
    );
    let bob = room.participant(&Identity::from("bob")).unwrap();
    assert_eq!(bob.camera.as_ref().unwrap().id().as_str(), "S1-camera");
    assert_eq!(bob.mic.as_ref().unwrap().id().as_str(), "S1-mic");
    // The backend renders remote audio itself.
    assert!(bob.mic.as_ref().unwrap().element().is_none());
}

#[tokio::test]
async fn test_screen_stream_maps_to_screen_pair() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    let stream = controller.add_remote_stream("bob", "S7", "screen", true, true);
    room.dispatch_pending();
    controller.attach_subscriber_element(&stream.id, remote_media(true, true));
    room.dispatch_pending();

    let bob = room.participant(&Identity::from("bob")).unwrap();
    assert_eq!(bob.screen.as_ref().unwrap().id().as_str(), "S7-screen");
    assert_eq!(bob.screen_audio.as_ref().unwrap().id().as_str(), "S7-screenAudio");
    assert!(bob.camera.is_none());
}

#[tokio::test]
async fn test_streams_without_identity_or_from_us_are_ignored() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    let mut own = remote_stream("alice", "S0", "camera", true, true);
    own.connection.id = LOCAL_CONNECTION_ID.to_string();
    controller.emit(SessionEvent::StreamCreated { stream: own });
    controller.add_stream_with_data("identity=mallory", "S2", "camera");
    controller.add_stream_with_data("{\"identity\":\"\"}", "S3", "camera");
    room.dispatch_pending();

    assert!(controller
        .calls()
        .iter()
        .all(|call| !matches!(call, PubSubCall::Subscribe(_))));

    controller.attach_subscriber_element(&StreamId::new("S2"), remote_media(true, true));
    room.dispatch_pending();
    assert!(recorder.events().is_empty());
    assert!(room.participants().is_empty());
}

#[tokio::test]
async fn test_stream_from_other_connection_with_local_identity_is_ignored() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;

    let stream = controller.add_remote_stream("alice", "S9", "camera", true, true);
    room.dispatch_pending();
    controller.attach_subscriber_element(&stream.id, remote_media(true, true));
    room.dispatch_pending();

    assert_ne!(stream.connection.id, LOCAL_CONNECTION_ID);
    assert!(controller
        .calls()
        .iter()
        .all(|call| !matches!(call, PubSubCall::Subscribe(_))));
    assert!(room.participants().is_empty());
    assert!(room.participant(&Identity::from("alice")).is_none());
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_stream_destroyed_prunes_participant() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    let element = bob_joins(&mut room, &controller, "S1");
    let camera = room.participant(&Identity::from("bob")).unwrap().camera.clone().unwrap();
    recorder.clear();

    controller.destroy_stream(&remote_stream("bob", "S1", "camera", true, true));
    room.dispatch_pending();

    assert_eq!(
        recorder.kinds(),
        vec![
            RoomEventKind::TrackUnpublished,
            RoomEventKind::TrackUnpublished,
            RoomEventKind::ParticipantDisconnected,
        ]
    );
    assert!(room.participant(&Identity::from("bob")).is_none());
    assert!(camera.is_stopped());
    assert!(element.src_object().is_none());
}

#[tokio::test]
async fn test_replacement_stream_survives_late_destroy() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    bob_joins(&mut room, &controller, "S1");
    // Bob switches cameras: new stream first, then the old one goes away.
    bob_joins(&mut room, &controller, "S2");
    recorder.clear();

    controller.destroy_stream(&remote_stream("bob", "S1", "camera", true, true));
    room.dispatch_pending();

    let bob = room.participant(&Identity::from("bob")).unwrap();
    assert_eq!(bob.camera.as_ref().unwrap().id().as_str(), "S2-camera");
    assert_eq!(bob.mic.as_ref().unwrap().id().as_str(), "S2-mic");
    assert!(!bob.camera.as_ref().unwrap().is_stopped());
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_has_audio_drives_mic_enabled_state() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    let stream = controller.add_remote_stream("bob", "S1", "camera", false, true);
    room.dispatch_pending();
    controller.attach_subscriber_element(&stream.id, remote_media(true, true));
    room.dispatch_pending();
    let mic = room.participant(&Identity::from("bob")).unwrap().mic.clone().unwrap();
    assert!(!mic.is_enabled());

    controller.property_changed(&stream, StreamProperty::HasAudio(true));
    room.dispatch_pending();
    assert!(mic.is_enabled());
    assert_eq!(recorder.last().unwrap().kind(), RoomEventKind::TrackEnabled);

    controller.property_changed(&stream, StreamProperty::HasAudio(false));
    room.dispatch_pending();
    assert!(!mic.is_enabled());
    let event = recorder.last().unwrap();
    assert_eq!(event.kind(), RoomEventKind::TrackDisabled);
    assert_eq!(event.track().unwrap().id(), mic.id());
}

#[tokio::test]
async fn test_video_dimensions_change() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    bob_joins(&mut room, &controller, "S1");
    let stream = remote_stream("bob", "S1", "camera", true, true);

    controller.property_changed(
        &stream,
        StreamProperty::VideoDimensions(VideoDimensions::new(1280, 720)),
    );
    controller.property_changed(&stream, StreamProperty::HasVideo(false));
    room.dispatch_pending();

    let camera = room.participant(&Identity::from("bob")).unwrap().camera.clone().unwrap();
    assert_eq!(camera.dimensions(), Some(VideoDimensions::new(1280, 720)));
    assert_eq!(recorder.last().unwrap().kind(), RoomEventKind::TrackDimensionsChanged);
}

#[tokio::test]
async fn test_video_unpublished_and_republished() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    bob_joins(&mut room, &controller, "S1");
    let stream_id = StreamId::new("S1");
    recorder.clear();

    controller.video_disabled(&stream_id, VideoChangeReason::QualityChanged);
    controller.video_disabled(&stream_id, VideoChangeReason::PublishVideo);
    room.dispatch_pending();

    assert_eq!(recorder.kinds(), vec![RoomEventKind::TrackUnpublished]);
    let bob = room.participant(&Identity::from("bob")).unwrap();
    assert!(bob.camera.is_none());
    assert!(bob.mic.is_some());

    controller.video_enabled(&stream_id, VideoChangeReason::PublishVideo);
    room.dispatch_pending();

    let subscribed = recorder.of_kind(RoomEventKind::TrackSubscribed);
    assert_eq!(subscribed.len(), 1);
    assert_eq!(subscribed[0].track().unwrap().id().as_str(), "S1-camera-2");
    let bob = room.participant(&Identity::from("bob")).unwrap();
    assert_eq!(bob.camera.as_ref().unwrap().id().as_str(), "S1-camera-2");
}

#[tokio::test]
async fn test_video_first_enabled_later_takes_unsuffixed_id() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    let stream = controller.add_remote_stream("bob", "S4", "camera", true, false);
    room.dispatch_pending();
    controller.attach_subscriber_element(&stream.id, remote_media(true, true));
    room.dispatch_pending();
    assert!(room.participant(&Identity::from("bob")).unwrap().camera.is_none());
    recorder.clear();

    controller.video_enabled(&stream.id, VideoChangeReason::PublishVideo);
    room.dispatch_pending();
    let bob = room.participant(&Identity::from("bob")).unwrap();
    assert_eq!(bob.camera.as_ref().unwrap().id().as_str(), "S4-camera");

    controller.video_disabled(&stream.id, VideoChangeReason::PublishVideo);
    controller.video_enabled(&stream.id, VideoChangeReason::PublishVideo);
    room.dispatch_pending();
    let bob = room.participant(&Identity::from("bob")).unwrap();
    assert_eq!(bob.camera.as_ref().unwrap().id().as_str(), "S4-camera-2");
    assert_eq!(recorder.count(RoomEventKind::TrackSubscribed), 2);
}

#[tokio::test]
async fn test_element_playing_refreshes_media_in_place() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    let element = bob_joins(&mut room, &controller, "S1");
    let camera = room.participant(&Identity::from("bob")).unwrap().camera.clone().unwrap();
    let view = MediaElement::new();
    camera.attach(&view);

    let refreshed = remote_media(true, true);
    element.set_src_object(Some(refreshed.clone()));
    controller.element_playing(&StreamId::new("S1"));
    room.dispatch_pending();

    let video = refreshed.video_track().unwrap();
    assert!(camera.media().same_as(video));
    assert!(view.is_bound_to(video));
    assert_eq!(camera.id().as_str(), "S1-camera");
}

#[tokio::test]
async fn test_audio_output_device_switch() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    bob_joins(&mut room, &controller, "S1");
    let mic = room.participant(&Identity::from("bob")).unwrap().mic.clone().unwrap();
    let element = MediaElement::new();
    mic.attach(&element);

    room.set_audio_output_device("headset");
    bob_joins(&mut room, &controller, "S2");

    assert_eq!(controller.audio_output().as_deref(), Some("headset"));
    assert_eq!(element.sink_id().as_deref(), Some("headset"));
    let replacement = room.participant(&Identity::from("bob")).unwrap().mic.clone().unwrap();
    let later = MediaElement::new();
    replacement.attach(&later);
    assert_eq!(later.sink_id().as_deref(), Some("headset"));
}

// ============================================================================
// Local media
// ============================================================================

#[tokio::test]
async fn test_start_camera_without_publisher_is_video_only() {
    let (backend, controller) = MockPubSubBackend::builder().build();
    let mut room = PubSubRoom::new(backend, AdapterSettings::default());
    let media = camera("cam-1");

    let track = room.start_camera(media.clone()).await.unwrap();

    assert!(track.media().same_as(&media));
    assert!(room.local_track(TrackRole::Mic).is_none());
    assert_eq!(
        controller.calls(),
        vec![PubSubCall::InitPublisher {
            publisher: publisher(1),
            name: "camera".to_string(),
            publish_audio: false,
            publish_video: true,
        }]
    );

    // The prepared publisher is enough to join.
    room.connect(options()).await.unwrap();
    assert_eq!(controller.published(), vec![publisher(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_camera_switch_publishes_replacement_before_retiring() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    let old_camera = room.local_track(TrackRole::Camera).unwrap();
    let mic = room.local_track(TrackRole::Mic).unwrap();
    let old_mic_media = mic.media();
    let replacement = camera("cam-2");

    let track = room.change_camera(replacement.clone()).await.unwrap();

    assert_eq!(
        controller.calls(),
        vec![
            PubSubCall::InitPublisher {
                publisher: publisher(2),
                name: "camera".to_string(),
                publish_audio: true,
                publish_video: true,
            },
            PubSubCall::Publish(publisher(2)),
            PubSubCall::Unpublish(publisher(1)),
            PubSubCall::DestroyPublisher(publisher(1)),
        ]
    );
    let timed = controller.timed_calls();
    let published_at = timed
        .iter()
        .find(|(_, call)| *call == PubSubCall::Publish(publisher(2)))
        .map(|(at, _)| *at)
        .unwrap();
    let unpublished_at = timed
        .iter()
        .find(|(_, call)| *call == PubSubCall::Unpublish(publisher(1)))
        .map(|(at, _)| *at)
        .unwrap();
    assert!(unpublished_at.duration_since(published_at) >= Duration::from_millis(250));

    assert!(track.media().same_as(&replacement));
    assert_eq!(room.local_track(TrackRole::Camera), Some(track));
    assert!(old_camera.is_stopped());
    assert_eq!(room.local_track(TrackRole::Mic).unwrap().id(), mic.id());
    assert!(!mic.is_stopped());
    assert!(old_mic_media.is_ended());
    assert!(!mic.media().same_as(&old_mic_media));
    assert_eq!(controller.live_publishers(), vec![publisher(2)]);
    assert_eq!(controller.published(), vec![publisher(2)]);
}

#[tokio::test(start_paused = true)]
async fn test_camera_switch_uses_configured_grace_and_mic_state() {
    let (backend, controller) = MockPubSubBackend::builder().identity("alice").build();
    let settings = AdapterSettings {
        camera_switch_grace: Duration::from_millis(1000),
        ..AdapterSettings::default()
    };
    let mut room = PubSubRoom::new(backend, settings);
    room.create_local_tracks(&camera_and_mic()).await.unwrap();
    room.connect(options()).await.unwrap();
    room.enable_mic(false);
    let started = tokio::time::Instant::now();

    room.change_camera(camera("cam-2")).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(1000));
    let mic = room.local_track(TrackRole::Mic).unwrap();
    assert!(!mic.is_enabled());
    assert!(!mic.media().is_enabled());
    assert!(!controller.publisher_options(&publisher(2)).unwrap().publish_audio);
}

#[tokio::test]
async fn test_camera_switch_failure_leaves_state_untouched() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    let camera_before = room.local_track(TrackRole::Camera).unwrap();
    let mic_media = room.local_track(TrackRole::Mic).unwrap().media();
    controller.set_publish_error(Some(BackendError::Rejected("quota".to_string())));

    let result = room.change_camera(camera("cam-2")).await;

    assert!(matches!(result, Err(RoomError::Publish(_))));
    assert_eq!(room.local_track(TrackRole::Camera), Some(camera_before.clone()));
    assert!(!camera_before.is_stopped());
    assert!(room.local_track(TrackRole::Mic).unwrap().media().same_as(&mic_media));
    assert_eq!(controller.live_publishers(), vec![publisher(1)]);
    assert_eq!(controller.published(), vec![publisher(1)]);
}

#[tokio::test]
async fn test_camera_switch_init_failure_is_acquisition_error() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    controller.set_init_error(Some(BackendError::Device("camera busy".to_string())));

    let result = room.change_camera(camera("cam-2")).await;

    assert!(matches!(result, Err(RoomError::Acquisition(_))));
    assert_eq!(controller.live_publishers(), vec![publisher(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_stop_then_start_camera() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    let camera_before = room.local_track(TrackRole::Camera).unwrap();
    let mic = room.local_track(TrackRole::Mic).unwrap();

    room.stop_camera().await.unwrap();
    room.stop_camera().await.unwrap();

    assert_eq!(
        controller.calls(),
        vec![PubSubCall::PublishVideo {
            publisher: publisher(1),
            enabled: false,
        }]
    );
    assert!(camera_before.is_stopped());
    assert!(room.local_track(TrackRole::Camera).is_none());
    assert_eq!(room.local_track(TrackRole::Mic), Some(mic.clone()));

    let track = room.start_camera(camera("cam-3")).await.unwrap();

    assert_eq!(room.local_track(TrackRole::Camera), Some(track));
    assert_eq!(room.local_track(TrackRole::Mic).unwrap().id(), mic.id());
    assert_eq!(controller.live_publishers(), vec![publisher(2)]);
}

#[tokio::test]
async fn test_enable_mic_toggles_audio_publication() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    let mic = room.local_track(TrackRole::Mic).unwrap();

    room.enable_mic(false);
    room.enable_mic(true);

    assert!(mic.is_enabled());
    assert_eq!(room.local_track(TrackRole::Mic).unwrap().id(), mic.id());
    assert_eq!(
        controller.calls(),
        vec![
            PubSubCall::PublishAudio {
                publisher: publisher(1),
                enabled: false,
            },
            PubSubCall::PublishAudio {
                publisher: publisher(1),
                enabled: true,
            },
        ]
    );
}

#[tokio::test]
async fn test_change_mic_swaps_audio_source() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    let mic = room.local_track(TrackRole::Mic).unwrap();
    let old_media = mic.media();

    let changed = room.change_mic("usb-mic").await.unwrap().unwrap();

    assert_eq!(changed.id(), mic.id());
    assert_eq!(changed.media().device_id(), Some("usb-mic"));
    assert!(old_media.is_ended());
    assert_eq!(
        controller.calls(),
        vec![PubSubCall::SetAudioSource {
            publisher: publisher(1),
            device_id: "usb-mic".to_string(),
        }]
    );
}

// ============================================================================
// Screen share
// ============================================================================

#[tokio::test]
async fn test_screenshare_is_its_own_publisher() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;

    let screen = room.start_screenshare(&screen_capture(true)).await.unwrap();
    let screen_audio = room.local_track(TrackRole::ScreenAudio).unwrap();

    assert_eq!(screen.role(), TrackRole::ScreenVideo);
    assert_eq!(
        controller.calls(),
        vec![
            PubSubCall::InitPublisher {
                publisher: publisher(2),
                name: "screen".to_string(),
                publish_audio: true,
                publish_video: true,
            },
            PubSubCall::Publish(publisher(2)),
        ]
    );

    controller.clear_calls();
    room.stop_screen_share().await;
    room.stop_screen_share().await;

    assert_eq!(
        controller.calls(),
        vec![
            PubSubCall::Unpublish(publisher(2)),
            PubSubCall::DestroyPublisher(publisher(2)),
        ]
    );
    assert!(screen.is_stopped());
    assert!(screen_audio.is_stopped());
    assert!(room.local_track(TrackRole::Camera).is_some());
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn test_screenshare_publish_failure_destroys_publisher() {
    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    controller.set_publish_error(Some(BackendError::Rejected("quota".to_string())));

    let result = room.start_screenshare(&screen_capture(false)).await;

    assert!(matches!(result, Err(RoomError::Publish(_))));
    assert!(room.local_track(TrackRole::ScreenVideo).is_none());
    assert_eq!(controller.live_publishers(), vec![publisher(1)]);
    assert_eq!(
        controller.calls(),
        vec![
            PubSubCall::InitPublisher {
                publisher: publisher(2),
                name: "screen".to_string(),
                publish_audio: false,
                publish_video: true,
            },
            PubSubCall::Publish(publisher(2)),
            PubSubCall::DestroyPublisher(publisher(2)),
        ]
    );

    controller.set_publish_error(None);
    let screen = room.start_screenshare(&screen_capture(false)).await.unwrap();
    assert_eq!(room.local_track(TrackRole::ScreenVideo), Some(screen));
    assert_eq!(controller.live_publishers(), vec![publisher(1), publisher(3)]);
}

#[tokio::test]
async fn test_screenshare_requires_connection_and_video() {
    let (backend, _controller) = MockPubSubBackend::builder().build();
    let mut room = PubSubRoom::new(backend, AdapterSettings::default());
    assert!(matches!(
        room.start_screenshare(&screen_capture(false)).await,
        Err(RoomError::NotConnected)
    ));

    let (mut room, _controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    assert!(matches!(
        room.start_screenshare(&MediaStream::default()).await,
        Err(RoomError::Acquisition(_))
    ));
}

// ============================================================================
// Signals
// ============================================================================

#[tokio::test]
async fn test_force_mute_addressed_to_us() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    let mic = room.local_track(TrackRole::Mic).unwrap();
    let signal = SignalEvent::force_mute(Identity::from("alice"), Identity::from("bob"));

    controller.signal_from("bob", &signal.encode().unwrap());
    room.dispatch_pending();

    assert!(!mic.is_enabled());
    assert_eq!(recorder.kinds(), vec![RoomEventKind::LocalMicForceDisabled]);
    assert_eq!(
        controller.calls(),
        vec![PubSubCall::PublishAudio {
            publisher: publisher(1),
            enabled: false,
        }]
    );
}

#[tokio::test]
async fn test_force_mute_for_someone_else_is_ignored() {
    let (mut room, controller, recorder) = connected(MockPubSubBackend::builder()).await;
    let mic = room.local_track(TrackRole::Mic).unwrap();
    let signal = SignalEvent::force_mute(Identity::from("carol"), Identity::from("bob"));

    controller.signal_from("bob", &signal.encode().unwrap());
    controller.signal_from("bob", "not json");
    room.dispatch_pending();

    assert!(mic.is_enabled());
    assert!(recorder.events().is_empty());
    assert!(controller.calls().is_empty());
}

#[tokio::test]
async fn test_signal_send_and_failures() {
    let signal = SignalEvent::force_mute(Identity::from("bob"), Identity::from("alice"));
    let (backend, _controller) = MockPubSubBackend::builder().build();
    let mut room = PubSubRoom::new(backend, AdapterSettings::default());
    assert!(matches!(room.signal(&signal).await, Err(RoomError::NotConnected)));

    let (mut room, controller, _recorder) = connected(MockPubSubBackend::builder()).await;
    room.signal(&signal).await.unwrap();
    assert_eq!(
        controller.calls(),
        vec![PubSubCall::Signal(signal.encode().unwrap())]
    );

    controller.fail_signal(BackendError::Closed("session closed".to_string()));
    assert!(matches!(room.signal(&signal).await, Err(RoomError::NotConnected)));
    controller.fail_signal(BackendError::Network("timeout".to_string()));
    assert!(matches!(room.signal(&signal).await, Err(RoomError::Signaling(_))));
}
