//! # Room Test Utilities
//!
//! Shared test utilities for the Huddle room core.
//!
//! This crate provides scriptable in-memory backends and test fixtures for
//! exercising both room adapters without a vendor SDK.
//!
//! ## Modules
//!
//! - `mock_track_backend` - Mock track-centric backend and its controller
//! - `mock_pubsub_backend` - Mock publisher/subscriber backend and its controller
//! - `fixtures` - Hardware streams, screen captures and identity payloads
//! - `recorder` - Captures every canonical event a room emits
//!
//! ## Usage
//!
//! ```rust,ignore
//! use room_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let (backend, controller) = MockTrackBackend::builder()
//!         .identity("alice")
//!         .with_participant("bob")
//!         .build();
//!     let mut room = TrackCentricRoom::new(backend, AdapterSettings::default());
//!     let recorder = EventRecorder::attach(room.events());
//!
//!     room.create_local_tracks(&camera_and_mic()).await.unwrap();
//!     room.connect(ConnectOptions::new("standup", "token")).await.unwrap();
//!
//!     controller.track_subscribed("bob", "MT1", "camera", NativeTrackKind::Video);
//!     room.dispatch_pending();
//!     assert_eq!(recorder.count(RoomEventKind::TrackSubscribed), 1);
//! }
//! ```
//!
//! Controllers share state with the backend they were built with, so native
//! callbacks can be injected and calls inspected after the backend has been
//! moved into a room.

pub mod fixtures;
pub mod mock_pubsub_backend;
pub mod mock_track_backend;
pub mod recorder;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_pubsub_backend::*;
pub use mock_track_backend::*;
pub use recorder::*;
