//! Vendor-neutral conferencing room.
//!
//! Application code talks to a [`Room`] and listens on its [`EventBus`];
//! neither depends on which backend carries the media. Two adapters are
//! provided:
//!
//! - [`TrackCentricRoom`] over a [`TrackBackend`], where remote media arrives
//!   as named, independently subscribable tracks.
//! - [`PubSubRoom`] over a [`PubSubBackend`], where media is published and
//!   subscribed as whole streams.
//!
//! The host is a single UI/event-loop thread. Media handles are `Rc`-based and
//! the backend seams are `?Send` async traits.
//!
//! ```rust,ignore
//! use room_core::{ConnectOptions, Room, RoomEventKind, TrackCentricRoom};
//!
//! let mut room = TrackCentricRoom::new(backend, config.adapter_settings());
//! room.events().on(RoomEventKind::TrackSubscribed, |event| {
//!     // mount event.track()
//! });
//! room.create_local_tracks(&hardware).await?;
//! room.connect(config.connect_options()).await?;
//! while room.dispatch_next().await {}
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod adapters;
pub mod config;
pub mod errors;
pub mod events;
pub mod media;
pub mod participant;
pub mod room;
pub mod signal;
pub mod track;

pub use adapters::pubsub::{PubSubBackend, PubSubRoom};
pub use adapters::track_centric::{TrackBackend, TrackCentricRoom};
pub use config::{AdapterSettings, RoomConfig};
pub use errors::{BackendError, RoomError};
pub use events::{EventBus, RoomEvent, RoomEventKind, Subscription};
pub use media::{MediaElement, MediaKind, MediaStream, MediaStreamTrack, VideoDimensions};
pub use participant::Participant;
pub use room::{ConnectOptions, ConnectionState, LocalTracks, Room};
pub use signal::{SignalEvent, SignalType};
pub use track::{Track, TrackOrigin, TrackRole};

pub use common::types::{Identity, TrackId};
