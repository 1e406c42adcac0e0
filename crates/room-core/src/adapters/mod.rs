//! Backend adapters implementing [`Room`](crate::room::Room).
//!
//! Each adapter owns a vendor seam trait (`backend` module) that a real SDK
//! binding or a test double implements, and translates its callbacks into
//! canonical [`RoomEvent`](crate::events::RoomEvent)s.

pub mod pubsub;
pub mod track_centric;
