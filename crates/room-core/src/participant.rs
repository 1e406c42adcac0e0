//! Participant: role-keyed tracks of one identity.

use crate::track::{Track, TrackRole};
use common::types::{Identity, TrackId};

/// A local or remote identity's collection of role-keyed tracks.
///
/// Holds at most one track per role. Cloning is cheap; the clone shares the
/// same track handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub identity: Identity,
    pub camera: Option<Track>,
    pub mic: Option<Track>,
    pub screen: Option<Track>,
    pub screen_audio: Option<Track>,
}

impl Participant {
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            camera: None,
            mic: None,
            screen: None,
            screen_audio: None,
        }
    }

    fn slot(&self, role: TrackRole) -> &Option<Track> {
        match role {
            TrackRole::Camera => &self.camera,
            TrackRole::Mic => &self.mic,
            TrackRole::ScreenVideo => &self.screen,
            TrackRole::ScreenAudio => &self.screen_audio,
        }
    }

    fn slot_mut(&mut self, role: TrackRole) -> &mut Option<Track> {
        match role {
            TrackRole::Camera => &mut self.camera,
            TrackRole::Mic => &mut self.mic,
            TrackRole::ScreenVideo => &mut self.screen,
            TrackRole::ScreenAudio => &mut self.screen_audio,
        }
    }

    #[must_use]
    pub fn track(&self, role: TrackRole) -> Option<&Track> {
        self.slot(role).as_ref()
    }

    /// Store `track` under its role, returning the track it displaced.
    pub fn set_track(&mut self, track: Track) -> Option<Track> {
        self.slot_mut(track.role()).replace(track)
    }

    pub fn take_track(&mut self, role: TrackRole) -> Option<Track> {
        self.slot_mut(role).take()
    }

    /// Remove the track under `role` only if it is the track with `id`.
    ///
    /// A replacement that arrived under the same role is left in place.
    pub fn take_track_if(&mut self, role: TrackRole, id: &TrackId) -> Option<Track> {
        let slot = self.slot_mut(role);
        if slot.as_ref().is_some_and(|t| t.id() == id) {
            slot.take()
        } else {
            None
        }
    }

    #[must_use]
    pub fn track_by_id(&self, id: &TrackId) -> Option<&Track> {
        self.tracks().find(|t| t.id() == id)
    }

    /// Present tracks, in role order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        [&self.camera, &self.mic, &self.screen, &self.screen_audio]
            .into_iter()
            .flatten()
    }

    #[must_use]
    pub fn has_tracks(&self) -> bool {
        self.tracks().next().is_some()
    }

    /// Remove every track, leaving the participant empty.
    pub fn take_all(&mut self) -> Vec<Track> {
        TrackRole::ALL
            .into_iter()
            .filter_map(|role| self.take_track(role))
            .collect()
    }
}
