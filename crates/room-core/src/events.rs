//! Canonical room events and the typed event bus.
//!
//! Every adapter emits the same [`RoomEvent`] shapes regardless of backend.
//! [`EventBus`] keeps, per event kind, an ordered list of callbacks and
//! dispatches synchronously in subscription order. Subscribing or
//! unsubscribing from inside a callback is allowed: a listener removed during
//! dispatch is not called afterwards, and a listener added during dispatch is
//! first called on the next emission.

use crate::participant::Participant;
use crate::track::Track;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Discriminant of [`RoomEvent`], used to subscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomEventKind {
    ParticipantConnected,
    ParticipantDisconnected,
    DominantSpeakerChanged,
    TrackSubscribed,
    TrackUnsubscribed,
    TrackUnpublished,
    TrackEnabled,
    TrackDisabled,
    TrackDimensionsChanged,
    TrackSwitchedOff,
    TrackSwitchedOn,
    LocalMicForceDisabled,
    Disconnected,
}

impl RoomEventKind {
    pub const ALL: [RoomEventKind; 13] = [
        RoomEventKind::ParticipantConnected,
        RoomEventKind::ParticipantDisconnected,
        RoomEventKind::DominantSpeakerChanged,
        RoomEventKind::TrackSubscribed,
        RoomEventKind::TrackUnsubscribed,
        RoomEventKind::TrackUnpublished,
        RoomEventKind::TrackEnabled,
        RoomEventKind::TrackDisabled,
        RoomEventKind::TrackDimensionsChanged,
        RoomEventKind::TrackSwitchedOff,
        RoomEventKind::TrackSwitchedOn,
        RoomEventKind::LocalMicForceDisabled,
        RoomEventKind::Disconnected,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RoomEventKind::ParticipantConnected => "participant-connected",
            RoomEventKind::ParticipantDisconnected => "participant-disconnected",
            RoomEventKind::DominantSpeakerChanged => "dominant-speaker-changed",
            RoomEventKind::TrackSubscribed => "track-subscribed",
            RoomEventKind::TrackUnsubscribed => "track-unsubscribed",
            RoomEventKind::TrackUnpublished => "track-unpublished",
            RoomEventKind::TrackEnabled => "track-enabled",
            RoomEventKind::TrackDisabled => "track-disabled",
            RoomEventKind::TrackDimensionsChanged => "track-dimensions-changed",
            RoomEventKind::TrackSwitchedOff => "track-switched-off",
            RoomEventKind::TrackSwitchedOn => "track-switched-on",
            RoomEventKind::LocalMicForceDisabled => "local-mic-force-disabled",
            RoomEventKind::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for RoomEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical room event.
///
/// Participants carried by events are snapshots taken at emission time.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    ParticipantConnected { participant: Participant },
    ParticipantDisconnected { participant: Participant },
    /// `None` when nobody is speaking.
    DominantSpeakerChanged { participant: Option<Participant> },
    TrackSubscribed { track: Track, participant: Participant },
    TrackUnsubscribed { track: Track, participant: Participant },
    TrackUnpublished { track: Track, participant: Participant },
    TrackEnabled { track: Track, participant: Participant },
    TrackDisabled { track: Track, participant: Participant },
    TrackDimensionsChanged { track: Track, participant: Participant },
    TrackSwitchedOff { track: Track, participant: Participant },
    TrackSwitchedOn { track: Track, participant: Participant },
    /// The local microphone was disabled by a remote force-mute.
    LocalMicForceDisabled,
    /// The room left the connected state. `error` is set when the backend
    /// ended the session.
    Disconnected { error: Option<String> },
}

impl RoomEvent {
    #[must_use]
    pub fn kind(&self) -> RoomEventKind {
        match self {
            RoomEvent::ParticipantConnected { .. } => RoomEventKind::ParticipantConnected,
            RoomEvent::ParticipantDisconnected { .. } => RoomEventKind::ParticipantDisconnected,
            RoomEvent::DominantSpeakerChanged { .. } => RoomEventKind::DominantSpeakerChanged,
            RoomEvent::TrackSubscribed { .. } => RoomEventKind::TrackSubscribed,
            RoomEvent::TrackUnsubscribed { .. } => RoomEventKind::TrackUnsubscribed,
            RoomEvent::TrackUnpublished { .. } => RoomEventKind::TrackUnpublished,
            RoomEvent::TrackEnabled { .. } => RoomEventKind::TrackEnabled,
            RoomEvent::TrackDisabled { .. } => RoomEventKind::TrackDisabled,
            RoomEvent::TrackDimensionsChanged { .. } => RoomEventKind::TrackDimensionsChanged,
            RoomEvent::TrackSwitchedOff { .. } => RoomEventKind::TrackSwitchedOff,
            RoomEvent::TrackSwitchedOn { .. } => RoomEventKind::TrackSwitchedOn,
            RoomEvent::LocalMicForceDisabled => RoomEventKind::LocalMicForceDisabled,
            RoomEvent::Disconnected { .. } => RoomEventKind::Disconnected,
        }
    }

    #[must_use]
    pub fn track(&self) -> Option<&Track> {
        match self {
            RoomEvent::TrackSubscribed { track, .. }
            | RoomEvent::TrackUnsubscribed { track, .. }
            | RoomEvent::TrackUnpublished { track, .. }
            | RoomEvent::TrackEnabled { track, .. }
            | RoomEvent::TrackDisabled { track, .. }
            | RoomEvent::TrackDimensionsChanged { track, .. }
            | RoomEvent::TrackSwitchedOff { track, .. }
            | RoomEvent::TrackSwitchedOn { track, .. } => Some(track),
            _ => None,
        }
    }

    #[must_use]
    pub fn participant(&self) -> Option<&Participant> {
        match self {
            RoomEvent::ParticipantConnected { participant }
            | RoomEvent::ParticipantDisconnected { participant }
            | RoomEvent::TrackSubscribed { participant, .. }
            | RoomEvent::TrackUnsubscribed { participant, .. }
            | RoomEvent::TrackUnpublished { participant, .. }
            | RoomEvent::TrackEnabled { participant, .. }
            | RoomEvent::TrackDisabled { participant, .. }
            | RoomEvent::TrackDimensionsChanged { participant, .. }
            | RoomEvent::TrackSwitchedOff { participant, .. }
            | RoomEvent::TrackSwitchedOn { participant, .. } => Some(participant),
            RoomEvent::DominantSpeakerChanged { participant } => participant.as_ref(),
            RoomEvent::LocalMicForceDisabled | RoomEvent::Disconnected { .. } => None,
        }
    }
}

/// Token returned by [`EventBus::on`]; pass it to [`EventBus::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    kind: RoomEventKind,
}

impl Subscription {
    #[must_use]
    pub fn kind(&self) -> RoomEventKind {
        self.kind
    }
}

type Callback = Rc<dyn Fn(&RoomEvent)>;

struct Listener {
    id: u64,
    kind: RoomEventKind,
    once: bool,
    callback: Callback,
}

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<Listener>>,
}

/// Typed, synchronous event bus.
///
/// Cloning yields another handle to the same bus, so callbacks can capture a
/// handle and subscribe or unsubscribe while being dispatched.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, kind: RoomEventKind, once: bool, callback: Callback) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id.wrapping_add(1));
        self.inner.listeners.borrow_mut().push(Listener {
            id,
            kind,
            once,
            callback,
        });
        Subscription { id, kind }
    }

    /// Call `callback` for every event of `kind`.
    pub fn on<F>(&self, kind: RoomEventKind, callback: F) -> Subscription
    where
        F: Fn(&RoomEvent) + 'static,
    {
        self.register(kind, false, Rc::new(callback))
    }

    /// Call `callback` for the next event of `kind` only.
    pub fn once<F>(&self, kind: RoomEventKind, callback: F) -> Subscription
    where
        F: Fn(&RoomEvent) + 'static,
    {
        self.register(kind, true, Rc::new(callback))
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn off(&self, subscription: Subscription) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != subscription.id);
        listeners.len() != before
    }

    #[must_use]
    pub fn listener_count(&self, kind: RoomEventKind) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.kind == kind)
            .count()
    }

    /// Dispatch `event` to its listeners. Returns true if any was called.
    pub fn emit(&self, event: &RoomEvent) -> bool {
        let kind = event.kind();
        let snapshot: Vec<(u64, bool, Callback)> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.kind == kind)
            .map(|l| (l.id, l.once, Rc::clone(&l.callback)))
            .collect();

        debug!(
            target: "room.events",
            event = %kind,
            listeners = snapshot.len(),
            "Emitting room event"
        );

        let mut called = false;
        for (id, once, callback) in snapshot {
            // Skip listeners removed by an earlier callback in this dispatch.
            {
                let mut listeners = self.inner.listeners.borrow_mut();
                let Some(position) = listeners.iter().position(|l| l.id == id) else {
                    continue;
                };
                if once {
                    listeners.remove(position);
                }
            }
            callback(event);
            called = true;
        }
        called
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn disconnected() -> RoomEvent {
        RoomEvent::Disconnected { error: None }
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for n in 1..=3 {
            let order = Rc::clone(&order);
            bus.on(RoomEventKind::Disconnected, move |_| order.borrow_mut().push(n));
        }

        assert!(bus.emit(&disconnected()));
        assert_eq!(*order.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_emit_without_listeners_returns_false() {
        let bus = EventBus::new();
        bus.on(RoomEventKind::TrackSubscribed, |_| {});

        assert!(!bus.emit(&disconnected()));
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        bus.once(RoomEventKind::LocalMicForceDisabled, move |_| seen.set(seen.get() + 1));

        bus.emit(&RoomEvent::LocalMicForceDisabled);
        bus.emit(&RoomEvent::LocalMicForceDisabled);

        assert_eq!(count.get(), 1);
        assert_eq!(bus.listener_count(RoomEventKind::LocalMicForceDisabled), 0);
    }

    #[test]
    fn test_off_removes_listener() {
        let bus = EventBus::new();
        let sub = bus.on(RoomEventKind::Disconnected, |_| {});
        assert_eq!(bus.listener_count(RoomEventKind::Disconnected), 1);

        assert!(bus.off(sub));
        assert!(!bus.off(sub));
        assert_eq!(bus.listener_count(RoomEventKind::Disconnected), 0);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_skips_removed_listener() {
        let bus = EventBus::new();
        let second_called = Rc::new(Cell::new(false));
        let second_sub: Rc<Cell<Option<Subscription>>> = Rc::new(Cell::new(None));

        let handle = bus.clone();
        let target = Rc::clone(&second_sub);
        bus.on(RoomEventKind::Disconnected, move |_| {
            if let Some(sub) = target.get() {
                handle.off(sub);
            }
        });
        let flag = Rc::clone(&second_called);
        second_sub.set(Some(bus.on(RoomEventKind::Disconnected, move |_| flag.set(true))));

        bus.emit(&disconnected());

        assert!(!second_called.get());
    }

    #[test]
    fn test_subscribe_during_dispatch_applies_to_next_emission() {
        let bus = EventBus::new();
        let late_calls = Rc::new(Cell::new(0));

        let handle = bus.clone();
        let counter = Rc::clone(&late_calls);
        bus.once(RoomEventKind::Disconnected, move |_| {
            let counter = Rc::clone(&counter);
            handle.on(RoomEventKind::Disconnected, move |_| counter.set(counter.get() + 1));
        });

        bus.emit(&disconnected());
        assert_eq!(late_calls.get(), 0);

        bus.emit(&disconnected());
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn test_event_accessors() {
        let event = RoomEvent::DominantSpeakerChanged { participant: None };
        assert_eq!(event.kind(), RoomEventKind::DominantSpeakerChanged);
        assert!(event.participant().is_none());
        assert!(event.track().is_none());
        assert_eq!(RoomEventKind::TrackDimensionsChanged.as_str(), "track-dimensions-changed");
    }
}
