//! Captures canonical events for assertions.

use room_core::events::{EventBus, RoomEvent, RoomEventKind, Subscription};
use std::cell::RefCell;
use std::rc::Rc;

/// Records every event emitted on a bus, in emission order.
#[derive(Debug)]
pub struct EventRecorder {
    bus: EventBus,
    events: Rc<RefCell<Vec<RoomEvent>>>,
    subscriptions: Vec<Subscription>,
}

impl EventRecorder {
    /// Subscribe to every event kind on `bus`.
    #[must_use]
    pub fn attach(bus: &EventBus) -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let subscriptions = RoomEventKind::ALL
            .into_iter()
            .map(|kind| {
                let events = Rc::clone(&events);
                bus.on(kind, move |event| events.borrow_mut().push(event.clone()))
            })
            .collect();
        Self {
            bus: bus.clone(),
            events,
            subscriptions,
        }
    }

    /// All recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<RoomEvent> {
        self.events.borrow().clone()
    }

    /// Kinds of all recorded events, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<RoomEventKind> {
        self.events.borrow().iter().map(RoomEvent::kind).collect()
    }

    /// Number of recorded events of `kind`.
    #[must_use]
    pub fn count(&self, kind: RoomEventKind) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.kind() == kind)
            .count()
    }

    /// Recorded events of `kind`.
    #[must_use]
    pub fn of_kind(&self, kind: RoomEventKind) -> Vec<RoomEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.kind() == kind)
            .cloned()
            .collect()
    }

    /// The most recent event, if any.
    #[must_use]
    pub fn last(&self) -> Option<RoomEvent> {
        self.events.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Stop recording.
    pub fn detach(self) {
        for subscription in self.subscriptions {
            self.bus.off(subscription);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_emission_order() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);

        bus.emit(&RoomEvent::LocalMicForceDisabled);
        bus.emit(&RoomEvent::Disconnected { error: None });

        assert_eq!(
            recorder.kinds(),
            vec![RoomEventKind::LocalMicForceDisabled, RoomEventKind::Disconnected]
        );
        assert_eq!(recorder.count(RoomEventKind::Disconnected), 1);

        recorder.clear();
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_detach_stops_recording() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);

        recorder.detach();

        assert!(!bus.emit(&RoomEvent::LocalMicForceDisabled));
    }
}
