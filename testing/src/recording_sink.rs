//! In-memory event sink for assertions on published events.

use gigmatch_core::event::{Event, EventSink};
use std::sync::{Mutex, PoisonError};

/// Event sink that keeps a copy of every published event.
///
/// # Example
///
/// ```ignore
/// let sink = Arc::new(RecordingSink::new());
/// // ... hand `sink.clone()` to the engine and run commands ...
/// assert_eq!(sink.event_types(), vec!["SlotAdded.v1", "SlotBooked.v1"]);
/// ```
#[derive(Debug)]
pub struct RecordingSink<E> {
    events: Mutex<Vec<E>>,
}

impl<E: Clone> RecordingSink<E> {
    /// Create an empty sink
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of all events seen so far, in publish order
    #[must_use]
    pub fn events(&self) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of events seen so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been published yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<E: Event> RecordingSink<E> {
    /// Names of the recorded events, in publish order
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Event::event_type)
            .collect()
    }
}

impl<E: Clone> Default for RecordingSink<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event + Clone> EventSink<E> for RecordingSink<E> {
    fn publish(&self, event: &E) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Ping(u8);

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "Ping.v1"
        }
    }

    #[test]
    fn records_in_publish_order() {
        let sink = RecordingSink::new();
        sink.publish(&Ping(1));
        sink.publish(&Ping(2));

        assert_eq!(sink.events(), vec![Ping(1), Ping(2)]);
        assert_eq!(sink.event_types(), vec!["Ping.v1", "Ping.v1"]);

        sink.clear();
        assert!(sink.is_empty());
    }
}
