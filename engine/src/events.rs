//! The engine's outbound event stream.
//!
//! Both aggregates publish through one [`EventSink`](gigmatch_core::event::EventSink)
//! so a collaborator sees slot and booking changes in the order they happened.

use crate::aggregates::{BookingEvent, SlotEvent};
use gigmatch_core::event::Event;
use serde::{Deserialize, Serialize};

/// Any event emitted by the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Calendar change
    Slot(SlotEvent),
    /// Booking request change
    Booking(BookingEvent),
}

impl Event for EngineEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Slot(event) => event.event_type(),
            Self::Booking(event) => event.event_type(),
        }
    }
}

impl From<SlotEvent> for EngineEvent {
    fn from(event: SlotEvent) -> Self {
        Self::Slot(event)
    }
}

impl From<BookingEvent> for EngineEvent {
    fn from(event: BookingEvent) -> Self {
        Self::Booking(event)
    }
}
