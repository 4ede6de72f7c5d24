//! Gigmatch - availability, booking and discovery engine for a DJ marketplace
//!
//! DJs publish time slots on their calendars, requesters find nearby DJs who
//! play the right styles and are still free on a date, and a booking request
//! moves from proposal to confirmation without ever double-booking a slot.
//!
//! # Architecture
//!
//! ```text
//!              ┌─────────────────────┐
//!              │ BookingCoordinator  │  booking table (one mutex)
//!              └──────────┬──────────┘
//!                         │ mark_booked / mark_free
//!                         ▼
//! ┌────────────┐   ┌──────────────┐   ┌───────────────────────┐
//! │ Discovery  │──▶│ Availability │──▶│      SlotStore        │
//! │  Matcher   │   │  Projector   │   │ one RwLock per DJ     │
//! └─────┬──────┘   └──────────────┘   └───────────────────────┘
//!       │
//!       ▼
//!  ProfileSource + geo (haversine)
//! ```
//!
//! Both write paths run synchronous reducers from [`aggregates`]: a command
//! is validated against state, turned into events, the events are applied,
//! and then published to an [`gigmatch_core::event::EventSink`].
//!
//! # Key Guarantees
//!
//! - Slots of one DJ never overlap, including across midnight
//! - A booked slot cannot be removed or moved until its booking is cancelled
//! - Of two concurrent confirms for the same slot exactly one wins; the
//!   other request comes back `Declined` with reason "slot taken"
//! - Terminal booking states never change again

pub mod aggregates;
pub mod app;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod events;
pub mod geo;
pub mod metrics;
pub mod projections;
pub mod store;
pub mod types;

pub use app::{Gigmatch, GigmatchBuilder};
pub use config::Config;
pub use coordinator::BookingCoordinator;
pub use discovery::{DiscoveryMatcher, DjMatch, InMemoryProfiles, MatchQuery, ProfileSource};
pub use error::{BookingError, ErrorKind};
pub use events::EngineEvent;
pub use projections::{AvailabilityProjector, DayStatus, DaySummary, SlotStatus};
pub use store::SlotStore;
pub use types::{
    Actor, BookingId, BookingRef, BookingRequest, BookingStatus, Coordinate, DaySchedule,
    DeclineReason, DjId, DjProfile, Money, SlotId, SlotState, StyleTag, TimeSlot, UserId,
};
