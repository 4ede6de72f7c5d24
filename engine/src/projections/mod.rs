//! Read models derived from the slot store.
//!
//! Projections never mutate anything. They read a snapshot of a DJ's
//! calendar and reduce it to what a calendar view or a search result shows.
//!
//! ### [`AvailabilityProjector`]
//!
//! Day and slot badges:
//! - Query: "Is this DJ free on June 15th?"
//! - Query: "Colour the days of this month for this DJ"
//! - Recomputed on every read

pub mod availability;

pub use availability::{AvailabilityProjector, DayStatus, DaySummary, SlotStatus, MAX_RANGE_DAYS};
