//! Aggregate reducers for the booking engine.
//!
//! This module contains both aggregates:
//! - Slots: one DJ's calendar, overlap and booked-slot invariants
//! - Booking: booking request lifecycle and authorization

pub mod booking;
pub mod slots;

pub use booking::{
    BookingCommand, BookingEnvironment, BookingEvent, BookingReducer, BookingState,
    DelegatePolicy, NoDelegates, StaticDelegates,
};
pub use slots::{CalendarState, SlotCommand, SlotEvent, SlotsEnvironment, SlotsReducer};
