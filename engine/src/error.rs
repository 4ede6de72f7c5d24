//! Error taxonomy for the booking engine.
//!
//! Every error is a local, recoverable condition returned to the caller.
//! Callers that expose the engine over a network boundary can use
//! [`BookingError::status_code`] to map each kind onto a distinct status.

use crate::types::{BookingId, DjId, SlotId};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors returned by the slot store, booking coordinator and discovery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed input: reversed interval, non-positive distance, bad coordinate.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// The requested interval intersects an existing slot.
    #[error("Slot overlaps existing slot {conflicting} on {date}")]
    Overlap {
        /// The slot already occupying part of the interval
        conflicting: SlotId,
        /// Calendar date of the conflicting slot
        date: NaiveDate,
    },

    /// No such slot on the DJ's calendar.
    #[error("Slot {slot_id} not found for DJ {dj_id}")]
    SlotNotFound {
        /// DJ whose calendar was searched
        dj_id: DjId,
        /// Missing slot
        slot_id: SlotId,
    },

    /// The slot is already booked.
    #[error("Slot {slot_id} is not free")]
    SlotNotFree {
        /// Booked slot
        slot_id: SlotId,
    },

    /// A booked slot cannot be removed or edited until its booking is cancelled.
    #[error("Slot {slot_id} is booked; cancel the booking first")]
    SlotBooked {
        /// Booked slot
        slot_id: SlotId,
    },

    /// The actor may not perform this action on the booking.
    #[error("Not allowed to {action} booking {booking_id}")]
    Unauthorized {
        /// Attempted action
        action: &'static str,
        /// Target booking
        booking_id: BookingId,
    },

    /// The booking is not in a state that allows this action.
    #[error("Cannot {action} booking {booking_id} in state {from}")]
    InvalidTransition {
        /// Attempted action
        action: &'static str,
        /// Target booking
        booking_id: BookingId,
        /// Current status name
        from: &'static str,
    },

    /// Unknown booking id.
    #[error("Booking {booking_id} not found")]
    BookingNotFound {
        /// Missing booking
        booking_id: BookingId,
    },
}

/// Error kinds, one per variant of [`BookingError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`BookingError::InvalidRange`]
    InvalidRange,
    /// See [`BookingError::Overlap`]
    Overlap,
    /// See [`BookingError::SlotNotFound`]
    SlotNotFound,
    /// See [`BookingError::SlotNotFree`]
    SlotNotFree,
    /// See [`BookingError::SlotBooked`]
    SlotBooked,
    /// See [`BookingError::Unauthorized`]
    Unauthorized,
    /// See [`BookingError::InvalidTransition`]
    InvalidTransition,
    /// See [`BookingError::BookingNotFound`]
    BookingNotFound,
}

impl ErrorKind {
    /// Stable machine-readable code
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidRange => "INVALID_RANGE",
            Self::Overlap => "OVERLAP",
            Self::SlotNotFound => "SLOT_NOT_FOUND",
            Self::SlotNotFree => "SLOT_NOT_FREE",
            Self::SlotBooked => "SLOT_BOOKED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::BookingNotFound => "BOOKING_NOT_FOUND",
        }
    }
}

impl BookingError {
    /// The kind of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRange(_) => ErrorKind::InvalidRange,
            Self::Overlap { .. } => ErrorKind::Overlap,
            Self::SlotNotFound { .. } => ErrorKind::SlotNotFound,
            Self::SlotNotFree { .. } => ErrorKind::SlotNotFree,
            Self::SlotBooked { .. } => ErrorKind::SlotBooked,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::BookingNotFound { .. } => ErrorKind::BookingNotFound,
        }
    }

    /// HTTP-style status code for callers wrapping the engine in an RPC layer.
    ///
    /// Not-found kinds share 404 and slot conflicts share 409; the
    /// [`ErrorKind::code`] string tells them apart.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidRange => 400,
            ErrorKind::Unauthorized => 403,
            ErrorKind::SlotNotFound | ErrorKind::BookingNotFound => 404,
            ErrorKind::Overlap | ErrorKind::SlotNotFree | ErrorKind::SlotBooked => 409,
            ErrorKind::InvalidTransition => 422,
        }
    }

    /// Whether re-reading state and retrying may succeed
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Overlap | ErrorKind::SlotNotFree | ErrorKind::SlotBooked
        )
    }
}

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, BookingError>;
