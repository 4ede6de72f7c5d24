//! Booking coordinator: runs the booking lifecycle against the slot store.
//!
//! The booking table lives behind one mutex, and every transition holds it
//! for its whole duration. Slot writes happen inside that critical section
//! through [`SlotStore`], which takes the DJ's calendar lock. Locks are
//! always taken in that order (bookings, then calendar) and the store never
//! calls back, so the pair cannot deadlock.
//!
//! `confirm` is the one place two callers can race for the same slot. The
//! store checks the slot is free and books it under one write lock; the
//! loser's request is declined with [`DeclineReason::SlotTaken`] and
//! returned as a normal result.

use crate::aggregates::{
    BookingCommand, BookingEnvironment, BookingEvent, BookingReducer, BookingState,
};
use crate::error::{BookingError, Result};
use crate::events::EngineEvent;
use crate::metrics;
use crate::store::SlotStore;
use crate::types::{
    Actor, BookingId, BookingRequest, BookingStatus, DeclineReason, DjId, Money, SlotId, UserId,
};
use gigmatch_core::{SmallVec, event::EventSink, reducer::Reducer};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Drives booking requests from proposal to a terminal state
pub struct BookingCoordinator {
    bookings: Mutex<BookingState>,
    slots: Arc<SlotStore>,
    env: BookingEnvironment,
    sink: Arc<dyn EventSink<EngineEvent>>,
}

impl BookingCoordinator {
    /// Creates a coordinator over `slots`
    #[must_use]
    pub fn new(
        slots: Arc<SlotStore>,
        env: BookingEnvironment,
        sink: Arc<dyn EventSink<EngineEvent>>,
    ) -> Self {
        Self {
            bookings: Mutex::new(BookingState::new()),
            slots,
            env,
            sink,
        }
    }

    /// Opens a booking request for a free slot.
    ///
    /// The free check is advisory: the slot is not reserved, and several
    /// proposals may target the same slot until one is confirmed.
    ///
    /// # Errors
    ///
    /// - [`BookingError::SlotNotFound`] if the DJ has no such slot
    /// - [`BookingError::SlotNotFree`] if the slot is already booked
    #[tracing::instrument(skip(self, event_title), fields(%requester_id, %dj_id, %slot_id))]
    pub fn propose(
        &self,
        requester_id: UserId,
        dj_id: DjId,
        slot_id: SlotId,
        price: Money,
        event_title: impl Into<String>,
    ) -> Result<BookingRequest> {
        let mut bookings = self.lock();

        let slot = self
            .slots
            .get_slot(dj_id, slot_id)
            .ok_or(BookingError::SlotNotFound { dj_id, slot_id })
            .inspect_err(metrics::record_rejection)?;
        if !slot.is_free() {
            let error = BookingError::SlotNotFree { slot_id };
            metrics::record_rejection(&error);
            return Err(error);
        }

        let booking_id = BookingId::new();
        self.dispatch(
            &mut bookings,
            BookingCommand::Propose {
                booking_id,
                requester_id,
                dj_id,
                slot_id,
                price,
                event_title: event_title.into(),
            },
        )?;

        tracing::info!(%booking_id, "Booking proposed");
        Self::snapshot(&bookings, booking_id)
    }

    /// Confirms a proposal by booking its slot.
    ///
    /// Returns the updated request. If the slot was taken by another
    /// booking in the meantime the request comes back `Declined` with
    /// [`DeclineReason::SlotTaken`]; if the slot was deleted it comes back
    /// `Declined` with [`DeclineReason::SlotRemoved`].
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] for an unknown id
    /// - [`BookingError::Unauthorized`] unless `actor` is the DJ or their delegate
    /// - [`BookingError::InvalidTransition`] unless the request is `Proposed`
    #[tracing::instrument(skip(self), fields(%booking_id, %actor))]
    pub fn confirm(&self, booking_id: BookingId, actor: Actor) -> Result<BookingRequest> {
        let mut bookings = self.lock();

        let confirm = BookingCommand::Confirm { booking_id, actor };
        let (dj_id, slot_id, booking_ref) =
            match BookingReducer::validate(&bookings, &confirm, &self.env) {
                Ok(Some(request)) => (request.dj_id, request.slot_id, request.booking_ref()),
                Ok(None) => return Err(BookingError::BookingNotFound { booking_id }),
                Err(error) => {
                    tracing::warn!(%error, "Confirm rejected");
                    metrics::record_rejection(&error);
                    return Err(error);
                }
            };

        // A slot freed by hand still belongs to its confirmed booking
        let outcome = if bookings.confirmed_for_slot(&slot_id).is_some() {
            Err(BookingError::SlotNotFree { slot_id })
        } else {
            self.slots.mark_booked(dj_id, slot_id, booking_ref)
        };

        let command = match outcome {
            Ok(()) => confirm,
            Err(BookingError::SlotNotFree { .. }) => {
                tracing::warn!(%slot_id, "Slot already taken, declining request");
                metrics::record_confirm_race_lost();
                BookingCommand::Decline {
                    booking_id,
                    actor,
                    reason: DeclineReason::SlotTaken,
                }
            }
            Err(BookingError::SlotNotFound { .. }) => {
                tracing::warn!(%slot_id, "Slot no longer exists, declining request");
                BookingCommand::Decline {
                    booking_id,
                    actor,
                    reason: DeclineReason::SlotRemoved,
                }
            }
            Err(error) => return Err(error),
        };

        self.dispatch(&mut bookings, command)?;
        let request = Self::snapshot(&bookings, booking_id)?;
        tracing::info!(status = request.status.name(), "Booking confirm settled");
        Ok(request)
    }

    /// Turns a proposal down.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] for an unknown id
    /// - [`BookingError::Unauthorized`] unless `actor` is the DJ or their delegate
    /// - [`BookingError::InvalidTransition`] unless the request is `Proposed`
    #[tracing::instrument(skip(self), fields(%booking_id, %actor))]
    pub fn decline(&self, booking_id: BookingId, actor: Actor) -> Result<BookingRequest> {
        let mut bookings = self.lock();
        self.dispatch(
            &mut bookings,
            BookingCommand::Decline {
                booking_id,
                actor,
                reason: DeclineReason::ByDj,
            },
        )?;

        tracing::info!("Booking declined");
        Self::snapshot(&bookings, booking_id)
    }

    /// Withdraws a proposal or cancels a confirmed booking.
    ///
    /// Cancelling a confirmed booking releases its slot.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] for an unknown id
    /// - [`BookingError::Unauthorized`] unless `actor` is the requester, the DJ
    ///   or the DJ's delegate
    /// - [`BookingError::InvalidTransition`] if the request is already
    ///   declined or cancelled
    #[tracing::instrument(skip(self), fields(%booking_id, %actor))]
    pub fn cancel(&self, booking_id: BookingId, actor: Actor) -> Result<BookingRequest> {
        let mut bookings = self.lock();
        let events = self.dispatch(&mut bookings, BookingCommand::Cancel { booking_id, actor })?;

        for event in &events {
            if let BookingEvent::BookingCancelled {
                dj_id,
                slot_id,
                was_confirmed: true,
                ..
            } = event
            {
                self.release(*dj_id, *slot_id, booking_id);
            }
        }

        tracing::info!("Booking cancelled");
        Self::snapshot(&bookings, booking_id)
    }

    /// Declines every proposal older than the proposal time-to-live.
    ///
    /// Returns the expired requests, oldest first.
    #[tracing::instrument(skip(self))]
    pub fn expire_stale_proposals(&self) -> Vec<BookingRequest> {
        let mut bookings = self.lock();
        let events = match self.dispatch(&mut bookings, BookingCommand::ExpireStale) {
            Ok(events) => events,
            Err(error) => {
                tracing::warn!(%error, "Proposal expiry failed");
                return Vec::new();
            }
        };

        let expired: Vec<BookingRequest> = events
            .iter()
            .filter_map(|event| bookings.get(&event.booking_id()).cloned())
            .collect();
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expired stale proposals");
        }
        expired
    }

    /// Copy of one request
    #[must_use]
    pub fn get(&self, booking_id: BookingId) -> Option<BookingRequest> {
        self.lock().get(&booking_id).cloned()
    }

    /// Requests addressed to `dj_id`, oldest first
    #[must_use]
    pub fn list_for_dj(&self, dj_id: DjId) -> Vec<BookingRequest> {
        self.collect(|request| request.dj_id == dj_id)
    }

    /// Requests made by `requester_id`, oldest first
    #[must_use]
    pub fn list_for_requester(&self, requester_id: UserId) -> Vec<BookingRequest> {
        self.collect(|request| request.requester_id == requester_id)
    }

    /// Proposals still awaiting an answer for `slot_id`, oldest first
    #[must_use]
    pub fn pending_for_slot(&self, slot_id: SlotId) -> Vec<BookingRequest> {
        let mut requests: Vec<BookingRequest> =
            self.lock().pending_for_slot(&slot_id).cloned().collect();
        sort_oldest_first(&mut requests);
        requests
    }

    fn collect(&self, keep: impl Fn(&BookingRequest) -> bool) -> Vec<BookingRequest> {
        let mut requests: Vec<BookingRequest> =
            self.lock().iter().filter(|r| keep(r)).cloned().collect();
        sort_oldest_first(&mut requests);
        requests
    }

    /// Frees the slot if it is still held by `booking_id`
    fn release(&self, dj_id: DjId, slot_id: SlotId, booking_id: BookingId) {
        let holder = self
            .slots
            .get_slot(dj_id, slot_id)
            .and_then(|slot| slot.booking_ref().and_then(|booking| booking.booking_id));
        if holder != Some(booking_id) {
            tracing::warn!(%slot_id, "Cancelled booking no longer holds its slot");
            return;
        }
        if let Err(error) = self.slots.mark_free(dj_id, slot_id) {
            tracing::warn!(%slot_id, %error, "Failed to release slot");
        }
    }

    fn lock(&self) -> MutexGuard<'_, BookingState> {
        self.bookings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(bookings: &BookingState, booking_id: BookingId) -> Result<BookingRequest> {
        bookings
            .get(&booking_id)
            .cloned()
            .ok_or(BookingError::BookingNotFound { booking_id })
    }

    /// Runs one command against the booking table and publishes its events
    fn dispatch(
        &self,
        bookings: &mut BookingState,
        command: BookingCommand,
    ) -> Result<SmallVec<[BookingEvent; 4]>> {
        tracing::debug!(?command, "Dispatching booking command");

        let was_pending = Self::targets(&command).is_none_or(|id| {
            bookings
                .get(&id)
                .is_some_and(|request| request.status == BookingStatus::Proposed)
        });

        match BookingReducer.reduce(bookings, command, &self.env) {
            Ok(events) => {
                for event in &events {
                    if let Some(request) = bookings.get(&event.booking_id()) {
                        metrics::record_booking_transition(request.status.name(), was_pending);
                    }
                    self.sink.publish(&EngineEvent::Booking(event.clone()));
                }
                Ok(events)
            }
            Err(error) => {
                tracing::warn!(%error, "Booking command rejected");
                metrics::record_rejection(&error);
                Err(error)
            }
        }
    }

    /// The single request a command targets, if it names one
    const fn targets(command: &BookingCommand) -> Option<BookingId> {
        match command {
            BookingCommand::Confirm { booking_id, .. }
            | BookingCommand::Decline { booking_id, .. }
            | BookingCommand::Cancel { booking_id, .. } => Some(*booking_id),
            BookingCommand::Propose { .. } | BookingCommand::ExpireStale => None,
        }
    }
}

fn sort_oldest_first(requests: &mut [BookingRequest]) {
    requests.sort_by_key(|request| (request.created_at, *request.id.as_uuid()));
}
