//! Booking request aggregate.
//!
//! Drives each [`BookingRequest`] through its lifecycle:
//!
//! ```text
//! Proposed ──confirm──▶ Confirmed ──cancel──▶ Cancelled
//!    │
//!    ├──decline / lost race / slot removed / expired──▶ Declined
//!    └──cancel──▶ Cancelled
//! ```
//!
//! `Declined` and `Cancelled` never change again. `Confirmed` only moves
//! to `Cancelled`, which releases the slot.
//!
//! The reducer only knows about booking requests. Reading and booking the
//! slot itself is the coordinator's job; it feeds the outcome back in as a
//! `Confirm` or a `Decline` with the matching reason.

use crate::error::BookingError;
use crate::types::{
    Actor, BookingId, BookingRequest, BookingStatus, DeclineReason, DjId, Money, SlotId, UserId,
};
use chrono::{DateTime, Duration, Utc};
use gigmatch_core::{SmallVec, environment::Clock, event::Event, reducer::Reducer, smallvec};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// ============================================================================
// Authorization
// ============================================================================

/// Decides which users may act on behalf of a DJ.
///
/// Backed by the marketplace's auth subsystem in production.
pub trait DelegatePolicy: Send + Sync {
    /// Whether `user_id` may confirm, decline and cancel bookings for `dj_id`
    fn may_act_for(&self, user_id: UserId, dj_id: DjId) -> bool;
}

/// Nobody acts for anyone but themselves
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDelegates;

impl DelegatePolicy for NoDelegates {
    fn may_act_for(&self, _user_id: UserId, _dj_id: DjId) -> bool {
        false
    }
}

/// Fixed set of `(delegate, dj)` grants
#[derive(Clone, Debug, Default)]
pub struct StaticDelegates {
    grants: HashSet<(UserId, DjId)>,
}

impl StaticDelegates {
    /// Creates an empty grant set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows `user_id` to act for `dj_id`
    #[must_use]
    pub fn with_delegate(mut self, user_id: UserId, dj_id: DjId) -> Self {
        self.grants.insert((user_id, dj_id));
        self
    }
}

impl DelegatePolicy for StaticDelegates {
    fn may_act_for(&self, user_id: UserId, dj_id: DjId) -> bool {
        self.grants.contains(&(user_id, dj_id))
    }
}

/// Whether `actor` speaks for `dj_id`: the DJ themselves or a granted delegate
fn acts_for_dj(actor: Actor, dj_id: DjId, delegates: &dyn DelegatePolicy) -> bool {
    match actor {
        Actor::Dj(id) => id == dj_id,
        Actor::Delegate {
            user_id,
            dj_id: claimed,
        } => claimed == dj_id && delegates.may_act_for(user_id, dj_id),
        Actor::User(_) => false,
    }
}

// ============================================================================
// State
// ============================================================================

/// Every booking request known to the coordinator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingState {
    requests: HashMap<BookingId, BookingRequest>,
}

impl BookingState {
    /// Creates an empty booking table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a request
    #[must_use]
    pub fn get(&self, booking_id: &BookingId) -> Option<&BookingRequest> {
        self.requests.get(booking_id)
    }

    /// All requests, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &BookingRequest> {
        self.requests.values()
    }

    /// Number of requests
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether no request was ever made
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// The confirmed request holding `slot_id`, if any
    #[must_use]
    pub fn confirmed_for_slot(&self, slot_id: &SlotId) -> Option<&BookingRequest> {
        self.requests.values().find(|request| {
            request.slot_id == *slot_id && request.status == BookingStatus::Confirmed
        })
    }

    /// Requests still awaiting an answer for `slot_id`
    pub fn pending_for_slot<'a>(
        &'a self,
        slot_id: &'a SlotId,
    ) -> impl Iterator<Item = &'a BookingRequest> + 'a {
        self.requests.values().filter(move |request| {
            request.slot_id == *slot_id && request.status == BookingStatus::Proposed
        })
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Booking lifecycle commands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BookingCommand {
    /// Open a new request
    Propose {
        /// Identifier to give the request
        booking_id: BookingId,
        /// Who is asking
        requester_id: UserId,
        /// Target DJ
        dj_id: DjId,
        /// Target slot
        slot_id: SlotId,
        /// Offered fee
        price: Money,
        /// Event title
        event_title: String,
    },
    /// Record that the slot was booked for this request
    Confirm {
        /// Request to confirm
        booking_id: BookingId,
        /// DJ or delegate confirming
        actor: Actor,
    },
    /// Turn the request down
    Decline {
        /// Request to decline
        booking_id: BookingId,
        /// DJ or delegate declining
        actor: Actor,
        /// Why
        reason: DeclineReason,
    },
    /// Withdraw the request or release a confirmed booking
    Cancel {
        /// Request to cancel
        booking_id: BookingId,
        /// Requester, DJ or delegate
        actor: Actor,
    },
    /// Decline every proposal older than the proposal time-to-live
    ExpireStale,
}

// ============================================================================
// Events
// ============================================================================

/// Facts about booking requests
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEvent {
    /// A request was opened
    BookingProposed {
        /// The new request, in `Proposed`
        request: BookingRequest,
    },
    /// The slot was booked for the request
    BookingConfirmed {
        /// Request
        booking_id: BookingId,
        /// DJ
        dj_id: DjId,
        /// Booked slot
        slot_id: SlotId,
        /// Who confirmed
        by: Actor,
        /// When
        confirmed_at: DateTime<Utc>,
    },
    /// The request was turned down
    BookingDeclined {
        /// Request
        booking_id: BookingId,
        /// DJ
        dj_id: DjId,
        /// Requested slot
        slot_id: SlotId,
        /// Why
        reason: DeclineReason,
        /// When
        declined_at: DateTime<Utc>,
    },
    /// The request was withdrawn
    BookingCancelled {
        /// Request
        booking_id: BookingId,
        /// DJ
        dj_id: DjId,
        /// Slot
        slot_id: SlotId,
        /// Who cancelled
        by: Actor,
        /// Whether the booking was confirmed, so the slot must be released
        was_confirmed: bool,
        /// When
        cancelled_at: DateTime<Utc>,
    },
}

impl BookingEvent {
    /// Request the event is about
    #[must_use]
    pub const fn booking_id(&self) -> BookingId {
        match self {
            Self::BookingProposed { request } => request.id,
            Self::BookingConfirmed { booking_id, .. }
            | Self::BookingDeclined { booking_id, .. }
            | Self::BookingCancelled { booking_id, .. } => *booking_id,
        }
    }
}

impl Event for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::BookingProposed { .. } => "BookingProposed.v1",
            Self::BookingConfirmed { .. } => "BookingConfirmed.v1",
            Self::BookingDeclined { .. } => "BookingDeclined.v1",
            Self::BookingCancelled { .. } => "BookingCancelled.v1",
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the booking aggregate
#[derive(Clone)]
pub struct BookingEnvironment {
    /// Clock for timestamps and expiry
    pub clock: Arc<dyn Clock>,
    /// Who may act for which DJ
    pub delegates: Arc<dyn DelegatePolicy>,
    /// How long a proposal may wait for an answer
    pub proposal_ttl: Duration,
}

impl BookingEnvironment {
    /// Creates a new `BookingEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        delegates: Arc<dyn DelegatePolicy>,
        proposal_ttl: Duration,
    ) -> Self {
        Self {
            clock,
            delegates,
            proposal_ttl,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the booking table
#[derive(Clone, Copy, Debug, Default)]
pub struct BookingReducer;

impl BookingReducer {
    /// Creates a new `BookingReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks that `command` is allowed against `state` and returns the
    /// request it targets.
    ///
    /// Returns `Ok(None)` for commands that do not target one existing
    /// request (`Propose`, `ExpireStale`).
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] for an unknown id
    /// - [`BookingError::Unauthorized`] when the actor may not act on the request
    /// - [`BookingError::InvalidTransition`] when the request's status forbids it
    pub fn validate<'a>(
        state: &'a BookingState,
        command: &BookingCommand,
        env: &BookingEnvironment,
    ) -> Result<Option<&'a BookingRequest>, BookingError> {
        let delegates = env.delegates.as_ref();

        let (action, booking_id, allowed, cancels) = match command {
            BookingCommand::Propose { .. } | BookingCommand::ExpireStale => return Ok(None),
            BookingCommand::Confirm { booking_id, actor } => ("confirm", booking_id, *actor, false),
            BookingCommand::Decline {
                booking_id, actor, ..
            } => ("decline", booking_id, *actor, false),
            BookingCommand::Cancel { booking_id, actor } => ("cancel", booking_id, *actor, true),
        };

        let request = state
            .get(booking_id)
            .ok_or(BookingError::BookingNotFound {
                booking_id: *booking_id,
            })?;

        let authorized = acts_for_dj(allowed, request.dj_id, delegates)
            || (cancels && allowed == Actor::User(request.requester_id));
        if !authorized {
            return Err(BookingError::Unauthorized {
                action,
                booking_id: *booking_id,
            });
        }

        let transition_ok = match request.status {
            BookingStatus::Proposed => true,
            BookingStatus::Confirmed => cancels,
            BookingStatus::Declined { .. } | BookingStatus::Cancelled { .. } => false,
        };
        if !transition_ok {
            return Err(BookingError::InvalidTransition {
                action,
                booking_id: *booking_id,
                from: request.status.name(),
            });
        }

        Ok(Some(request))
    }

    fn decide(
        state: &BookingState,
        command: BookingCommand,
        env: &BookingEnvironment,
    ) -> Result<SmallVec<[BookingEvent; 4]>, BookingError> {
        let now = env.clock.now();
        let target = Self::validate(state, &command, env)?;

        match (command, target) {
            (
                BookingCommand::Propose {
                    booking_id,
                    requester_id,
                    dj_id,
                    slot_id,
                    price,
                    event_title,
                },
                _,
            ) => Ok(smallvec![BookingEvent::BookingProposed {
                request: BookingRequest::new(
                    booking_id,
                    requester_id,
                    dj_id,
                    slot_id,
                    price,
                    event_title,
                    now,
                ),
            }]),

            (BookingCommand::Confirm { actor, .. }, Some(request)) => {
                Ok(smallvec![BookingEvent::BookingConfirmed {
                    booking_id: request.id,
                    dj_id: request.dj_id,
                    slot_id: request.slot_id,
                    by: actor,
                    confirmed_at: now,
                }])
            }

            (BookingCommand::Decline { reason, .. }, Some(request)) => {
                Ok(smallvec![BookingEvent::BookingDeclined {
                    booking_id: request.id,
                    dj_id: request.dj_id,
                    slot_id: request.slot_id,
                    reason,
                    declined_at: now,
                }])
            }

            (BookingCommand::Cancel { actor, .. }, Some(request)) => {
                Ok(smallvec![BookingEvent::BookingCancelled {
                    booking_id: request.id,
                    dj_id: request.dj_id,
                    slot_id: request.slot_id,
                    by: actor,
                    was_confirmed: request.status == BookingStatus::Confirmed,
                    cancelled_at: now,
                }])
            }

            (BookingCommand::ExpireStale, _) => {
                let cutoff = now
                    .checked_sub_signed(env.proposal_ttl)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                let mut stale: Vec<&BookingRequest> = state
                    .iter()
                    .filter(|request| {
                        request.status == BookingStatus::Proposed && request.created_at <= cutoff
                    })
                    .collect();
                stale.sort_by_key(|request| (request.created_at, *request.id.as_uuid()));

                Ok(stale
                    .into_iter()
                    .map(|request| BookingEvent::BookingDeclined {
                        booking_id: request.id,
                        dj_id: request.dj_id,
                        slot_id: request.slot_id,
                        reason: DeclineReason::Expired,
                        declined_at: now,
                    })
                    .collect())
            }

            // validate returns the target for every command that has one
            (_, None) => Ok(SmallVec::new()),
        }
    }
}

impl Reducer for BookingReducer {
    type State = BookingState;
    type Command = BookingCommand;
    type Event = BookingEvent;
    type Error = BookingError;
    type Environment = BookingEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        command: Self::Command,
        env: &Self::Environment,
    ) -> Result<SmallVec<[Self::Event; 4]>, Self::Error> {
        let events = Self::decide(state, command, env)?;
        for event in &events {
            Self::apply(state, event);
        }
        Ok(events)
    }

    fn apply(state: &mut Self::State, event: &Self::Event) {
        let (booking_id, status, at) = match event {
            BookingEvent::BookingProposed { request } => {
                state.requests.insert(request.id, request.clone());
                return;
            }
            BookingEvent::BookingConfirmed {
                booking_id,
                confirmed_at,
                ..
            } => (booking_id, BookingStatus::Confirmed, confirmed_at),
            BookingEvent::BookingDeclined {
                booking_id,
                reason,
                declined_at,
                ..
            } => (
                booking_id,
                BookingStatus::Declined { reason: *reason },
                declined_at,
            ),
            BookingEvent::BookingCancelled {
                booking_id,
                by,
                cancelled_at,
                ..
            } => (booking_id, BookingStatus::Cancelled { by: *by }, cancelled_at),
        };

        if let Some(request) = state.requests.get_mut(booking_id) {
            request.status = status;
            request.updated_at = *at;
        }
    }
}
