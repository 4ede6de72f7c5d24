//! Calendar aggregate: one DJ's time slots.
//!
//! Owns the per-day slot sequences and enforces the calendar invariants:
//! - slots of a DJ never overlap, including slots that run past midnight
//!   into the next day's schedule
//! - a booked slot always carries its booking reference (enforced by
//!   [`SlotState`]) and cannot be removed or moved
//!
//! Commands are validated completely before any event is applied, so a
//! rejected command never leaves a partial change behind.

use crate::error::BookingError;
use crate::types::{BookingRef, DjId, SlotId, SlotState, TimeSlot};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use gigmatch_core::{SmallVec, environment::Clock, event::Event, reducer::Reducer, smallvec};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// All slots of one DJ, grouped by calendar date
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalendarState {
    /// Slots per date, each sequence ordered by start
    days: BTreeMap<NaiveDate, Vec<TimeSlot>>,
    /// Which date each slot lives on
    index: HashMap<SlotId, NaiveDate>,
}

impl CalendarState {
    /// Creates an empty calendar
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots on `date`, ordered by start (empty if none)
    #[must_use]
    pub fn day(&self, date: NaiveDate) -> &[TimeSlot] {
        self.days.get(&date).map_or(&[], Vec::as_slice)
    }

    /// Looks up a slot by id
    #[must_use]
    pub fn get(&self, slot_id: &SlotId) -> Option<&TimeSlot> {
        let date = self.index.get(slot_id)?;
        self.day(*date).iter().find(|slot| slot.id == *slot_id)
    }

    /// Dates that currently have at least one slot, ascending
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    /// Dates in `from..=to` with their slots, ascending
    pub fn range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = (NaiveDate, &[TimeSlot])> + '_ {
        self.days
            .range(from..)
            .take_while(move |(date, _)| **date <= to)
            .map(|(date, slots)| (*date, slots.as_slice()))
    }

    /// Total number of slots across all dates
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.index.len()
    }

    /// Whether the calendar has no slots at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// First slot intersecting `[start, end)`, ignoring `skip`.
    ///
    /// Scans every date whose slots could reach into the interval: slots
    /// start on their own date and last at most `max_duration`.
    fn find_overlap(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_duration: Duration,
        skip: Option<SlotId>,
    ) -> Option<&TimeSlot> {
        let first = start
            .checked_sub_signed(max_duration)
            .map_or(NaiveDate::MIN, |earliest| earliest.date_naive());
        let last = end.date_naive();
        self.days
            .range(first..=last)
            .flat_map(|(_, slots)| slots.iter())
            .find(|slot| Some(slot.id) != skip && slot.overlaps(start, end))
    }

    fn insert(&mut self, slot: TimeSlot) {
        let date = slot.date;
        self.index.insert(slot.id, date);
        let slots = self.days.entry(date).or_default();
        let position = slots.partition_point(|existing| existing.start <= slot.start);
        slots.insert(position, slot);
    }

    fn take(&mut self, slot_id: &SlotId) -> Option<TimeSlot> {
        let date = self.index.remove(slot_id)?;
        let slots = self.days.get_mut(&date)?;
        let position = slots.iter().position(|slot| slot.id == *slot_id)?;
        let slot = slots.remove(position);
        if slots.is_empty() {
            self.days.remove(&date);
        }
        Some(slot)
    }

    fn get_mut(&mut self, slot_id: &SlotId) -> Option<&mut TimeSlot> {
        let date = self.index.get(slot_id)?;
        self.days
            .get_mut(date)?
            .iter_mut()
            .find(|slot| slot.id == *slot_id)
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Requests against one DJ's calendar
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotCommand {
    /// Define a new free slot
    AddSlot {
        /// Identifier to give the slot
        slot_id: SlotId,
        /// Calendar date the slot starts on
        date: NaiveDate,
        /// Start instant
        start: DateTime<Utc>,
        /// End instant
        end: DateTime<Utc>,
    },
    /// Delete a free slot
    RemoveSlot {
        /// Slot to delete
        slot_id: SlotId,
    },
    /// Move or resize a free slot
    RescheduleSlot {
        /// Slot to move
        slot_id: SlotId,
        /// New calendar date
        date: NaiveDate,
        /// New start instant
        start: DateTime<Utc>,
        /// New end instant
        end: DateTime<Utc>,
    },
    /// Occupy a free slot
    MarkBooked {
        /// Slot to book
        slot_id: SlotId,
        /// Gig details
        booking: BookingRef,
    },
    /// Release a booked slot
    MarkFree {
        /// Slot to release
        slot_id: SlotId,
    },
}

// ============================================================================
// Events
// ============================================================================

/// Facts about changes to a DJ's calendar
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotEvent {
    /// A free slot was defined
    SlotAdded {
        /// The new slot
        slot: TimeSlot,
        /// When
        added_at: DateTime<Utc>,
    },
    /// A free slot was deleted
    SlotRemoved {
        /// Owning DJ
        dj_id: DjId,
        /// Deleted slot
        slot_id: SlotId,
        /// Date it was on
        date: NaiveDate,
        /// When
        removed_at: DateTime<Utc>,
    },
    /// A free slot was moved or resized
    SlotRescheduled {
        /// Owning DJ
        dj_id: DjId,
        /// Moved slot
        slot_id: SlotId,
        /// New date
        date: NaiveDate,
        /// New start
        start: DateTime<Utc>,
        /// New end
        end: DateTime<Utc>,
        /// When
        rescheduled_at: DateTime<Utc>,
    },
    /// A slot became booked
    SlotBooked {
        /// Owning DJ
        dj_id: DjId,
        /// Booked slot
        slot_id: SlotId,
        /// Date of the slot
        date: NaiveDate,
        /// Gig details
        booking: BookingRef,
        /// When
        booked_at: DateTime<Utc>,
    },
    /// A booked slot was released
    SlotReleased {
        /// Owning DJ
        dj_id: DjId,
        /// Released slot
        slot_id: SlotId,
        /// Date of the slot
        date: NaiveDate,
        /// The booking that held it
        previous: BookingRef,
        /// When
        released_at: DateTime<Utc>,
    },
}

impl SlotEvent {
    /// Short operation name for metrics labels
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::SlotAdded { .. } => "add",
            Self::SlotRemoved { .. } => "remove",
            Self::SlotRescheduled { .. } => "reschedule",
            Self::SlotBooked { .. } => "book",
            Self::SlotReleased { .. } => "release",
        }
    }
}

impl Event for SlotEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::SlotAdded { .. } => "SlotAdded.v1",
            Self::SlotRemoved { .. } => "SlotRemoved.v1",
            Self::SlotRescheduled { .. } => "SlotRescheduled.v1",
            Self::SlotBooked { .. } => "SlotBooked.v1",
            Self::SlotReleased { .. } => "SlotReleased.v1",
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the calendar aggregate
#[derive(Clone)]
pub struct SlotsEnvironment {
    /// Clock for event timestamps
    pub clock: Arc<dyn Clock>,
    /// Longest allowed slot; bounds how far a slot may run past midnight
    pub max_slot_duration: Duration,
}

impl SlotsEnvironment {
    /// Creates a new `SlotsEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, max_slot_duration: Duration) -> Self {
        Self {
            clock,
            max_slot_duration,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for one DJ's calendar
#[derive(Clone, Copy, Debug, Default)]
pub struct SlotsReducer {
    dj_id: DjId,
}

impl SlotsReducer {
    /// Creates a reducer for `dj_id`'s calendar
    #[must_use]
    pub const fn new(dj_id: DjId) -> Self {
        Self { dj_id }
    }

    /// Validates an interval for a slot on `date`
    fn validate_range(
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        env: &SlotsEnvironment,
    ) -> Result<(), BookingError> {
        if start >= end {
            return Err(BookingError::InvalidRange(format!(
                "slot start {start} must be before end {end}"
            )));
        }

        if start.date_naive() != date {
            return Err(BookingError::InvalidRange(format!(
                "slot starting at {start} does not belong to {date}"
            )));
        }

        if end - start > env.max_slot_duration {
            return Err(BookingError::InvalidRange(format!(
                "slot of {} minutes exceeds the {} minute maximum",
                (end - start).num_minutes(),
                env.max_slot_duration.num_minutes()
            )));
        }

        Ok(())
    }

    /// Validates that `[start, end)` is clear of other slots
    fn validate_no_overlap(
        state: &CalendarState,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        skip: Option<SlotId>,
        env: &SlotsEnvironment,
    ) -> Result<(), BookingError> {
        match state.find_overlap(start, end, env.max_slot_duration, skip) {
            Some(existing) => Err(BookingError::Overlap {
                conflicting: existing.id,
                date: existing.date,
            }),
            None => Ok(()),
        }
    }

    fn require_slot<'a>(
        &self,
        state: &'a CalendarState,
        slot_id: SlotId,
    ) -> Result<&'a TimeSlot, BookingError> {
        state.get(&slot_id).ok_or(BookingError::SlotNotFound {
            dj_id: self.dj_id,
            slot_id,
        })
    }

    /// Turns a command into the events it produces, without touching state
    fn decide(
        &self,
        state: &CalendarState,
        command: SlotCommand,
        env: &SlotsEnvironment,
    ) -> Result<SmallVec<[SlotEvent; 4]>, BookingError> {
        let now = env.clock.now();

        match command {
            SlotCommand::AddSlot {
                slot_id,
                date,
                start,
                end,
            } => {
                Self::validate_range(date, start, end, env)?;
                Self::validate_no_overlap(state, start, end, None, env)?;

                Ok(smallvec![SlotEvent::SlotAdded {
                    slot: TimeSlot::new(slot_id, self.dj_id, date, start, end),
                    added_at: now,
                }])
            }

            SlotCommand::RemoveSlot { slot_id } => {
                let slot = self.require_slot(state, slot_id)?;
                if !slot.is_free() {
                    return Err(BookingError::SlotBooked { slot_id });
                }

                Ok(smallvec![SlotEvent::SlotRemoved {
                    dj_id: self.dj_id,
                    slot_id,
                    date: slot.date,
                    removed_at: now,
                }])
            }

            SlotCommand::RescheduleSlot {
                slot_id,
                date,
                start,
                end,
            } => {
                let slot = self.require_slot(state, slot_id)?;
                if !slot.is_free() {
                    return Err(BookingError::SlotBooked { slot_id });
                }
                Self::validate_range(date, start, end, env)?;
                Self::validate_no_overlap(state, start, end, Some(slot_id), env)?;

                Ok(smallvec![SlotEvent::SlotRescheduled {
                    dj_id: self.dj_id,
                    slot_id,
                    date,
                    start,
                    end,
                    rescheduled_at: now,
                }])
            }

            SlotCommand::MarkBooked { slot_id, booking } => {
                let slot = self.require_slot(state, slot_id)?;
                if !slot.is_free() {
                    return Err(BookingError::SlotNotFree { slot_id });
                }

                Ok(smallvec![SlotEvent::SlotBooked {
                    dj_id: self.dj_id,
                    slot_id,
                    date: slot.date,
                    booking,
                    booked_at: now,
                }])
            }

            SlotCommand::MarkFree { slot_id } => {
                let slot = self.require_slot(state, slot_id)?;
                match &slot.state {
                    // Already free: nothing to do
                    SlotState::Free => Ok(SmallVec::new()),
                    SlotState::Booked(previous) => Ok(smallvec![SlotEvent::SlotReleased {
                        dj_id: self.dj_id,
                        slot_id,
                        date: slot.date,
                        previous: previous.clone(),
                        released_at: now,
                    }]),
                }
            }
        }
    }
}

impl Reducer for SlotsReducer {
    type State = CalendarState;
    type Command = SlotCommand;
    type Event = SlotEvent;
    type Error = BookingError;
    type Environment = SlotsEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        command: Self::Command,
        env: &Self::Environment,
    ) -> Result<SmallVec<[Self::Event; 4]>, Self::Error> {
        let events = self.decide(state, command, env)?;
        for event in &events {
            Self::apply(state, event);
        }
        Ok(events)
    }

    fn apply(state: &mut Self::State, event: &Self::Event) {
        match event {
            SlotEvent::SlotAdded { slot, .. } => {
                state.insert(slot.clone());
            }

            SlotEvent::SlotRemoved { slot_id, .. } => {
                state.take(slot_id);
            }

            SlotEvent::SlotRescheduled {
                slot_id,
                date,
                start,
                end,
                ..
            } => {
                if let Some(mut slot) = state.take(slot_id) {
                    slot.date = *date;
                    slot.start = *start;
                    slot.end = *end;
                    state.insert(slot);
                }
            }

            SlotEvent::SlotBooked {
                slot_id, booking, ..
            } => {
                if let Some(slot) = state.get_mut(slot_id) {
                    slot.state = SlotState::Booked(booking.clone());
                }
            }

            SlotEvent::SlotReleased { slot_id, .. } => {
                if let Some(slot) = state.get_mut(slot_id) {
                    slot.state = SlotState::Free;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Money, UserId};
    use chrono::TimeZone;
    use gigmatch_core::reducer::replay;
    use gigmatch_testing::{ReducerTest, test_clock};

    fn env() -> SlotsEnvironment {
        SlotsEnvironment::new(Arc::new(test_clock()), Duration::hours(24))
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn gig() -> BookingRef {
        BookingRef::new(
            None,
            "Rooftop Sunset".to_string(),
            UserId::new(),
            Money::from_cents(40_000),
        )
    }

    fn add(slot_id: SlotId, day: u32, from: u32, hours: i64) -> SlotCommand {
        SlotCommand::AddSlot {
            slot_id,
            date: date(day),
            start: at(day, from),
            end: at(day, from) + Duration::hours(hours),
        }
    }

    fn state_with(reducer: SlotsReducer, commands: Vec<SlotCommand>) -> CalendarState {
        let mut state = CalendarState::new();
        for command in commands {
            reducer.reduce(&mut state, command, &env()).unwrap();
        }
        state
    }

    #[test]
    fn overlap_scan_survives_a_huge_max_duration() {
        let reducer = SlotsReducer::new(DjId::new());
        let env = SlotsEnvironment::new(Arc::new(test_clock()), Duration::days(100_000_000));
        let mut state = CalendarState::new();

        reducer.reduce(&mut state, add(SlotId::new(), 15, 20, 6), &env).unwrap();
        assert!(matches!(
            reducer.reduce(&mut state, add(SlotId::new(), 16, 1, 2), &env),
            Err(BookingError::Overlap { .. })
        ));
        assert_eq!(state.slot_count(), 1);
    }

    #[test]
    fn add_slot_emits_event_and_stores_slot() {
        let dj_id = DjId::new();
        let slot_id = SlotId::new();

        ReducerTest::new(SlotsReducer::new(dj_id))
            .with_env(env())
            .given_state(CalendarState::new())
            .when_command(add(slot_id, 15, 20, 6))
            .then_events(move |events| {
                assert_eq!(events.len(), 1);
                assert!(matches!(
                    &events[0],
                    SlotEvent::SlotAdded { slot, .. } if slot.id == slot_id && slot.dj_id == dj_id
                ));
            })
            .then_state(move |state| {
                let day = state.day(date(15));
                assert_eq!(day.len(), 1);
                assert_eq!(day[0].start, at(15, 20));
                assert_eq!(day[0].end, at(16, 2));
            })
            .run();
    }

    #[test]
    fn reversed_interval_is_invalid() {
        let reducer = SlotsReducer::new(DjId::new());
        ReducerTest::new(reducer)
            .with_env(env())
            .given_state(CalendarState::new())
            .when_command(SlotCommand::AddSlot {
                slot_id: SlotId::new(),
                date: date(15),
                start: at(15, 22),
                end: at(15, 20),
            })
            .then_error(|error| {
                assert!(matches!(error, BookingError::InvalidRange(_)));
            })
            .then_state(|state| assert!(state.is_empty()))
            .run();
    }

    #[test]
    fn slot_must_start_on_its_date() {
        let reducer = SlotsReducer::new(DjId::new());
        let mut state = CalendarState::new();
        let result = reducer.reduce(
            &mut state,
            SlotCommand::AddSlot {
                slot_id: SlotId::new(),
                date: date(14),
                start: at(15, 20),
                end: at(15, 22),
            },
            &env(),
        );
        assert!(matches!(result, Err(BookingError::InvalidRange(_))));
    }

    #[test]
    fn overlap_is_rejected_and_adjacent_is_accepted() {
        let reducer = SlotsReducer::new(DjId::new());
        let first = SlotId::new();
        let mut state = state_with(reducer, vec![add(first, 15, 18, 2)]);

        let overlapping = reducer.reduce(&mut state, add(SlotId::new(), 15, 19, 2), &env());
        assert_eq!(
            overlapping.unwrap_err(),
            BookingError::Overlap {
                conflicting: first,
                date: date(15)
            }
        );

        assert!(reducer.reduce(&mut state, add(SlotId::new(), 15, 20, 2), &env()).is_ok());
        assert_eq!(state.day(date(15)).len(), 2);
    }

    #[test]
    fn overnight_slot_blocks_next_morning() {
        let reducer = SlotsReducer::new(DjId::new());
        let overnight = SlotId::new();
        let mut state = state_with(reducer, vec![add(overnight, 15, 20, 6)]);

        let result = reducer.reduce(&mut state, add(SlotId::new(), 16, 1, 2), &env());
        assert_eq!(
            result.unwrap_err(),
            BookingError::Overlap {
                conflicting: overnight,
                date: date(15)
            }
        );
        assert!(reducer.reduce(&mut state, add(SlotId::new(), 16, 2, 2), &env()).is_ok());
    }

    #[test]
    fn booked_slot_cannot_be_removed_or_moved() {
        let reducer = SlotsReducer::new(DjId::new());
        let slot_id = SlotId::new();
        let mut state = state_with(
            reducer,
            vec![
                add(slot_id, 15, 20, 4),
                SlotCommand::MarkBooked {
                    slot_id,
                    booking: gig(),
                },
            ],
        );

        let removed = reducer.reduce(&mut state, SlotCommand::RemoveSlot { slot_id }, &env());
        assert_eq!(removed.unwrap_err(), BookingError::SlotBooked { slot_id });

        let moved = reducer.reduce(
            &mut state,
            SlotCommand::RescheduleSlot {
                slot_id,
                date: date(16),
                start: at(16, 20),
                end: at(16, 23),
            },
            &env(),
        );
        assert_eq!(moved.unwrap_err(), BookingError::SlotBooked { slot_id });

        let again = reducer.reduce(
            &mut state,
            SlotCommand::MarkBooked {
                slot_id,
                booking: gig(),
            },
            &env(),
        );
        assert_eq!(again.unwrap_err(), BookingError::SlotNotFree { slot_id });
    }

    #[test]
    fn mark_free_is_idempotent() {
        let reducer = SlotsReducer::new(DjId::new());
        let slot_id = SlotId::new();
        let mut state = state_with(reducer, vec![add(slot_id, 15, 20, 4)]);

        let events = reducer
            .reduce(&mut state, SlotCommand::MarkFree { slot_id }, &env())
            .unwrap();
        assert!(events.is_empty());
        assert!(state.get(&slot_id).unwrap().is_free());
    }

    #[test]
    fn removing_last_slot_drops_the_day() {
        let reducer = SlotsReducer::new(DjId::new());
        let slot_id = SlotId::new();
        let mut state = state_with(reducer, vec![add(slot_id, 15, 20, 4)]);

        reducer
            .reduce(&mut state, SlotCommand::RemoveSlot { slot_id }, &env())
            .unwrap();
        assert_eq!(state.dates().count(), 0);
        assert!(state.get(&slot_id).is_none());
    }

    #[test]
    fn reschedule_moves_slot_between_days() {
        let reducer = SlotsReducer::new(DjId::new());
        let slot_id = SlotId::new();
        let mut state = state_with(reducer, vec![add(slot_id, 15, 20, 4)]);

        reducer
            .reduce(
                &mut state,
                SlotCommand::RescheduleSlot {
                    slot_id,
                    date: date(17),
                    start: at(17, 21),
                    end: at(17, 23),
                },
                &env(),
            )
            .unwrap();

        assert!(state.day(date(15)).is_empty());
        let moved = state.get(&slot_id).unwrap();
        assert_eq!(moved.date, date(17));
        assert_eq!(moved.start, at(17, 21));
    }

    #[test]
    fn reschedule_may_overlap_its_own_old_interval() {
        let reducer = SlotsReducer::new(DjId::new());
        let slot_id = SlotId::new();
        let mut state = state_with(reducer, vec![add(slot_id, 15, 20, 2)]);

        let result = reducer.reduce(
            &mut state,
            SlotCommand::RescheduleSlot {
                slot_id,
                date: date(15),
                start: at(15, 21),
                end: at(15, 23),
            },
            &env(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn slots_stay_sorted_by_start() {
        let reducer = SlotsReducer::new(DjId::new());
        let state = state_with(
            reducer,
            vec![
                add(SlotId::new(), 15, 22, 1),
                add(SlotId::new(), 15, 8, 1),
                add(SlotId::new(), 15, 14, 1),
            ],
        );
        let starts: Vec<_> = state.day(date(15)).iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![at(15, 8), at(15, 14), at(15, 22)]);
    }

    #[test]
    fn replaying_events_rebuilds_the_calendar() {
        let reducer = SlotsReducer::new(DjId::new());
        let slot_id = SlotId::new();
        let mut live = CalendarState::new();
        let mut log = Vec::new();
        for command in [
            add(slot_id, 15, 20, 4),
            add(SlotId::new(), 16, 20, 4),
            SlotCommand::MarkBooked {
                slot_id,
                booking: gig(),
            },
        ] {
            log.extend(reducer.reduce(&mut live, command, &env()).unwrap());
        }

        let mut rebuilt = CalendarState::new();
        replay::<SlotsReducer, _>(&mut rebuilt, &log);
        assert_eq!(rebuilt, live);
    }
}
