//! Slot store: the authoritative owner of every DJ's calendar.
//!
//! Each DJ's [`CalendarState`] sits behind its own `RwLock`. Mutations run
//! the [`SlotsReducer`] under the write lock, so writes to one DJ are
//! serialized while different DJs proceed in parallel. Reads take the read
//! lock and copy what they need, so they never observe a half-applied
//! command.

use crate::aggregates::{CalendarState, SlotCommand, SlotEvent, SlotsEnvironment, SlotsReducer};
use crate::error::{BookingError, Result};
use crate::events::EngineEvent;
use crate::metrics;
use crate::types::{BookingRef, DaySchedule, DjId, SlotId, TimeSlot};
use chrono::{DateTime, NaiveDate, Utc};
use gigmatch_core::{SmallVec, event::EventSink, reducer::Reducer};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type Calendar = Arc<RwLock<CalendarState>>;

/// Owner of all DJ calendars
pub struct SlotStore {
    calendars: RwLock<HashMap<DjId, Calendar>>,
    env: SlotsEnvironment,
    sink: Arc<dyn EventSink<EngineEvent>>,
}

impl SlotStore {
    /// Creates an empty store
    #[must_use]
    pub fn new(env: SlotsEnvironment, sink: Arc<dyn EventSink<EngineEvent>>) -> Self {
        Self {
            calendars: RwLock::new(HashMap::new()),
            env,
            sink,
        }
    }

    /// Defines a new free slot for `dj_id` and returns its id.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidRange`] if `start >= end`, `start` is not on
    ///   `date` or the slot is longer than the configured maximum
    /// - [`BookingError::Overlap`] if the interval intersects another slot
    pub fn add_slot(
        &self,
        dj_id: DjId,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<SlotId> {
        let slot_id = SlotId::new();
        let calendar = self.calendar_or_insert(dj_id);
        self.dispatch(
            dj_id,
            &calendar,
            SlotCommand::AddSlot {
                slot_id,
                date,
                start,
                end,
            },
        )?;
        Ok(slot_id)
    }

    /// Deletes a free slot.
    ///
    /// # Errors
    ///
    /// - [`BookingError::SlotNotFound`] if the DJ has no such slot
    /// - [`BookingError::SlotBooked`] if the slot is booked
    pub fn remove_slot(&self, dj_id: DjId, slot_id: SlotId) -> Result<()> {
        self.dispatch_existing(dj_id, slot_id, SlotCommand::RemoveSlot { slot_id })
            .map(drop)
    }

    /// Moves or resizes a free slot; the new date is the date of `start`.
    ///
    /// Returns the slot as stored after the move.
    ///
    /// # Errors
    ///
    /// - [`BookingError::SlotNotFound`] if the DJ has no such slot
    /// - [`BookingError::SlotBooked`] if the slot is booked
    /// - [`BookingError::InvalidRange`] or [`BookingError::Overlap`] as for
    ///   [`SlotStore::add_slot`], ignoring the slot's own current interval
    pub fn reschedule_slot(
        &self,
        dj_id: DjId,
        slot_id: SlotId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeSlot> {
        let calendar = self
            .calendar(dj_id)
            .ok_or(BookingError::SlotNotFound { dj_id, slot_id })?;
        self.dispatch(
            dj_id,
            &calendar,
            SlotCommand::RescheduleSlot {
                slot_id,
                date: start.date_naive(),
                start,
                end,
            },
        )?;
        read(&calendar)
            .get(&slot_id)
            .cloned()
            .ok_or(BookingError::SlotNotFound { dj_id, slot_id })
    }

    /// Books a free slot.
    ///
    /// The free check and the write happen under one write lock, so of two
    /// concurrent calls for the same slot exactly one succeeds.
    ///
    /// # Errors
    ///
    /// - [`BookingError::SlotNotFound`] if the DJ has no such slot
    /// - [`BookingError::SlotNotFree`] if the slot is already booked
    pub fn mark_booked(&self, dj_id: DjId, slot_id: SlotId, booking: BookingRef) -> Result<()> {
        self.dispatch_existing(dj_id, slot_id, SlotCommand::MarkBooked { slot_id, booking })
            .map(drop)
    }

    /// Releases a booked slot. Releasing a free slot does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] if the DJ has no such slot.
    pub fn mark_free(&self, dj_id: DjId, slot_id: SlotId) -> Result<()> {
        self.dispatch_existing(dj_id, slot_id, SlotCommand::MarkFree { slot_id })
            .map(drop)
    }

    /// Copy of the DJ's slots on `date`, ordered by start
    #[must_use]
    pub fn list_slots(&self, dj_id: DjId, date: NaiveDate) -> Vec<TimeSlot> {
        self.read_calendar(dj_id, |calendar| calendar.day(date).to_vec())
    }

    /// Copy of one slot
    #[must_use]
    pub fn get_slot(&self, dj_id: DjId, slot_id: SlotId) -> Option<TimeSlot> {
        self.read_calendar(dj_id, |calendar| calendar.get(&slot_id).cloned())
    }

    /// Every day in `from..=to` that has slots, taken from one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRange`] if `from > to`.
    pub fn list_range(
        &self,
        dj_id: DjId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DaySchedule>> {
        if from > to {
            return Err(BookingError::InvalidRange(format!(
                "range start {from} is after end {to}"
            )));
        }

        Ok(self.read_calendar(dj_id, |calendar| {
            calendar
                .range(from, to)
                .map(|(date, slots)| DaySchedule {
                    dj_id,
                    date,
                    slots: slots.to_vec(),
                })
                .collect()
        }))
    }

    /// Dates on which the DJ has at least one slot, ascending
    #[must_use]
    pub fn dates_with_slots(&self, dj_id: DjId) -> Vec<NaiveDate> {
        self.read_calendar(dj_id, |calendar| calendar.dates().collect())
    }

    /// Runs `f` against a consistent snapshot of the DJ's calendar.
    ///
    /// A DJ without a calendar reads as an empty one. `f` runs under the
    /// read lock and must not call back into the store for the same DJ.
    pub fn read_calendar<R>(&self, dj_id: DjId, f: impl FnOnce(&CalendarState) -> R) -> R {
        match self.calendar(dj_id) {
            Some(calendar) => f(&read(&calendar)),
            None => f(&CalendarState::new()),
        }
    }

    fn calendar(&self, dj_id: DjId) -> Option<Calendar> {
        self.calendars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&dj_id)
            .cloned()
    }

    fn calendar_or_insert(&self, dj_id: DjId) -> Calendar {
        if let Some(calendar) = self.calendar(dj_id) {
            return calendar;
        }
        self.calendars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(dj_id)
            .or_default()
            .clone()
    }

    fn dispatch_existing(
        &self,
        dj_id: DjId,
        slot_id: SlotId,
        command: SlotCommand,
    ) -> Result<SmallVec<[SlotEvent; 4]>> {
        let calendar = self.calendar(dj_id).ok_or_else(|| {
            let error = BookingError::SlotNotFound { dj_id, slot_id };
            metrics::record_rejection(&error);
            error
        })?;
        self.dispatch(dj_id, &calendar, command)
    }

    /// Runs one command under the DJ's write lock and publishes its events
    fn dispatch(
        &self,
        dj_id: DjId,
        calendar: &Calendar,
        command: SlotCommand,
    ) -> Result<SmallVec<[SlotEvent; 4]>> {
        tracing::debug!(%dj_id, ?command, "Dispatching slot command");

        let mut state = calendar.write().unwrap_or_else(PoisonError::into_inner);
        let outcome = match SlotsReducer::new(dj_id).reduce(&mut state, command, &self.env) {
            Ok(events) => {
                for event in &events {
                    metrics::record_slot_operation(event.operation());
                    self.sink.publish(&EngineEvent::Slot(event.clone()));
                }
                Ok(events)
            }
            Err(error) => {
                tracing::warn!(%dj_id, %error, "Slot command rejected");
                metrics::record_rejection(&error);
                Err(error)
            }
        };

        if state.is_empty() {
            self.prune(dj_id, calendar);
        }
        outcome
    }

    /// Drops an empty calendar from the map.
    ///
    /// Called with the calendar's write lock held. The map lock is never held
    /// while waiting for a calendar lock, so taking it here cannot deadlock.
    /// A calendar another caller has already cloned stays, since that caller
    /// may be about to write to it.
    fn prune(&self, dj_id: DjId, calendar: &Calendar) {
        let mut calendars = self.calendars.write().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held by the caller
        let unshared = calendars.get(&dj_id).is_some_and(|stored| {
            Arc::ptr_eq(stored, calendar) && Arc::strong_count(calendar) == 2
        });
        if unshared {
            calendars.remove(&dj_id);
        }
    }
}

fn read(calendar: &Calendar) -> std::sync::RwLockReadGuard<'_, CalendarState> {
    calendar.read().unwrap_or_else(PoisonError::into_inner)
}
