//! Availability projection for calendar and discovery badges.
//!
//! Derives a display status for a DJ-day or a slot straight from the slot
//! store. There is no cache: a day holds a handful of slots, so the status
//! is recomputed on every read.

use crate::error::{BookingError, Result};
use crate::store::SlotStore;
use crate::types::{DjId, TimeSlot};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Longest range [`AvailabilityProjector::range_status`] will expand
pub const MAX_RANGE_DAYS: i64 = 366;

/// Status of one DJ-day
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayStatus {
    /// No slots defined
    Unavailable,
    /// Every slot is free
    Available,
    /// Some slots free, some booked
    PartiallyBooked,
    /// Every slot is booked
    FullyBooked,
}

impl DayStatus {
    /// Derives the status of a day from its slots
    #[must_use]
    pub fn from_slots(slots: &[TimeSlot]) -> Self {
        let booked = slots.iter().filter(|slot| !slot.is_free()).count();
        match (slots.len(), booked) {
            (0, _) => Self::Unavailable,
            (_, 0) => Self::Available,
            (total, booked) if total == booked => Self::FullyBooked,
            _ => Self::PartiallyBooked,
        }
    }

    /// Whether a requester could still book something on this day
    #[must_use]
    pub const fn is_bookable(self) -> bool {
        matches!(self, Self::Available | Self::PartiallyBooked)
    }
}

/// Status of one slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotStatus {
    /// Open for booking
    Free,
    /// Occupied
    Booked,
}

/// Day status together with the slot counts behind it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    /// Derived status
    pub status: DayStatus,
    /// Free slots
    pub free: usize,
    /// Booked slots
    pub booked: usize,
}

/// Read-only view of availability over the slot store.
#[derive(Clone)]
pub struct AvailabilityProjector {
    slots: Arc<SlotStore>,
}

impl AvailabilityProjector {
    /// Creates a projector reading from `slots`
    #[must_use]
    pub const fn new(slots: Arc<SlotStore>) -> Self {
        Self { slots }
    }

    /// Status of `dj_id` on `date`; a DJ-day without slots is `Unavailable`
    #[must_use]
    pub fn day_status(&self, dj_id: DjId, date: NaiveDate) -> DayStatus {
        self.slots
            .read_calendar(dj_id, |calendar| DayStatus::from_slots(calendar.day(date)))
    }

    /// Status of a single slot
    #[must_use]
    pub const fn slot_status(slot: &TimeSlot) -> SlotStatus {
        if slot.is_free() {
            SlotStatus::Free
        } else {
            SlotStatus::Booked
        }
    }

    /// Status and slot counts of `dj_id` on `date`
    #[must_use]
    pub fn day_summary(&self, dj_id: DjId, date: NaiveDate) -> DaySummary {
        self.slots.read_calendar(dj_id, |calendar| {
            let slots = calendar.day(date);
            let free = slots.iter().filter(|slot| slot.is_free()).count();
            DaySummary {
                status: DayStatus::from_slots(slots),
                free,
                booked: slots.len() - free,
            }
        })
    }

    /// One status per date in `from..=to`, all read from one snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRange`] if `from > to` or the range
    /// covers more than [`MAX_RANGE_DAYS`] days.
    pub fn range_status(
        &self,
        dj_id: DjId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, DayStatus)>> {
        if from > to {
            return Err(BookingError::InvalidRange(format!(
                "range start {from} is after end {to}"
            )));
        }
        let days = (to - from).num_days() + 1;
        if days > MAX_RANGE_DAYS {
            return Err(BookingError::InvalidRange(format!(
                "range of {days} days exceeds {MAX_RANGE_DAYS}"
            )));
        }

        Ok(self.slots.read_calendar(dj_id, |calendar| {
            from.iter_days()
                .take_while(|date| *date <= to)
                .map(|date| (date, DayStatus::from_slots(calendar.day(date))))
                .collect()
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::SlotsEnvironment;
    use crate::types::{BookingRef, Money, UserId};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use gigmatch_core::event::NoopSink;
    use gigmatch_testing::test_clock;

    fn setup() -> (Arc<SlotStore>, AvailabilityProjector) {
        let env = SlotsEnvironment::new(Arc::new(test_clock()), Duration::hours(24));
        let store = Arc::new(SlotStore::new(env, Arc::new(NoopSink)));
        let projector = AvailabilityProjector::new(store.clone());
        (store, projector)
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn gig() -> BookingRef {
        BookingRef::new(None, "Club night".to_string(), UserId::new(), Money::from_cents(1))
    }

    #[test]
    fn day_status_follows_slot_states() {
        let (store, projector) = setup();
        let dj = DjId::new();
        assert_eq!(projector.day_status(dj, date(15)), DayStatus::Unavailable);

        let first = store.add_slot(dj, date(15), at(15, 18), at(15, 20)).unwrap();
        let second = store.add_slot(dj, date(15), at(15, 21), at(15, 23)).unwrap();
        assert_eq!(projector.day_status(dj, date(15)), DayStatus::Available);

        store.mark_booked(dj, first, gig()).unwrap();
        assert_eq!(projector.day_status(dj, date(15)), DayStatus::PartiallyBooked);
        assert_eq!(
            projector.day_summary(dj, date(15)),
            DaySummary {
                status: DayStatus::PartiallyBooked,
                free: 1,
                booked: 1
            }
        );

        store.mark_booked(dj, second, gig()).unwrap();
        assert_eq!(projector.day_status(dj, date(15)), DayStatus::FullyBooked);
        assert!(!projector.day_status(dj, date(15)).is_bookable());
    }

    #[test]
    fn slot_status_reads_state() {
        let (store, _) = setup();
        let dj = DjId::new();
        let slot_id = store.add_slot(dj, date(15), at(15, 18), at(15, 20)).unwrap();
        let slot = store.get_slot(dj, slot_id).unwrap();
        assert_eq!(AvailabilityProjector::slot_status(&slot), SlotStatus::Free);

        store.mark_booked(dj, slot_id, gig()).unwrap();
        let slot = store.get_slot(dj, slot_id).unwrap();
        assert_eq!(AvailabilityProjector::slot_status(&slot), SlotStatus::Booked);
    }

    #[test]
    fn range_status_covers_every_day() {
        let (store, projector) = setup();
        let dj = DjId::new();
        store.add_slot(dj, date(16), at(16, 18), at(16, 20)).unwrap();

        let statuses = projector.range_status(dj, date(15), date(17)).unwrap();
        assert_eq!(
            statuses,
            vec![
                (date(15), DayStatus::Unavailable),
                (date(16), DayStatus::Available),
                (date(17), DayStatus::Unavailable),
            ]
        );
        assert_eq!(projector.range_status(dj, date(15), date(15)).unwrap().len(), 1);
    }

    #[test]
    fn range_status_rejects_bad_ranges() {
        let (_, projector) = setup();
        let dj = DjId::new();
        assert!(matches!(
            projector.range_status(dj, date(17), date(15)),
            Err(BookingError::InvalidRange(_))
        ));

        let far = date(1) + Duration::days(MAX_RANGE_DAYS);
        assert!(projector.range_status(dj, date(1), far).is_err());
    }
}
