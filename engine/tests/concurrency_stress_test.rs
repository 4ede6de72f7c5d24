//! Concurrency stress tests for last-slot scenarios.
//!
//! These tests verify that under concurrent load the engine never
//! double-books a slot and never stores overlapping slots.
//!
//! Run with: `cargo test --test concurrency_stress_test -- --nocapture`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use gigmatch::{
    Actor, BookingError, BookingStatus, DeclineReason, DjId, Gigmatch, Money, SlotId, TimeSlot,
    UserId,
};
use gigmatch_testing::test_clock;
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 16;

fn engine() -> Gigmatch {
    Gigmatch::builder()
        .with_clock(Arc::new(test_clock()))
        .build()
        .unwrap()
}

fn saturday(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, hour, 0, 0).unwrap()
}

fn saturday_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

/// Test: 16 concurrent confirms for 16 proposals on one slot.
///
/// Verifies that:
/// - Exactly 1 request ends up `Confirmed`
/// - The other 15 end up `Declined` with reason "slot taken"
/// - The slot references the winning booking
#[test]
fn concurrent_confirms_on_one_slot_have_one_winner() {
    println!("🧪 {THREADS} concurrent confirms for 1 slot");

    let app = engine();
    let dj = DjId::new();
    let slot = app
        .slots
        .add_slot(dj, saturday_date(), saturday(20), saturday(20) + Duration::hours(6))
        .unwrap();

    let requests: Vec<_> = (0..THREADS)
        .map(|i| {
            app.bookings
                .propose(UserId::new(), dj, slot, Money::from_cents(50_000), format!("Party {i}"))
                .unwrap()
        })
        .collect();

    let barrier = Barrier::new(THREADS);
    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = requests
            .iter()
            .map(|request| {
                let app = &app;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    app.bookings.confirm(request.id, Actor::Dj(dj)).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<_> = outcomes
        .iter()
        .filter(|request| request.status == BookingStatus::Confirmed)
        .collect();
    assert_eq!(winners.len(), 1, "exactly one confirm must win");

    let losers = outcomes
        .iter()
        .filter(|request| {
            request.status
                == BookingStatus::Declined {
                    reason: DeclineReason::SlotTaken,
                }
        })
        .count();
    assert_eq!(losers, THREADS - 1);

    let stored = app.slots.get_slot(dj, slot).unwrap();
    assert_eq!(
        stored.booking_ref().and_then(|booking| booking.booking_id),
        Some(winners[0].id)
    );
    println!("  ✓ 1 confirmed, {losers} declined");
}

/// Test: the same interval added from many threads is stored once.
#[test]
fn concurrent_overlapping_adds_store_one_slot() {
    let app = engine();
    let dj = DjId::new();
    let barrier = Barrier::new(THREADS);

    let results: Vec<Result<SlotId, BookingError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let app = &app;
                let barrier = &barrier;
                // Every interval contains 21:00-22:00
                let start = saturday(18) + Duration::minutes(10 * i64::try_from(i).unwrap());
                scope.spawn(move || {
                    barrier.wait();
                    app.slots.add_slot(dj, saturday_date(), start, saturday(22))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let accepted = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(accepted, 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|error| matches!(error, BookingError::Overlap { .. })));
    assert_eq!(app.slots.list_slots(dj, saturday_date()).len(), 1);
}

/// Test: different DJs do not interfere.
#[test]
fn independent_djs_proceed_in_parallel() {
    let app = engine();
    let djs: Vec<DjId> = (0..THREADS).map(|_| DjId::new()).collect();

    thread::scope(|scope| {
        for &dj in &djs {
            let app = &app;
            scope.spawn(move || {
                for hour in (0..24).step_by(2) {
                    let start = saturday(hour);
                    app.slots
                        .add_slot(dj, saturday_date(), start, start + Duration::hours(2))
                        .unwrap();
                }
            });
        }
    });

    for dj in djs {
        assert_eq!(app.slots.list_slots(dj, saturday_date()).len(), 12);
    }
}

/// Test: readers racing several writers never see overlapping slots.
///
/// Writers add, move and delete two-hour slots on one DJ-day at offsets
/// that collide with each other, so every accepted change competes with
/// the other writers' slots. Readers check every snapshot they take.
#[test]
fn readers_never_observe_overlap() {
    const WRITERS: i64 = 4;
    const ROUNDS: i64 = 60;

    let app = engine();
    let dj = DjId::new();
    let barrier = Barrier::new(usize::try_from(WRITERS).unwrap() + 4);
    let midnight = saturday(0);

    let assert_disjoint = |slots: &[TimeSlot]| {
        for pair in slots.windows(2) {
            assert!(pair[0].end <= pair[1].start, "overlap observed: {pair:?}");
        }
    };

    thread::scope(|scope| {
        for writer in 0..WRITERS {
            let app = &app;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                let mut held: Vec<SlotId> = Vec::new();
                for round in 0..ROUNDS {
                    // Offsets stay within 00:00-18:00 so moved slots end on the same day
                    let offset = (writer * 45 + round * 25) % (18 * 60);
                    let start = midnight + Duration::minutes(offset);
                    let end = start + Duration::hours(2);
                    if let Ok(slot) = app.slots.add_slot(dj, saturday_date(), start, end) {
                        held.push(slot);
                    }

                    if let Some(&slot) = held.get(usize::try_from(round).unwrap() % 4) {
                        let shifted = midnight + Duration::minutes((offset + 70) % (18 * 60));
                        let _ = app
                            .slots
                            .reschedule_slot(dj, slot, shifted, shifted + Duration::hours(2));
                    }

                    if held.len() > 3 {
                        let oldest = held.remove(0);
                        app.slots.remove_slot(dj, oldest).unwrap();
                    }
                }
            });
        }

        for _ in 0..4 {
            let app = &app;
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                for _ in 0..500 {
                    assert_disjoint(&app.slots.list_slots(dj, saturday_date()));
                    for schedule in app
                        .slots
                        .list_range(dj, saturday_date(), saturday_date())
                        .unwrap()
                    {
                        assert_disjoint(&schedule.slots);
                    }
                }
            });
        }
    });

    assert_disjoint(&app.slots.list_slots(dj, saturday_date()));
}
