//! # Gigmatch Testing
//!
//! Testing utilities and helpers for the gigmatch booking engine.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - [`RecordingSink`], an event sink that remembers what it saw
//! - proptest strategies for calendar intervals and coordinates
//!
//! ## Example
//!
//! ```ignore
//! use gigmatch_testing::{test_clock, RecordingSink};
//!
//! #[test]
//! fn slot_added_is_published() {
//!     let sink = Arc::new(RecordingSink::new());
//!     let store = SlotStore::new(config, sink.clone());
//!     store.add_slot(dj, date, start, end).unwrap();
//!     assert_eq!(sink.event_types(), vec!["SlotAdded.v1"]);
//! }
//! ```

use chrono::{DateTime, Utc};
use gigmatch_core::environment::Clock;

pub mod reducer_test;
pub mod recording_sink;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use gigmatch_testing::mocks::FixedClock;
    /// use gigmatch_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when the test tells it to.
    ///
    /// Used for proposal expiry tests.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock frozen at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2024-06-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Property-based testing utilities
///
/// Strategies produce plain numbers so they can be mapped onto the engine's
/// domain types by the tests that use them.
pub mod properties {
    use proptest::prelude::*;

    /// A `(start_minute, length_minutes)` interval inside one day.
    ///
    /// Starts fall anywhere in the day; lengths run from 15 minutes to 6 hours.
    pub fn day_interval() -> impl Strategy<Value = (u32, u32)> {
        (0u32..(24 * 60), 15u32..=(6 * 60))
    }

    /// A valid `(latitude, longitude)` pair in degrees.
    pub fn lat_lon() -> impl Strategy<Value = (f64, f64)> {
        (-90.0f64..=90.0, -180.0f64..=180.0)
    }

    /// A `(latitude, longitude)` pair kept away from the poles and the
    /// antimeridian, where nearby points stay nearby in degree space.
    pub fn mid_latitude_lat_lon() -> impl Strategy<Value = (f64, f64)> {
        (-60.0f64..=60.0, -170.0f64..=170.0)
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use recording_sink::RecordingSink;
pub use reducer_test::ReducerTest;
