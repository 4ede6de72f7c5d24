//! # Gigmatch Core
//!
//! Core traits and types shared by the gigmatch booking engine.
//!
//! The engine is built from synchronous reducers: every aggregate receives a
//! command, validates it against its current state, and answers with the
//! events that describe what changed. The same events are then applied to
//! the state and handed to an [`event::EventSink`] so external collaborators
//! (notifications, persistence) can follow along.
//!
//! ## Core Concepts
//!
//! - **State**: Domain state owned by one aggregate instance
//! - **Command**: A request to change state
//! - **Event**: A fact about a change that already happened
//! - **Reducer**: `(State, Command, Environment) → Result<Events, Error>`
//! - **Environment**: Injected dependencies via traits
//!
//! ## Example
//!
//! ```ignore
//! use gigmatch_core::{reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Command = CounterCommand;
//!     type Event = CounterEvent;
//!     type Error = CounterError;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         command: CounterCommand,
//!         _env: &(),
//!     ) -> Result<SmallVec<[CounterEvent; 4]>, CounterError> {
//!         let event = CounterEvent::Incremented { by: 1 };
//!         Self::apply(state, &event);
//!         Ok(smallvec![event])
//!     }
//!
//!     fn apply(state: &mut CounterState, event: &CounterEvent) {
//!         match event {
//!             CounterEvent::Incremented { by } => state.count += by,
//!         }
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

pub mod event;

/// Reducer module - The core trait for business logic
///
/// Reducers are deterministic: given the same state, command and environment
/// they produce the same events. Validation failures are returned as errors
/// and leave the state untouched.
pub mod reducer {
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Command`: The requests this reducer accepts
    /// - `Event`: The facts this reducer emits
    /// - `Error`: Why a command was rejected
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The command type this reducer processes
        type Command;

        /// The event type this reducer emits
        type Event;

        /// The rejection type for invalid commands
        type Error;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce a command into state changes and events
        ///
        /// This is a pure function that:
        /// 1. Validates the command against the current state
        /// 2. Applies the resulting events to the state
        /// 3. Returns the applied events
        ///
        /// # Errors
        ///
        /// Returns the reducer's error type when the command is invalid for
        /// the current state. The state is not modified in that case.
        fn reduce(
            &self,
            state: &mut Self::State,
            command: Self::Command,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Event; 4]>, Self::Error>;

        /// Apply a single event to the state
        ///
        /// Must never fail: events describe changes that were already
        /// validated when they were produced.
        fn apply(state: &mut Self::State, event: &Self::Event);
    }

    /// Rebuild state by applying previously emitted events in order.
    pub fn replay<'a, R, I>(state: &mut R::State, events: I)
    where
        R: Reducer,
        R::Event: 'a,
        I: IntoIterator<Item = &'a R::Event>,
    {
        for event in events {
            R::apply(state, event);
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    /// let now = clock.now();
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = FixedClock::new(time);
    /// assert_eq!(clock.now(), time);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock backed by [`Utc::now`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
