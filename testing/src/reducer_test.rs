//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use gigmatch_core::reducer::Reducer;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for outcome assertion functions
type OutcomeAssertion<Ev, Er> = Box<dyn FnOnce(&Result<Vec<Ev>, Er>)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use gigmatch_testing::ReducerTest;
///
/// ReducerTest::new(SlotsReducer::new())
///     .with_env(test_environment())
///     .given_state(CalendarState::new(dj_id))
///     .when_command(SlotCommand::AddSlot { .. })
///     .then_events(|events| {
///         assert_eq!(events.len(), 1);
///     })
///     .then_state(|state| {
///         assert_eq!(state.slot_count(), 1);
///     })
///     .run();
/// ```
pub struct ReducerTest<R>
where
    R: Reducer,
{
    reducer: R,
    environment: Option<R::Environment>,
    initial_state: Option<R::State>,
    command: Option<R::Command>,
    state_assertions: Vec<StateAssertion<R::State>>,
    outcome_assertions: Vec<OutcomeAssertion<R::Event, R::Error>>,
}

impl<R> ReducerTest<R>
where
    R: Reducer,
    R::Event: std::fmt::Debug + 'static,
    R::Error: std::fmt::Debug + 'static,
    R::State: 'static,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            command: None,
            state_assertions: Vec::new(),
            outcome_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the command to test (When)
    #[must_use]
    pub fn when_command(mut self, command: R::Command) -> Self {
        self.command = Some(command);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Assert the command was accepted and inspect the emitted events (Then)
    #[must_use]
    #[allow(clippy::panic)] // Test assertion
    pub fn then_events<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[R::Event]) + 'static,
    {
        self.outcome_assertions.push(Box::new(move |outcome| match outcome {
            Ok(events) => assertion(events),
            Err(error) => panic!("Expected events, but the command was rejected: {error:?}"),
        }));
        self
    }

    /// Assert the command was rejected and inspect the error (Then)
    #[must_use]
    #[allow(clippy::panic)] // Test assertion
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::Error) + 'static,
    {
        self.outcome_assertions.push(Box::new(move |outcome| match outcome {
            Ok(events) => panic!("Expected a rejection, but got events: {events:?}"),
            Err(error) => assertion(error),
        }));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, command, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let command = self.command.expect("Command must be set with when_command()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        // Execute reducer
        let outcome = self
            .reducer
            .reduce(&mut state, command, &env)
            .map(smallvec::SmallVec::into_vec);

        // Run outcome assertions
        for assertion in self.outcome_assertions {
            assertion(&outcome);
        }

        // Run state assertions
        for assertion in self.state_assertions {
            assertion(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gigmatch_core::{smallvec, SmallVec};

    #[derive(Clone, Debug)]
    struct TestState {
        count: i32,
    }

    #[derive(Clone, Debug)]
    enum TestCommand {
        Increment,
        Decrement,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum TestEvent {
        Changed(i32),
    }

    struct TestReducer;

    struct TestEnv;

    impl Reducer for TestReducer {
        type State = TestState;
        type Command = TestCommand;
        type Event = TestEvent;
        type Error = String;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            command: Self::Command,
            _env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Event; 4]>, Self::Error> {
            let event = match command {
                TestCommand::Increment => TestEvent::Changed(1),
                TestCommand::Decrement if state.count == 0 => {
                    return Err("already at zero".to_string());
                }
                TestCommand::Decrement => TestEvent::Changed(-1),
            };
            Self::apply(state, &event);
            Ok(smallvec![event])
        }

        fn apply(state: &mut Self::State, event: &Self::Event) {
            let TestEvent::Changed(delta) = event;
            state.count += delta;
        }
    }

    #[test]
    fn test_reducer_test_increment() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_command(TestCommand::Increment)
            .then_state(|state| {
                assert_eq!(state.count, 1);
            })
            .then_events(|events| {
                assert_eq!(events, [TestEvent::Changed(1)]);
            })
            .run();
    }

    #[test]
    fn test_reducer_test_rejection() {
        ReducerTest::new(TestReducer)
            .with_env(TestEnv)
            .given_state(TestState { count: 0 })
            .when_command(TestCommand::Decrement)
            .then_error(|error| {
                assert_eq!(error, "already at zero");
            })
            .then_state(|state| {
                assert_eq!(state.count, 0);
            })
            .run();
    }
}
