//! Application wiring.
//!
//! [`GigmatchBuilder`] assembles the slot store, projector, coordinator and
//! matcher around one shared clock and event sink.
//!
//! # Example
//!
//! ```rust,ignore
//! let app = Gigmatch::builder()
//!     .with_config(Config::from_env())
//!     .with_profiles(profiles)
//!     .build()?;
//!
//! let slot = app.slots.add_slot(dj, date, start, end)?;
//! let request = app.bookings.propose(requester, dj, slot, price, "Launch party")?;
//! app.bookings.confirm(request.id, Actor::Dj(dj))?;
//! ```

use crate::aggregates::{BookingEnvironment, DelegatePolicy, NoDelegates, SlotsEnvironment};
use crate::config::Config;
use crate::coordinator::BookingCoordinator;
use crate::discovery::{DiscoveryMatcher, InMemoryProfiles, ProfileSource};
use crate::error::Result;
use crate::events::EngineEvent;
use crate::projections::AvailabilityProjector;
use crate::store::SlotStore;
use gigmatch_core::environment::{Clock, SystemClock};
use gigmatch_core::event::{EventSink, TracingSink};
use std::sync::Arc;

/// The assembled engine
pub struct Gigmatch {
    /// DJ calendars
    pub slots: Arc<SlotStore>,
    /// Day and slot status
    pub availability: AvailabilityProjector,
    /// Booking lifecycle
    pub bookings: BookingCoordinator,
    /// Nearby DJ search
    pub discovery: DiscoveryMatcher,
    config: Config,
}

impl Gigmatch {
    /// Starts building an engine
    #[must_use]
    pub fn builder() -> GigmatchBuilder {
        GigmatchBuilder::new()
    }

    /// The configuration the engine was built with
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}

/// Builder for [`Gigmatch`].
///
/// Every collaborator has a default: system clock, no delegates, an empty
/// in-memory profile source and a sink that logs events at debug level.
pub struct GigmatchBuilder {
    config: Config,
    clock: Arc<dyn Clock>,
    delegates: Arc<dyn DelegatePolicy>,
    profiles: Arc<dyn ProfileSource>,
    sink: Arc<dyn EventSink<EngineEvent>>,
}

impl Default for GigmatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GigmatchBuilder {
    /// Builder with default collaborators and [`Config::default`]
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            clock: Arc::new(SystemClock),
            delegates: Arc::new(NoDelegates),
            profiles: Arc::new(InMemoryProfiles::new()),
            sink: Arc::new(TracingSink),
        }
    }

    /// Use `config`
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Use `clock` for all timestamps
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use `delegates` to authorize users acting for DJs
    #[must_use]
    pub fn with_delegates(mut self, delegates: Arc<dyn DelegatePolicy>) -> Self {
        self.delegates = delegates;
        self
    }

    /// Read DJ profiles from `profiles`
    #[must_use]
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileSource>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Publish every applied event to `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink<EngineEvent>>) -> Self {
        self.sink = sink;
        self
    }

    /// Validates the configuration and wires the engine.
    ///
    /// # Errors
    ///
    /// Returns [`crate::BookingError::InvalidRange`] if the configuration
    /// is invalid.
    pub fn build(self) -> Result<Gigmatch> {
        self.config.validate()?;

        let slots = Arc::new(SlotStore::new(
            SlotsEnvironment::new(self.clock.clone(), self.config.max_slot_duration()),
            self.sink.clone(),
        ));
        let availability = AvailabilityProjector::new(slots.clone());
        let bookings = BookingCoordinator::new(
            slots.clone(),
            BookingEnvironment::new(self.clock, self.delegates, self.config.proposal_ttl()),
            self.sink,
        );
        let discovery = DiscoveryMatcher::new(
            self.profiles,
            availability.clone(),
            self.config.discovery.default_radius_km,
            self.config.discovery.max_results,
        );

        tracing::info!(
            max_slot_hours = self.config.slots.max_slot_hours,
            proposal_ttl_secs = self.config.booking.proposal_ttl_secs,
            "Gigmatch engine ready"
        );

        Ok(Gigmatch {
            slots,
            availability,
            bookings,
            discovery,
            config: self.config,
        })
    }
}
