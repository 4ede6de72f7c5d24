//! Configuration management for the booking engine.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::BookingError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;

/// Longest slot a deployment may allow: one week
pub const MAX_SLOT_HOURS: i64 = 7 * 24;

/// Longest proposal time-to-live a deployment may set: one year
pub const MAX_PROPOSAL_TTL_SECS: i64 = 366 * 24 * 60 * 60;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Calendar rules
    pub slots: SlotConfig,
    /// Booking lifecycle
    pub booking: BookingConfig,
    /// Discovery defaults
    pub discovery: DiscoveryConfig,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Calendar configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Longest allowed slot in hours (default: 24)
    pub max_slot_hours: i64,
}

/// Booking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfig {
    /// How long a proposal waits for an answer before it expires, in seconds (default: 7 days)
    pub proposal_ttl_secs: i64,
}

/// Discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Radius used when a caller has none, in kilometres (default: 50)
    pub default_radius_km: f64,
    /// Ceiling on a query's explicit limit (default: 100)
    pub max_results: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slots: SlotConfig { max_slot_hours: 24 },
            booking: BookingConfig {
                proposal_ttl_secs: 7 * 24 * 60 * 60,
            },
            discovery: DiscoveryConfig {
                default_radius_km: 50.0,
                max_results: 100,
            },
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Same keys and defaults as [`Config::from_env`].
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            slots: SlotConfig {
                max_slot_hours: lookup("GIGMATCH_MAX_SLOT_HOURS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.slots.max_slot_hours),
            },
            booking: BookingConfig {
                proposal_ttl_secs: lookup("GIGMATCH_PROPOSAL_TTL_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.booking.proposal_ttl_secs),
            },
            discovery: DiscoveryConfig {
                default_radius_km: lookup("GIGMATCH_DEFAULT_RADIUS_KM")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.discovery.default_radius_km),
                max_results: lookup("GIGMATCH_MAX_RESULTS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.discovery.max_results),
            },
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }

    /// Check that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRange`] naming the first setting that
    /// is non-positive, non-finite or above its ceiling
    /// ([`MAX_SLOT_HOURS`], [`MAX_PROPOSAL_TTL_SECS`]).
    pub fn validate(&self) -> Result<(), BookingError> {
        if !(1..=MAX_SLOT_HOURS).contains(&self.slots.max_slot_hours) {
            return Err(BookingError::InvalidRange(format!(
                "GIGMATCH_MAX_SLOT_HOURS must be between 1 and {MAX_SLOT_HOURS}, got {}",
                self.slots.max_slot_hours
            )));
        }
        if !(1..=MAX_PROPOSAL_TTL_SECS).contains(&self.booking.proposal_ttl_secs) {
            return Err(BookingError::InvalidRange(format!(
                "GIGMATCH_PROPOSAL_TTL_SECS must be between 1 and {MAX_PROPOSAL_TTL_SECS}, got {}",
                self.booking.proposal_ttl_secs
            )));
        }
        let radius = self.discovery.default_radius_km;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(BookingError::InvalidRange(format!(
                "GIGMATCH_DEFAULT_RADIUS_KM must be positive, got {}",
                self.discovery.default_radius_km
            )));
        }
        if self.discovery.max_results == 0 {
            return Err(BookingError::InvalidRange(
                "GIGMATCH_MAX_RESULTS must be positive, got 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Longest allowed slot, clamped to `1..=MAX_SLOT_HOURS`
    #[must_use]
    pub fn max_slot_duration(&self) -> Duration {
        Duration::hours(self.slots.max_slot_hours.clamp(1, MAX_SLOT_HOURS))
    }

    /// Proposal time-to-live, clamped to `1..=MAX_PROPOSAL_TTL_SECS`
    #[must_use]
    pub fn proposal_ttl(&self) -> Duration {
        Duration::seconds(self.booking.proposal_ttl_secs.clamp(1, MAX_PROPOSAL_TTL_SECS))
    }
}
