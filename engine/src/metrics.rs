//! Engine metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding application.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `gigmatch_slot_operations_total{op}` - Slot mutations by operation
//! - `gigmatch_rejected_commands_total{kind}` - Commands rejected by error kind
//! - `gigmatch_booking_transitions_total{status}` - Booking transitions by resulting status
//! - `gigmatch_confirm_races_lost_total` - Confirms that found the slot already taken
//! - `gigmatch_discovery_queries_total` - Discovery queries served
//!
//! ## Gauges
//! - `gigmatch_pending_bookings` - Proposals awaiting an answer
//!
//! ## Histograms
//! - `gigmatch_discovery_candidates` - Profiles inside the bounding box per query
//! - `gigmatch_discovery_results` - Matches returned per query

use crate::error::BookingError;
use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all metric descriptions.
///
/// Call once at startup, before any metrics are recorded.
pub fn register_engine_metrics() {
    describe_counter!(
        "gigmatch_slot_operations_total",
        "Slot mutations by operation (add, remove, reschedule, book, release)"
    );
    describe_counter!(
        "gigmatch_rejected_commands_total",
        "Commands rejected by error kind"
    );

    describe_counter!(
        "gigmatch_booking_transitions_total",
        "Booking transitions by resulting status (proposed, confirmed, declined, cancelled)"
    );
    describe_counter!(
        "gigmatch_confirm_races_lost_total",
        "Confirm attempts that found the slot already booked"
    );
    describe_gauge!(
        "gigmatch_pending_bookings",
        "Booking requests currently awaiting an answer"
    );

    describe_counter!(
        "gigmatch_discovery_queries_total",
        "Discovery queries served"
    );
    describe_histogram!(
        "gigmatch_discovery_candidates",
        "Profiles passing the bounding-box prefilter per query"
    );
    describe_histogram!(
        "gigmatch_discovery_results",
        "Matches returned per query"
    );

    tracing::info!("Engine metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record an applied slot mutation.
///
/// # Arguments
///
/// * `op` - Operation label (see [`crate::aggregates::SlotEvent::operation`])
pub fn record_slot_operation(op: &'static str) {
    metrics::counter!("gigmatch_slot_operations_total", "op" => op).increment(1);
}

/// Record a rejected command.
pub fn record_rejection(error: &BookingError) {
    metrics::counter!("gigmatch_rejected_commands_total", "kind" => error.kind().code())
        .increment(1);
}

/// Record a booking reaching `status`.
///
/// # Arguments
///
/// * `status` - New status name
/// * `was_pending` - Whether the booking left `Proposed` with this transition
pub fn record_booking_transition(status: &'static str, was_pending: bool) {
    metrics::counter!("gigmatch_booking_transitions_total", "status" => status).increment(1);
    if status == "proposed" {
        metrics::gauge!("gigmatch_pending_bookings").increment(1.0);
    } else if was_pending {
        metrics::gauge!("gigmatch_pending_bookings").decrement(1.0);
    }
}

/// Record a confirm that lost the race for its slot.
pub fn record_confirm_race_lost() {
    metrics::counter!("gigmatch_confirm_races_lost_total").increment(1);
    tracing::debug!("Recorded confirm_race_lost metric");
}

/// Record a served discovery query.
///
/// # Arguments
///
/// * `candidates` - Profiles that passed the bounding-box prefilter
/// * `results` - Matches returned to the caller
#[allow(clippy::cast_precision_loss)] // Counts far below 2^52
pub fn record_discovery(candidates: usize, results: usize) {
    metrics::counter!("gigmatch_discovery_queries_total").increment(1);
    metrics::histogram!("gigmatch_discovery_candidates").record(candidates as f64);
    metrics::histogram!("gigmatch_discovery_results").record(results as f64);
}
