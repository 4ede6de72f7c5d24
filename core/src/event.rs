//! Event naming and delivery to external collaborators.
//!
//! Reducers emit plain Rust enums. This module gives those enums a stable
//! name ([`Event::event_type`]) and defines the [`EventSink`] seam through
//! which applied events leave the engine.
//!
//! # Example
//!
//! ```
//! use gigmatch_core::event::{Event, EventSink, NoopSink};
//!
//! #[derive(Clone, Debug)]
//! enum OrderEvent {
//!     OrderPlaced { order_id: String },
//!     OrderShipped { order_id: String },
//! }
//!
//! impl Event for OrderEvent {
//!     fn event_type(&self) -> &'static str {
//!         match self {
//!             OrderEvent::OrderPlaced { .. } => "OrderPlaced.v1",
//!             OrderEvent::OrderShipped { .. } => "OrderShipped.v1",
//!         }
//!     }
//! }
//!
//! let sink = NoopSink;
//! sink.publish(&OrderEvent::OrderPlaced { order_id: "o-1".into() });
//! ```

use std::fmt;

/// A domain event with a stable, versioned name.
pub trait Event: fmt::Debug + Send + Sync {
    /// Versioned event name, e.g. `"SlotAdded.v1"`.
    fn event_type(&self) -> &'static str;
}

/// Receives every event after it has been applied to aggregate state.
///
/// Implementations must be cheap and must not call back into the engine:
/// they are invoked while the emitting aggregate still holds its lock.
pub trait EventSink<E: Event>: Send + Sync {
    /// Deliver one applied event.
    fn publish(&self, event: &E);
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl<E: Event> EventSink<E> for NoopSink {
    fn publish(&self, _event: &E) {}
}

/// Sink that forwards each event to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl<E: Event> EventSink<E> for TracingSink {
    fn publish(&self, event: &E) {
        tracing::debug!(event_type = event.event_type(), ?event, "event published");
    }
}
