//! Shared infrastructure for the resilient-http crates.
//!
//! Every resilience pattern in the workspace reports what it does through the
//! same event system: a pattern defines an event enum implementing
//! [`ResilienceEvent`], and its configuration carries an [`EventListeners`]
//! collection that user callbacks are registered into.

pub mod events;
pub mod sync;

pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use sync::lock_unpoisoned;
