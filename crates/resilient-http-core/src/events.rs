//! Event types and listener collections.
//!
//! Listeners run synchronously on the thread that produced the event, while
//! the pattern may still hold its internal lock. Keep them short.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// An observable occurrence inside a resilience pattern.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short machine-readable kind, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When the event was produced.
    fn timestamp(&self) -> Instant;

    /// Name of the breaker or retry instance that produced the event.
    fn pattern_name(&self) -> &str;
}

/// Receives events of one pattern.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Handles a single event.
    fn on_event(&self, event: &E);
}

/// An ordered set of listeners for one event type.
///
/// Cloning is cheap; the listeners themselves are shared.
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener. Listeners are invoked in registration order.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers a plain closure as a listener.
    pub fn add_fn<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
        E: 'static,
    {
        self.add(FnListener::new(f));
    }

    /// Delivers `event` to every listener.
    ///
    /// A panicking listener is isolated: the panic is swallowed and the
    /// remaining listeners still see the event.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if outcome.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    pattern = event.pattern_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F> {
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
