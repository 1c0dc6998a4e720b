//! Ring-buffer circuit breaker.
//!
//! A circuit breaker stops calling a dependency that keeps failing, gives it
//! time to recover, and then probes it carefully before letting traffic back.
//!
//! ## States
//! - **Closed**: every call is admitted. The outcome of each call is pushed into a
//!   ring buffer; once the buffer is full, a failure rate at or above the threshold
//!   opens the circuit.
//! - **Open**: calls are rejected without being attempted until the configured
//!   wait duration has elapsed.
//! - **Half-Open**: a limited number of trial calls are admitted. A successful trial
//!   closes the circuit with an empty buffer; a failed one reopens it.
//!
//! ## Usage
//!
//! The breaker is a cheap, cloneable handle around shared state, usable from
//! blocking code and from async tasks alike:
//!
//! ```
//! use resilient_http_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder()
//!         .name("inventory")
//!         .failure_rate_threshold(50.0)
//!         .ring_buffer_size_in_closed_state(4)
//!         .wait_duration_in_open_state(Duration::from_secs(10))
//!         .build(),
//! );
//!
//! for _ in 0..4 {
//!     let _ = breaker.execute(|| Err::<(), _>("connection refused"));
//! }
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let rejected = breaker.execute(|| Ok::<_, &str>("never runs")).unwrap_err();
//! assert!(rejected.is_circuit_open());
//! ```
//!
//! ## Manual permits
//!
//! When the call and its classification are separated, take a [`CallPermit`] and
//! record the outcome yourself. A permit dropped without an outcome gives its
//! half-open trial slot back, so cancelled calls never wedge the breaker.
//!
//! ```
//! use resilient_http_circuitbreaker::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::default();
//! match breaker.try_acquire() {
//!     Ok(permit) => {
//!         let status = 503;
//!         permit.record(status >= 500);
//!     }
//!     Err(rejected) => eprintln!("{rejected}"),
//! }
//! ```

use resilient_http_core::lock_unpoisoned;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

mod circuit;
mod config;
mod error;
mod events;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::{CallNotPermitted, CircuitBreakerError};
pub use events::CircuitBreakerEvent;

use circuit::{Circuit, Ticket};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Calls seen by the circuit breaker, by outcome (success, failure, rejected)"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state (0 = closed, 1 = open, 2 = half-open)"
        );
        describe_histogram!(
            "circuitbreaker_call_duration_seconds",
            "Duration of calls admitted by the circuit breaker"
        );
    });
}

/// A shared circuit breaker.
///
/// Clones share the same state machine. State reads through [`state`](Self::state)
/// never take the lock.
#[derive(Clone)]
pub struct CircuitBreaker {
    circuit: Arc<Mutex<Circuit>>,
    state: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let state = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let circuit = Circuit::new(&config, Arc::clone(&state), Instant::now());
        Self {
            circuit: Arc::new(Mutex::new(circuit)),
            state,
            config: Arc::new(config),
        }
    }

    /// Name of this breaker.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, read without locking.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns true if the breaker is rejecting calls.
    ///
    /// An open breaker whose wait has elapsed still reports open until the
    /// next call moves it to half-open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Snapshot of the ring buffer and counters.
    pub fn metrics(&self) -> CircuitMetrics {
        lock_unpoisoned(&self.circuit).metrics(Instant::now())
    }

    /// Asks for permission to make one call.
    pub fn try_acquire(&self) -> Result<CallPermit, CallNotPermitted> {
        let acquired = lock_unpoisoned(&self.circuit).try_acquire(&self.config, Instant::now());
        match acquired {
            Ok(ticket) => Ok(CallPermit {
                circuit: Arc::clone(&self.circuit),
                config: Arc::clone(&self.config),
                ticket: Some(ticket),
                started: Instant::now(),
            }),
            Err(state) => Err(CallNotPermitted {
                name: self.config.name.clone(),
                state,
            }),
        }
    }

    /// Runs `f` if permitted, counting an `Err` as a failure.
    pub fn execute<T, E, F>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.execute_with(Result::is_err, f)
    }

    /// Runs `f` if permitted; `is_failure` decides how the outcome is recorded.
    ///
    /// `is_failure` sees the full result, so an `Ok` value can still count as a
    /// failure (an HTTP 503, for example).
    pub fn execute_with<T, E, F, C>(&self, is_failure: C, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        C: FnOnce(&Result<T, E>) -> bool,
    {
        let permit = self.try_acquire()?;
        let result = f();
        permit.record(is_failure(&result));
        result.map_err(CircuitBreakerError::Inner)
    }

    /// Async counterpart of [`execute_with`](Self::execute_with).
    ///
    /// `f` is only invoked once a permit is held. If the returned future is
    /// dropped before completion, no outcome is recorded.
    pub async fn execute_async_with<T, E, F, Fut, C>(
        &self,
        is_failure: C,
        f: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnOnce(&Result<T, E>) -> bool,
    {
        let permit = self.try_acquire()?;
        let result = f().await;
        permit.record(is_failure(&result));
        result.map_err(CircuitBreakerError::Inner)
    }

    /// Returns the breaker to a fresh closed state.
    pub fn reset(&self) {
        lock_unpoisoned(&self.circuit).reset(&self.config, Instant::now());
    }

    /// Opens the breaker now; the wait duration starts over.
    pub fn force_open(&self) {
        lock_unpoisoned(&self.circuit).force_state(CircuitState::Open, &self.config, Instant::now());
    }

    /// Closes the breaker now with an empty ring buffer.
    pub fn force_closed(&self) {
        lock_unpoisoned(&self.circuit).force_state(
            CircuitState::Closed,
            &self.config,
            Instant::now(),
        );
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Permission to make exactly one call.
///
/// Consume it with [`record_success`](Self::record_success),
/// [`record_failure`](Self::record_failure) or [`record`](Self::record).
#[must_use = "dropping a permit releases it without recording an outcome"]
pub struct CallPermit {
    circuit: Arc<Mutex<Circuit>>,
    config: Arc<CircuitBreakerConfig>,
    ticket: Option<Ticket>,
    started: Instant,
}

impl CallPermit {
    /// State in which the call was admitted.
    pub fn state(&self) -> CircuitState {
        self.ticket
            .map(|ticket| ticket.state)
            .unwrap_or(CircuitState::Closed)
    }

    /// Records a successful call.
    pub fn record_success(self) {
        self.record(false);
    }

    /// Records a failed call.
    pub fn record_failure(self) {
        self.record(true);
    }

    /// Records the call outcome.
    pub fn record(mut self, failed: bool) {
        if let Some(ticket) = self.ticket.take() {
            let now = Instant::now();
            let elapsed = now.saturating_duration_since(self.started);
            lock_unpoisoned(&self.circuit).record(&self.config, ticket, failed, elapsed, now);
        }
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            lock_unpoisoned(&self.circuit).release(ticket);
        }
    }
}

impl std::fmt::Debug for CallPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallPermit")
            .field("circuitbreaker", &self.config.name)
            .field("state", &self.state())
            .finish()
    }
}
