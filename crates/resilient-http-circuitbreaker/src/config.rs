use crate::events::CircuitBreakerEvent;
use crate::CircuitState;
use resilient_http_core::EventListeners;
use std::time::Duration;

/// Configuration for a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// Defaults: 50% failure rate threshold over a ring buffer of 5 calls,
/// 10 seconds in the open state, one trial call while half-open.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) failure_rate_threshold: f64,
    pub(crate) ring_buffer_size_in_closed_state: usize,
    pub(crate) wait_duration_in_open_state: Duration,
    pub(crate) permitted_calls_in_half_open_state: usize,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();
        CircuitBreakerConfigBuilder::new()
    }

    /// Failure rate, in percent, at which the breaker opens.
    pub fn failure_rate_threshold(&self) -> f64 {
        self.failure_rate_threshold
    }

    /// Number of outcomes kept while closed.
    pub fn ring_buffer_size_in_closed_state(&self) -> usize {
        self.ring_buffer_size_in_closed_state
    }

    /// How long the breaker stays open before admitting a trial call.
    pub fn wait_duration_in_open_state(&self) -> Duration {
        self.wait_duration_in_open_state
    }

    /// Number of trial calls admitted while half-open.
    pub fn permitted_calls_in_half_open_state(&self) -> usize {
        self.permitted_calls_in_half_open_state
    }

    /// Name used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig::builder().build()
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    failure_rate_threshold: f64,
    ring_buffer_size_in_closed_state: usize,
    wait_duration_in_open_state: Duration,
    permitted_calls_in_half_open_state: usize,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            ring_buffer_size_in_closed_state: 5,
            wait_duration_in_open_state: Duration::from_secs(10),
            permitted_calls_in_half_open_state: 1,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the failure rate, in percent, at which the breaker opens.
    ///
    /// The rate is only evaluated once the ring buffer is full.
    ///
    /// Default: 50.0
    pub fn failure_rate_threshold(mut self, percent: f64) -> Self {
        self.failure_rate_threshold = percent;
        self
    }

    /// Sets how many call outcomes the closed state remembers.
    ///
    /// Default: 5
    pub fn ring_buffer_size_in_closed_state(mut self, size: usize) -> Self {
        self.ring_buffer_size_in_closed_state = size;
        self
    }

    /// Sets how long the breaker rejects calls after opening.
    ///
    /// Default: 10 seconds
    pub fn wait_duration_in_open_state(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open_state = duration;
        self
    }

    /// Sets how many trial calls the half-open state admits.
    ///
    /// Every trial must succeed for the breaker to close; one failing trial
    /// reopens it.
    ///
    /// Default: 1
    pub fn permitted_calls_in_half_open_state(mut self, n: usize) -> Self {
        self.permitted_calls_in_half_open_state = n;
        self
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked with `(from, to)` on every state change.
    ///
    /// ```
    /// use resilient_http_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let config = CircuitBreakerConfig::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("breaker opened (was {from:?})");
    ///         }
    ///     })
    ///     .build();
    /// # let _ = config;
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        });
        self
    }

    /// Registers a callback invoked with the current state when a call is admitted.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Registers a callback invoked when a call is refused.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::CallRejected { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Registers a callback invoked with the call duration after a success.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::SuccessRecorded { duration, .. } = event {
                f(*duration);
            }
        });
        self
    }

    /// Registers a callback invoked with the call duration after a failure.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::FailureRecorded { duration, .. } = event {
                f(*duration);
            }
        });
        self
    }

    /// Registers a listener that receives every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Builds the configuration.
    ///
    /// # Panics
    ///
    /// Panics if the failure rate threshold is outside `0.0..=100.0`, or if the
    /// ring buffer size or the number of half-open trial calls is zero.
    pub fn build(self) -> CircuitBreakerConfig {
        assert!(
            (0.0..=100.0).contains(&self.failure_rate_threshold),
            "failure_rate_threshold must be between 0 and 100, got {}",
            self.failure_rate_threshold
        );
        assert!(
            self.ring_buffer_size_in_closed_state > 0,
            "ring_buffer_size_in_closed_state must be at least 1"
        );
        assert!(
            self.permitted_calls_in_half_open_state > 0,
            "permitted_calls_in_half_open_state must be at least 1"
        );

        CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            ring_buffer_size_in_closed_state: self.ring_buffer_size_in_closed_state,
            wait_duration_in_open_state: self.wait_duration_in_open_state,
            permitted_calls_in_half_open_state: self.permitted_calls_in_half_open_state,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
