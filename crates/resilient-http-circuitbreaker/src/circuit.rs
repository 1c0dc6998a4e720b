use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow through and outcomes fill the ring buffer.
    Closed = 0,
    /// Calls are rejected until the wait duration elapses.
    Open = 1,
    /// A limited number of trial calls decide whether to close or reopen.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    #[cfg(any(feature = "metrics", feature = "tracing"))]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CircuitMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Outcomes currently held in the ring buffer.
    pub buffered_calls: usize,
    /// Failed outcomes in the ring buffer.
    pub failed_calls: usize,
    /// Capacity of the ring buffer.
    pub ring_buffer_size: usize,
    /// Failure rate in percent, `None` until the ring buffer is full.
    pub failure_rate: Option<f64>,
    /// Calls refused since the breaker was created.
    pub not_permitted_calls: u64,
    /// Time spent in the current state.
    pub time_since_state_change: Duration,
}

/// Fixed-capacity record of the most recent call outcomes.
#[derive(Debug)]
struct OutcomeRing {
    outcomes: VecDeque<bool>,
    failures: usize,
    capacity: usize,
}

impl OutcomeRing {
    fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            failures: 0,
            capacity,
        }
    }

    fn push(&mut self, failed: bool) {
        if self.outcomes.len() == self.capacity && self.outcomes.pop_front() == Some(true) {
            self.failures -= 1;
        }
        self.outcomes.push_back(failed);
        if failed {
            self.failures += 1;
        }
    }

    fn is_full(&self) -> bool {
        self.outcomes.len() == self.capacity
    }

    fn failure_rate(&self) -> Option<f64> {
        self.is_full()
            .then(|| self.failures as f64 / self.capacity as f64 * 100.0)
    }

    fn clear(&mut self) {
        self.outcomes.clear();
        self.failures = 0;
    }
}

/// Admission handed out by [`Circuit::try_acquire`].
///
/// Carries the generation it was issued in; outcomes reported for an older
/// generation are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    generation: u64,
    pub(crate) state: CircuitState,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    generation: u64,
    ring: OutcomeRing,
    half_open_issued: usize,
    half_open_successes: usize,
    not_permitted: u64,
}

impl Circuit {
    pub(crate) fn new(
        config: &CircuitBreakerConfig,
        state_atomic: Arc<AtomicU8>,
        now: Instant,
    ) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: now,
            generation: 0,
            ring: OutcomeRing::new(config.ring_buffer_size_in_closed_state),
            half_open_issued: 0,
            half_open_successes: 0,
            not_permitted: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn metrics(&self, now: Instant) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            buffered_calls: self.ring.outcomes.len(),
            failed_calls: self.ring.failures,
            ring_buffer_size: self.ring.capacity,
            failure_rate: self.ring.failure_rate(),
            not_permitted_calls: self.not_permitted,
            time_since_state_change: now.saturating_duration_since(self.last_state_change),
        }
    }

    /// Decides whether a call may start at `now`.
    ///
    /// An open circuit whose wait has elapsed moves to half-open here, so the
    /// caller that observes the expiry becomes the first trial call.
    pub(crate) fn try_acquire(
        &mut self,
        config: &CircuitBreakerConfig,
        now: Instant,
    ) -> Result<Ticket, CircuitState> {
        if self.state == CircuitState::Open
            && now.saturating_duration_since(self.last_state_change)
                >= config.wait_duration_in_open_state
        {
            self.transition_to(CircuitState::HalfOpen, config, now);
        }

        let permitted = match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if self.half_open_issued < config.permitted_calls_in_half_open_state {
                    self.half_open_issued += 1;
                    true
                } else {
                    false
                }
            }
        };

        if permitted {
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallPermitted {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                    state: self.state,
                });
            Ok(Ticket {
                generation: self.generation,
                state: self.state,
            })
        } else {
            self.not_permitted += 1;
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallRejected {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                    state: self.state,
                });

            #[cfg(feature = "tracing")]
            tracing::debug!(
                circuitbreaker = %config.name,
                state = self.state.as_str(),
                "call not permitted"
            );

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);

            Err(self.state)
        }
    }

    /// Feeds the outcome of a permitted call back into the state machine.
    pub(crate) fn record(
        &mut self,
        config: &CircuitBreakerConfig,
        ticket: Ticket,
        failed: bool,
        duration: Duration,
        now: Instant,
    ) {
        if ticket.generation != self.generation {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                circuitbreaker = %config.name,
                "discarding outcome from a previous state"
            );
            return;
        }

        let event = if failed {
            CircuitBreakerEvent::FailureRecorded {
                pattern_name: config.name.clone(),
                timestamp: now,
                state: self.state,
                duration,
            }
        } else {
            CircuitBreakerEvent::SuccessRecorded {
                pattern_name: config.name.clone(),
                timestamp: now,
                state: self.state,
                duration,
            }
        };
        config.event_listeners.emit(&event);

        #[cfg(feature = "metrics")]
        {
            let outcome = if failed { "failure" } else { "success" };
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => outcome).increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => config.name.clone())
                .record(duration.as_secs_f64());
        }

        match self.state {
            CircuitState::Closed => {
                self.ring.push(failed);
                if let Some(rate) = self.ring.failure_rate() {
                    if rate >= config.failure_rate_threshold {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            circuitbreaker = %config.name,
                            failure_rate = rate,
                            threshold = config.failure_rate_threshold,
                            "failure rate exceeded threshold"
                        );
                        self.transition_to(CircuitState::Open, config, now);
                    }
                }
            }
            CircuitState::HalfOpen => {
                if failed {
                    self.transition_to(CircuitState::Open, config, now);
                } else {
                    self.half_open_successes += 1;
                    if self.half_open_successes >= config.permitted_calls_in_half_open_state {
                        self.transition_to(CircuitState::Closed, config, now);
                    }
                }
            }
            // Open issues no tickets for its own generation.
            CircuitState::Open => {}
        }
    }

    /// Returns a trial slot taken by a call that ended without an outcome.
    pub(crate) fn release(&mut self, ticket: Ticket) {
        if ticket.generation == self.generation
            && self.state == CircuitState::HalfOpen
            && self.half_open_issued > self.half_open_successes
        {
            self.half_open_issued -= 1;
        }
    }

    pub(crate) fn force_state(
        &mut self,
        state: CircuitState,
        config: &CircuitBreakerConfig,
        now: Instant,
    ) {
        if self.state == state {
            self.start_generation(now);
        } else {
            self.transition_to(state, config, now);
        }
    }

    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig, now: Instant) {
        self.transition_to(CircuitState::Closed, config, now);
        self.start_generation(now);
        config.event_listeners.emit(&CircuitBreakerEvent::Reset {
            pattern_name: config.name.clone(),
            timestamp: now,
        });
    }

    fn transition_to(&mut self, to: CircuitState, config: &CircuitBreakerConfig, now: Instant) {
        if self.state == to {
            return;
        }

        let from = self.state;
        self.state = to;
        self.state_atomic.store(to as u8, Ordering::Release);
        self.start_generation(now);

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                pattern_name: config.name.clone(),
                timestamp: now,
                from_state: from,
                to_state: to,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            circuitbreaker = %config.name,
            from = from.as_str(),
            to = to.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(to as u8 as f64);
        }
    }

    fn start_generation(&mut self, now: Instant) {
        self.generation += 1;
        self.last_state_change = now;
        self.ring.clear();
        self.half_open_issued = 0;
        self.half_open_successes = 0;
    }
}
