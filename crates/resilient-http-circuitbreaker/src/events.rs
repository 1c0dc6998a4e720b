use crate::CircuitState;
use resilient_http_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved between states.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was admitted.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was refused without being attempted.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A permitted call finished successfully.
    SuccessRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
    },
    /// A permitted call finished with a failure.
    FailureRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
    },
    /// The breaker was reset to a fresh closed state.
    Reset {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::Reset { .. } => "reset",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::Reset { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { pattern_name, .. }
            | CircuitBreakerEvent::CallPermitted { pattern_name, .. }
            | CircuitBreakerEvent::CallRejected { pattern_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { pattern_name, .. }
            | CircuitBreakerEvent::FailureRecorded { pattern_name, .. }
            | CircuitBreakerEvent::Reset { pattern_name, .. } => pattern_name,
        }
    }
}
