use resilient_http_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Events emitted by a [`Retry`](crate::Retry).
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// Attempt number `attempt` produced a retryable outcome; the next one
    /// starts after `delay`.
    Retry {
        pattern_name: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// A non-retryable success ended the call.
    Success {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// Every attempt was used and the last outcome was still retryable.
    Exhausted {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// An error the predicates do not retry ended the call.
    Ignored {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::Ignored { .. } => "ignored",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::Ignored { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RetryEvent::Retry { pattern_name, .. }
            | RetryEvent::Success { pattern_name, .. }
            | RetryEvent::Exhausted { pattern_name, .. }
            | RetryEvent::Ignored { pattern_name, .. } => pattern_name,
        }
    }
}
