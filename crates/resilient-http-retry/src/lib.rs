//! Retry policy for blocking and async callers.
//!
//! A [`Retry`] looks at the outcome of each attempt and decides whether to
//! return it or to try again after a delay. The decision is made by
//! [`Retry::decide`]; [`Retry::call`] and [`Retry::call_async`] are thin loops
//! around it that sleep on the current thread or on the tokio timer.
//!
//! ```
//! use resilient_http_retry::{Retry, RetryConfig};
//! use std::cell::Cell;
//!
//! let retry = Retry::new(
//!     RetryConfig::<u16, std::io::Error>::builder()
//!         .max_attempts(3)
//!         .retry_on_result(|status| *status >= 500)
//!         .build(),
//! );
//!
//! let statuses = [503, 502, 200];
//! let attempt = Cell::new(0);
//! let status = retry.call(|| {
//!     let status = statuses[attempt.get()];
//!     attempt.set(attempt.get() + 1);
//!     Ok(status)
//! });
//! assert_eq!(status.unwrap(), 200);
//! assert_eq!(attempt.get(), 3);
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod backoff;
mod config;
mod events;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
    NoBackoff,
};
pub use config::{Predicate, RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;

#[cfg(feature = "metrics")]
use metrics::counter;

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    use metrics::describe_counter;

    METRICS_INIT.call_once(|| {
        describe_counter!(
            "retry_calls_total",
            "Calls completed by the retry policy, by result (success, exhausted, ignored)"
        );
        describe_counter!(
            "retry_attempts_total",
            "Retries scheduled by the retry policy"
        );
    });
}

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Hand the outcome back to the caller.
    Return,
    /// Discard the outcome and attempt again after the delay.
    RetryAfter(Duration),
}

/// A retry policy over outcomes `Result<T, E>`.
///
/// Cheap to clone; clones share configuration. A `Retry` holds no per-call
/// state, so one instance serves any number of concurrent calls.
pub struct Retry<T, E> {
    config: Arc<RetryConfig<T, E>>,
}

impl<T, E> Retry<T, E> {
    /// Creates a retry policy from `config`.
    pub fn new(config: RetryConfig<T, E>) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Configuration this policy was built with.
    pub fn config(&self) -> &RetryConfig<T, E> {
        &self.config
    }

    /// Decides what follows attempt number `attempts` (1 for the first).
    ///
    /// Emits the matching [`RetryEvent`].
    pub fn decide(&self, outcome: &Result<T, E>, attempts: usize) -> RetryDecision {
        let config = &*self.config;
        let now = Instant::now();

        if !config.should_retry(outcome) {
            let event = match outcome {
                Ok(_) => RetryEvent::Success {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                    attempts,
                },
                Err(_) => RetryEvent::Ignored {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                    attempts,
                },
            };
            config.event_listeners.emit(&event);

            #[cfg(feature = "metrics")]
            {
                let result = if outcome.is_ok() { "success" } else { "ignored" };
                counter!("retry_calls_total", "retry" => config.name.clone(), "result" => result)
                    .increment(1);
            }

            return RetryDecision::Return;
        }

        if attempts >= config.max_attempts {
            config.event_listeners.emit(&RetryEvent::Exhausted {
                pattern_name: config.name.clone(),
                timestamp: now,
                attempts,
            });

            #[cfg(feature = "tracing")]
            tracing::warn!(retry = %config.name, attempts, "retries exhausted");

            #[cfg(feature = "metrics")]
            counter!("retry_calls_total", "retry" => config.name.clone(), "result" => "exhausted")
                .increment(1);

            return RetryDecision::Return;
        }

        let delay = config.interval.next_interval(attempts - 1);
        config.event_listeners.emit(&RetryEvent::Retry {
            pattern_name: config.name.clone(),
            timestamp: now,
            attempt: attempts,
            delay,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(retry = %config.name, attempt = attempts, ?delay, "retrying");

        #[cfg(feature = "metrics")]
        counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

        RetryDecision::RetryAfter(delay)
    }

    /// Runs `f` until the policy returns, sleeping on the current thread
    /// between attempts.
    pub fn call<F>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = f();
            match self.decide(&outcome, attempts) {
                RetryDecision::Return => return outcome,
                RetryDecision::RetryAfter(delay) => {
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }

    /// Runs the futures produced by `f` until the policy returns, waiting on
    /// the tokio timer between attempts.
    ///
    /// Dropping the returned future abandons any pending retry.
    pub async fn call_async<F, Fut>(&self, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = f().await;
            match self.decide(&outcome, attempts) {
                RetryDecision::Return => return outcome,
                RetryDecision::RetryAfter(delay) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

impl<T, E> Clone for Retry<T, E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<T, E> std::fmt::Debug for Retry<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retry")
            .field("name", &self.config.name)
            .field("max_attempts", &self.config.max_attempts)
            .finish()
    }
}

impl<T, E> Default for Retry<T, E> {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
