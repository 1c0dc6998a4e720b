use crate::backoff::{ExponentialBackoff, FixedInterval, IntervalFunction, NoBackoff};
use crate::events::RetryEvent;
use resilient_http_core::EventListeners;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Shared predicate over one side of an outcome.
pub type Predicate<V> = Arc<dyn Fn(&V) -> bool + Send + Sync>;

/// Configuration for a [`Retry`](crate::Retry) over outcomes `Result<T, E>`.
///
/// An outcome is retried when the error predicate accepts its error or the
/// result predicate accepts its value. Without an error predicate every
/// error is retried; without a result predicate no value is.
pub struct RetryConfig<T, E> {
    pub(crate) max_attempts: usize,
    pub(crate) interval: Arc<dyn IntervalFunction>,
    pub(crate) retry_on_error: Option<Predicate<E>>,
    pub(crate) retry_on_result: Option<Predicate<T>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl<T, E> RetryConfig<T, E> {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder<T, E> {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();
        RetryConfigBuilder::new()
    }

    /// Attempts per call, including the first.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Name used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn should_retry(&self, outcome: &Result<T, E>) -> bool {
        match outcome {
            Ok(value) => self
                .retry_on_result
                .as_ref()
                .is_some_and(|predicate| predicate(value)),
            Err(error) => self
                .retry_on_error
                .as_ref()
                .is_none_or(|predicate| predicate(error)),
        }
    }
}

impl<T, E> Clone for RetryConfig<T, E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            interval: Arc::clone(&self.interval),
            retry_on_error: self.retry_on_error.clone(),
            retry_on_result: self.retry_on_result.clone(),
            event_listeners: self.event_listeners.clone(),
            name: self.name.clone(),
        }
    }
}

impl<T, E> fmt::Debug for RetryConfig<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("retry_on_error", &self.retry_on_error.is_some())
            .field("retry_on_result", &self.retry_on_result.is_some())
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

impl<T, E> Default for RetryConfig<T, E> {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<T, E> {
    max_attempts: usize,
    interval: Arc<dyn IntervalFunction>,
    retry_on_error: Option<Predicate<E>>,
    retry_on_result: Option<Predicate<T>>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl<T, E> Default for RetryConfigBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> RetryConfigBuilder<T, E> {
    /// Creates a new builder.
    ///
    /// Defaults:
    /// - max_attempts: 2 (one retry)
    /// - backoff: none
    /// - every error is retried, no successful value is
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_attempts: 2,
            interval: Arc::new(NoBackoff),
            retry_on_error: None,
            retry_on_result: None,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the number of attempts per call, including the first.
    ///
    /// Values below 1 are raised to 1, which disables retrying.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Retries immediately.
    pub fn no_backoff(mut self) -> Self {
        self.interval = Arc::new(NoBackoff);
        self
    }

    /// Waits `delay` before every retry.
    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.interval = Arc::new(FixedInterval::new(delay));
        self
    }

    /// Doubles the wait after every retry, starting at `initial`.
    pub fn exponential_backoff(mut self, initial: Duration) -> Self {
        self.interval = Arc::new(ExponentialBackoff::new(initial));
        self
    }

    /// Uses a custom delay schedule.
    pub fn backoff<I>(mut self, interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval = Arc::new(interval);
        self
    }

    /// Retries errors accepted by `predicate`; other errors end the call.
    pub fn retry_on_error<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_on_error = Some(Arc::new(predicate));
        self
    }

    /// Retries successful values accepted by `predicate`, e.g. a 503 response.
    pub fn retry_on_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.retry_on_result = Some(Arc::new(predicate));
        self
    }

    /// Give this retry policy a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked with `(attempt, delay)` before each retry.
    ///
    /// ```
    /// use resilient_http_retry::RetryConfig;
    /// use std::time::Duration;
    ///
    /// let config = RetryConfig::<u16, std::io::Error>::builder()
    ///     .max_attempts(3)
    ///     .fixed_backoff(Duration::from_millis(20))
    ///     .on_retry(|attempt, delay| eprintln!("attempt {attempt} failed, retrying in {delay:?}"))
    ///     .build();
    /// # let _ = config;
    /// ```
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &RetryEvent| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        });
        self
    }

    /// Registers a callback invoked with the attempt count when a call succeeds.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &RetryEvent| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    /// Registers a callback invoked when every attempt was used up.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &RetryEvent| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    /// Registers a callback invoked when a non-retryable error ends the call.
    pub fn on_ignored<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event: &RetryEvent| {
            if let RetryEvent::Ignored { attempts, .. } = event {
                f(*attempts);
            }
        });
        self
    }

    /// Registers a listener that receives every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&RetryEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(f);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RetryConfig<T, E> {
        RetryConfig {
            max_attempts: self.max_attempts,
            interval: self.interval,
            retry_on_error: self.retry_on_error,
            retry_on_result: self.retry_on_result,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
