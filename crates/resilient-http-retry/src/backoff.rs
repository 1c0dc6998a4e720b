//! Delay schedules between attempts.

use std::time::Duration;

/// Computes how long to wait before the next attempt.
pub trait IntervalFunction: Send + Sync {
    /// Delay before retry number `retry` (0 for the first retry).
    fn next_interval(&self, retry: usize) -> Duration;
}

/// Retries immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl IntervalFunction for NoBackoff {
    fn next_interval(&self, _retry: usize) -> Duration {
        Duration::ZERO
    }
}

/// Waits the same amount before every retry.
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    delay: Duration,
}

impl FixedInterval {
    /// Waits `delay` before each retry.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _retry: usize) -> Duration {
        self.delay
    }
}

fn grow(initial: Duration, multiplier: f64, retry: usize, cap: Option<Duration>) -> Duration {
    let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
    let factor = multiplier.powi(exponent);
    let grown = if factor.is_finite() {
        Duration::try_from_secs_f64(initial.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    } else {
        Duration::MAX
    };
    match cap {
        Some(cap) => grown.min(cap),
        None => grown,
    }
}

/// Multiplies the delay by a constant factor after every retry.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    initial: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Starts at `initial` and doubles on each retry.
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the growth factor. Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps the delay.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, retry: usize) -> Duration {
        grow(self.initial, self.multiplier, retry, self.max_interval)
    }
}

/// Exponential backoff with jitter.
///
/// With a randomization factor of 0.5 the delay is drawn uniformly from
/// 50%–150% of the exponential value.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialRandomBackoff {
    inner: ExponentialBackoff,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    /// `randomization_factor` is clamped to `0.0..=1.0`.
    pub fn new(initial: Duration, randomization_factor: f64) -> Self {
        Self {
            inner: ExponentialBackoff::new(initial),
            randomization_factor: randomization_factor.clamp(0.0, 1.0),
        }
    }

    /// Sets the growth factor. Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.inner = self.inner.multiplier(multiplier);
        self
    }

    /// Caps the delay before jitter is applied.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.inner = self.inner.max_interval(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, retry: usize) -> Duration {
        use rand::Rng;

        let exact = self.inner.next_interval(retry);
        let base = exact.as_secs_f64();
        let spread = base * self.randomization_factor;
        if spread <= 0.0 || !spread.is_finite() {
            return exact;
        }
        let jittered = rand::rng().random_range((base - spread)..=(base + spread));
        Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Delay computed by a closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Wraps `f`, which receives the retry number.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, retry: usize) -> Duration {
        (self.f)(retry)
    }
}
