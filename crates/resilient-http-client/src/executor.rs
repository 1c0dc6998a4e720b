//! Composition of the circuit breaker and the retry policy around one
//! request-sending function.
//!
//! Every attempt passes through the breaker gate on its own, so a breaker
//! that opens halfway through a retry loop ends the loop at the next attempt
//! with [`HttpClientError::CircuitOpen`]. The outcome of every admitted
//! attempt is recorded by the breaker before the retry policy sees it.

use crate::error::{HttpClientError, TransportError};
use crate::request::Request;
use crate::response::Response;
use resilient_http_circuitbreaker::CircuitBreaker;
use resilient_http_retry::{Retry, RetryDecision};
use std::future::Future;
use std::time::Duration;
#[cfg(feature = "metrics")]
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

/// Retry policy over the outcomes of whole HTTP attempts.
pub type HttpRetry = Retry<Response, HttpClientError>;

/// Runs requests through a circuit breaker and a retry policy.
///
/// Cloning shares the breaker state and the retry configuration.
#[derive(Clone, Debug)]
pub struct ResilientExecutor {
    breaker: CircuitBreaker,
    retry: HttpRetry,
}

impl ResilientExecutor {
    pub fn new(breaker: CircuitBreaker, retry: HttpRetry) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "http_client_requests_total",
                "Logical requests completed by the resilient client, by mode and outcome"
            );
            describe_histogram!(
                "http_client_request_duration_seconds",
                "Wall time of logical requests including retries and backoff"
            );
        });
        Self { breaker, retry }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn retry(&self) -> &HttpRetry {
        &self.retry
    }

    /// Same retry policy, different breaker.
    pub fn with_breaker(&self, breaker: CircuitBreaker) -> Self {
        Self::new(breaker, self.retry.clone())
    }

    /// Same breaker, different retry policy.
    pub fn with_retry(&self, retry: HttpRetry) -> Self {
        Self::new(self.breaker.clone(), retry)
    }

    /// Sends `request` with `send`, blocking the calling thread through every
    /// attempt and backoff delay.
    ///
    /// Unlike [`execute_async`](Self::execute_async), no deadline is imposed
    /// here: a blocking attempt cannot be interrupted, so `send` must honour
    /// [`Request::timeout`] itself and return a timeout error when it passes.
    pub fn execute<F>(&self, request: &Request, mut send: F) -> Result<Response, HttpClientError>
    where
        F: FnMut(&Request) -> Result<Response, TransportError>,
    {
        #[cfg(feature = "metrics")]
        let started = Instant::now();

        let mut attempts = 0;
        let result = loop {
            attempts += 1;
            let outcome = self
                .breaker
                .execute_with(counts_as_failure, || send(request))
                .map_err(HttpClientError::from);

            match self.next_step(&outcome, attempts) {
                None => break outcome,
                Some(delay) if delay.is_zero() => {}
                Some(delay) => std::thread::sleep(delay),
            }
        };

        #[cfg(feature = "metrics")]
        record_request("blocking", &result, started);

        result
    }

    /// Async counterpart of [`execute`](Self::execute).
    ///
    /// Each attempt is bounded by [`Request::timeout`]; an attempt that
    /// outlives it fails with a timeout error. Backoff waits on the tokio
    /// timer. Dropping the future abandons the call, including any pending
    /// retry, and records nothing for the attempt in flight.
    pub async fn execute_async<F, Fut>(
        &self,
        request: Request,
        mut send: F,
    ) -> Result<Response, HttpClientError>
    where
        F: FnMut(Request) -> Fut,
        Fut: Future<Output = Result<Response, TransportError>>,
    {
        #[cfg(feature = "metrics")]
        let started = Instant::now();

        let deadline = request.timeout();
        let mut attempts = 0;
        let result = loop {
            attempts += 1;
            let outcome = self
                .breaker
                .execute_async_with(counts_as_failure, || {
                    bounded(deadline, send(request.clone()))
                })
                .await
                .map_err(HttpClientError::from);

            match self.next_step(&outcome, attempts) {
                None => break outcome,
                Some(delay) if delay.is_zero() => {}
                Some(delay) => tokio::time::sleep(delay).await,
            }
        };

        #[cfg(feature = "metrics")]
        record_request("async", &result, started);

        result
    }

    /// `None` ends the call with `outcome`; `Some(delay)` schedules another attempt.
    fn next_step(
        &self,
        outcome: &Result<Response, HttpClientError>,
        attempts: usize,
    ) -> Option<Duration> {
        if matches!(outcome, Err(HttpClientError::CircuitOpen { .. })) {
            #[cfg(feature = "tracing")]
            tracing::debug!(attempts, "attempt rejected by circuit breaker");
            return None;
        }

        match self.retry.decide(outcome, attempts) {
            RetryDecision::Return => None,
            RetryDecision::RetryAfter(delay) => Some(delay),
        }
    }
}

/// Breaker classification: transport failures and 5xx responses.
fn counts_as_failure(outcome: &Result<Response, TransportError>) -> bool {
    match outcome {
        Ok(response) => response.is_server_error(),
        Err(_) => true,
    }
}

async fn bounded<Fut>(deadline: Option<Duration>, attempt: Fut) -> Result<Response, TransportError>
where
    Fut: Future<Output = Result<Response, TransportError>>,
{
    let Some(deadline) = deadline else {
        return attempt.await;
    };
    match tokio::time::timeout(deadline, attempt).await {
        Ok(outcome) => outcome,
        Err(_elapsed) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(timeout_ms = deadline.as_millis() as u64, "request attempt timed out");
            Err(TransportError::timeout(deadline))
        }
    }
}

#[cfg(feature = "metrics")]
fn record_request(mode: &'static str, result: &Result<Response, HttpClientError>, started: Instant) {
    let outcome = match result {
        Ok(response) if response.is_server_error() => "server_error",
        Ok(response) if response.status().is_client_error() => "client_error",
        Ok(_) => "success",
        Err(err) => err.kind_str(),
    };
    counter!("http_client_requests_total", "mode" => mode, "outcome" => outcome).increment(1);
    histogram!("http_client_request_duration_seconds", "mode" => mode)
        .record(started.elapsed().as_secs_f64());
}
