use crate::error::HttpClientError;
use crate::executor::{HttpRetry, ResilientExecutor};
use crate::future::ResponseFuture;
use crate::request::Request;
use crate::response::Response;
use crate::scheduler::Scheduler;
use crate::service::ResilienceLayer;
use crate::transport::{Transport, TransportService};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use resilient_http_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use resilient_http_retry::{Retry, RetryConfig};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

/// Timeout applied to requests that do not carry their own.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(3000);

/// Retry policy used when none is configured: two attempts, no backoff,
/// retrying transient transport errors and 5xx responses.
pub fn default_retry_config() -> RetryConfig<Response, HttpClientError> {
    RetryConfig::builder()
        .max_attempts(2)
        .no_backoff()
        .retry_on_error(HttpClientError::is_transient)
        .retry_on_result(Response::is_server_error)
        .name("http-client")
        .build()
}

/// Breaker configuration used when none is configured: opens at a 50%
/// failure rate over 5 calls and probes again after 10 seconds.
pub fn default_circuit_breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig::builder().name("http-client").build()
}

/// HTTP client that sends every request through a circuit breaker and a
/// retry policy.
///
/// [`make_request`](Self::make_request) blocks the calling thread;
/// [`make_async_request`](Self::make_async_request) runs on the client's own
/// scheduler and returns immediately. Both paths share one breaker, so
/// failures seen by either count towards opening it.
///
/// The `with_*` methods return a reconfigured client that shares the
/// transport and scheduler with `self`. Requests already in flight keep the
/// policies they started with.
///
/// ```no_run
/// # #[cfg(feature = "reqwest")]
/// # fn example() -> Result<(), resilient_http_client::HttpClientError> {
/// use resilient_http_client::{ReqwestTransport, Request, ResilientHttpClient};
/// use std::time::Duration;
///
/// let client = ResilientHttpClient::builder(ReqwestTransport::new()?)
///     .request_timeout(Duration::from_secs(1))
///     .build()?;
///
/// let request = Request::get(http::Uri::from_static("http://localhost:8080/health")).build();
/// let response = client.make_request(&request)?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
pub struct ResilientHttpClient<T> {
    transport: Arc<T>,
    executor: ResilientExecutor,
    scheduler: Arc<Scheduler>,
    request_timeout: Duration,
    connect_timeout: Option<Duration>,
    default_headers: HeaderMap,
}

impl<T: Transport> ResilientHttpClient<T> {
    pub fn builder(transport: T) -> ResilientHttpClientBuilder<T> {
        ResilientHttpClientBuilder::new(transport)
    }

    /// Client with default policies and timeout.
    pub fn new(transport: T) -> Result<Self, HttpClientError> {
        Self::builder(transport).build()
    }

    /// Sends `request`, blocking until it succeeds, fails for good or is
    /// rejected by the circuit breaker.
    ///
    /// Exhausted retries return the last outcome: a final 5xx comes back as
    /// `Ok` with that status, a final transport failure as `Err`.
    ///
    /// Each attempt is bounded only by the transport honouring
    /// [`Request::timeout`]; the async path also enforces it on the tokio
    /// timer.
    pub fn make_request(&self, request: &Request) -> Result<Response, HttpClientError> {
        let prepared = self.prepare(request);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %prepared.method(),
            uri = %prepared.uri(),
            timeout_ms = prepared.timeout().map(|t| t.as_millis() as u64),
            "dispatching blocking request"
        );

        let transport = &self.transport;
        self.executor
            .execute(&prepared, |request| transport.send(request))
    }

    /// Sends `request` on the background scheduler.
    ///
    /// Never blocks. The returned future resolves with the same outcome the
    /// blocking path would produce; dropping it cancels the request.
    pub fn make_async_request(&self, request: Request) -> ResponseFuture {
        let prepared = self.prepare(&request);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %prepared.method(),
            uri = %prepared.uri(),
            timeout_ms = prepared.timeout().map(|t| t.as_millis() as u64),
            "scheduling async request"
        );

        let service = ResilienceLayer::new(self.executor.clone())
            .layer(TransportService::new(Arc::clone(&self.transport)));
        ResponseFuture::new(self.scheduler.spawn(service.oneshot(prepared)))
    }

    /// Client with a new retry policy. Breaker state is kept.
    pub fn with_retry_policy(&self, config: RetryConfig<Response, HttpClientError>) -> Self {
        self.derive(
            self.executor.with_retry(Retry::new(config)),
            Arc::clone(&self.transport),
        )
    }

    /// Client with a fresh breaker built from `config`.
    pub fn with_circuit_breaker(&self, config: CircuitBreakerConfig) -> Self {
        self.derive(
            self.executor.with_breaker(CircuitBreaker::new(config)),
            Arc::clone(&self.transport),
        )
    }

    /// Client that applies `timeout` to requests without their own.
    /// Breaker state is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut client = self.derive(self.executor.clone(), Arc::clone(&self.transport));
        client.request_timeout = timeout;
        client
    }

    /// Client whose transport establishes connections within `timeout`.
    ///
    /// Fails if the transport cannot be rebuilt with the new timeout.
    pub fn with_connect_timeout(&self, timeout: Duration) -> Result<Self, HttpClientError> {
        let transport = Arc::new(T::with_connect_timeout(&self.transport, timeout)?);
        let mut client = self.derive(self.executor.clone(), transport);
        client.connect_timeout = Some(timeout);
        Ok(client)
    }

    fn derive(&self, executor: ResilientExecutor, transport: Arc<T>) -> Self {
        Self {
            transport,
            executor,
            scheduler: Arc::clone(&self.scheduler),
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            default_headers: self.default_headers.clone(),
        }
    }

    fn prepare(&self, request: &Request) -> Request {
        request
            .to_builder()
            .timeout_if_unset(self.request_timeout)
            .default_headers(&self.default_headers)
            .build()
    }
}

impl<T> ResilientHttpClient<T> {
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        self.executor.breaker()
    }

    pub fn retry(&self) -> &HttpRetry {
        self.executor.retry()
    }

    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Stops the scheduler shared by this client and every client derived
    /// from it. Pending async requests resolve as cancelled; blocking
    /// requests are unaffected.
    pub fn shutdown(&self, timeout: Duration) {
        self.scheduler.shutdown(timeout);
    }
}

impl<T> Clone for ResilientHttpClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            executor: self.executor.clone(),
            scheduler: Arc::clone(&self.scheduler),
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            default_headers: self.default_headers.clone(),
        }
    }
}

impl<T> fmt::Debug for ResilientHttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientHttpClient")
            .field("executor", &self.executor)
            .field("scheduler", &self.scheduler)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ResilientHttpClient`].
pub struct ResilientHttpClientBuilder<T> {
    transport: T,
    request_timeout: Duration,
    connect_timeout: Option<Duration>,
    default_headers: HeaderMap,
    retry: Option<RetryConfig<Response, HttpClientError>>,
    breaker: Option<CircuitBreaker>,
    breaker_config: Option<CircuitBreakerConfig>,
    scheduler_threads: usize,
}

impl<T: Transport> ResilientHttpClientBuilder<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: None,
            default_headers: HeaderMap::new(),
            retry: None,
            breaker: None,
            breaker_config: None,
            scheduler_threads: Scheduler::DEFAULT_WORKERS,
        }
    }

    /// Timeout for requests that do not set one.
    ///
    /// Default: 3000 ms
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Connect timeout handed to the transport.
    ///
    /// Default: the transport's own
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Header sent with every request that does not set `name` itself.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.append(name, value);
        self
    }

    /// Retry policy.
    ///
    /// Default: [`default_retry_config`]
    pub fn retry(mut self, config: RetryConfig<Response, HttpClientError>) -> Self {
        self.retry = Some(config);
        self
    }

    /// Breaker configuration for a breaker owned by this client.
    ///
    /// Default: [`default_circuit_breaker_config`]
    pub fn circuit_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = Some(config);
        self.breaker = None;
        self
    }

    /// Existing breaker to share with other clients or callers.
    pub fn circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self.breaker_config = None;
        self
    }

    /// Worker threads of the background scheduler.
    ///
    /// Default: 3
    pub fn scheduler_threads(mut self, threads: usize) -> Self {
        self.scheduler_threads = threads;
        self
    }

    /// Starts the scheduler and assembles the client.
    ///
    /// Fails if the transport rejects the connect timeout or the scheduler
    /// cannot start.
    pub fn build(self) -> Result<ResilientHttpClient<T>, HttpClientError> {
        let transport = match self.connect_timeout {
            Some(timeout) => self.transport.with_connect_timeout(timeout)?,
            None => self.transport,
        };

        let scheduler = Scheduler::new(self.scheduler_threads)?;

        let breaker = match (self.breaker, self.breaker_config) {
            (Some(breaker), _) => breaker,
            (None, Some(config)) => CircuitBreaker::new(config),
            (None, None) => CircuitBreaker::new(default_circuit_breaker_config()),
        };
        let retry = Retry::new(self.retry.unwrap_or_else(default_retry_config));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            breaker = breaker.name(),
            retry = retry.config().name(),
            request_timeout_ms = self.request_timeout.as_millis() as u64,
            "resilient http client built"
        );

        Ok(ResilientHttpClient {
            transport: Arc::new(transport),
            executor: ResilientExecutor::new(breaker, retry),
            scheduler: Arc::new(scheduler),
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            default_headers: self.default_headers,
        })
    }
}
