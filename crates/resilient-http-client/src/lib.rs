//! HTTP client that composes a circuit breaker and a retry policy around a
//! pluggable transport.
//!
//! Every attempt of a logical request first asks the circuit breaker for
//! permission, then goes to the [`Transport`]; its outcome is recorded by the
//! breaker and then judged by the retry policy. A breaker that opens part way
//! through a retry loop ends it with [`HttpClientError::CircuitOpen`].
//!
//! Requests can be sent two ways:
//!
//! - [`ResilientHttpClient::make_request`] blocks the calling thread through
//!   every attempt and backoff delay.
//! - [`ResilientHttpClient::make_async_request`] returns a [`ResponseFuture`]
//!   at once and runs the request on a small tokio runtime owned by the
//!   client (the [`Scheduler`]).
//!
//! # Defaults
//!
//! | option | default |
//! |---|---|
//! | request timeout | 3000 ms |
//! | connect timeout | transport default |
//! | attempts | 2, no backoff |
//! | retried outcomes | I/O errors, timeouts, 5xx responses |
//! | breaker failure rate | 50% over 5 calls |
//! | breaker open wait | 10 s |
//! | scheduler workers | 3 |
//!
//! # Example
//!
//! ```
//! use futures::future::BoxFuture;
//! use resilient_http_client::{
//!     Request, ResilientHttpClient, Response, Transport, TransportError,
//! };
//! use std::time::Duration;
//!
//! struct Static;
//!
//! impl Transport for Static {
//!     fn send(&self, _request: &Request) -> Result<Response, TransportError> {
//!         Ok(Response::text_response(http::StatusCode::OK, "Success"))
//!     }
//!
//!     fn send_async(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportError>> {
//!         let result = self.send(&request);
//!         Box::pin(async move { result })
//!     }
//!
//!     fn with_connect_timeout(&self, _timeout: Duration) -> Result<Self, TransportError> {
//!         Ok(Static)
//!     }
//! }
//!
//! let client = ResilientHttpClient::new(Static).unwrap();
//! let request = Request::get(http::Uri::from_static("http://localhost/")).build();
//!
//! let response = client.make_request(&request).unwrap();
//! assert_eq!(response.text().unwrap(), "Success");
//!
//! let response = futures::executor::block_on(client.make_async_request(request)).unwrap();
//! assert_eq!(response.status(), http::StatusCode::OK);
//! ```
//!
//! # Feature flags
//!
//! - `reqwest`: [`ReqwestTransport`], backed by reqwest's blocking and async clients
//! - `tracing`: logs dispatch, retries and breaker transitions
//! - `metrics`: request counts and durations through the `metrics` facade

mod client;
mod error;
mod executor;
mod future;
mod request;
#[cfg(feature = "reqwest")]
mod reqwest_transport;
mod response;
mod scheduler;
mod service;
mod transport;

pub use client::{
    default_circuit_breaker_config, default_retry_config, ResilientHttpClient,
    ResilientHttpClientBuilder, DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{HttpClientError, TransportError, TransportErrorKind};
pub use executor::{HttpRetry, ResilientExecutor};
pub use future::ResponseFuture;
pub use request::{Request, RequestBuilder};
#[cfg(feature = "reqwest")]
pub use reqwest_transport::ReqwestTransport;
pub use response::{Response, ResponseBody};
pub use scheduler::Scheduler;
pub use service::{ResilienceLayer, ResilientService};
pub use transport::{Transport, TransportService};

pub use resilient_http_circuitbreaker as circuitbreaker;
pub use resilient_http_retry as retry;
