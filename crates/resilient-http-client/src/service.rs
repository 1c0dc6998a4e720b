use crate::error::{HttpClientError, TransportError};
use crate::executor::ResilientExecutor;
use crate::request::Request;
use crate::response::Response;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// A tower [`Layer`] that runs every request through a [`ResilientExecutor`].
///
/// ```
/// use resilient_http_client::{ResilienceLayer, ResilientExecutor, Request, Response};
/// use resilient_http_circuitbreaker::CircuitBreaker;
/// use resilient_http_retry::Retry;
/// use tower::{service_fn, ServiceBuilder, ServiceExt};
///
/// # async fn example() {
/// let executor = ResilientExecutor::new(CircuitBreaker::default(), Retry::default());
/// let service = ServiceBuilder::new()
///     .layer(ResilienceLayer::new(executor))
///     .service(service_fn(|_req: Request| async {
///         Ok::<_, resilient_http_client::TransportError>(Response::text_response(
///             http::StatusCode::OK,
///             "pong",
///         ))
///     }));
///
/// let request = Request::get(http::Uri::from_static("http://localhost/ping")).build();
/// let response = service.oneshot(request).await.unwrap();
/// assert_eq!(response.status(), http::StatusCode::OK);
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct ResilienceLayer {
    executor: ResilientExecutor,
}

impl ResilienceLayer {
    pub fn new(executor: ResilientExecutor) -> Self {
        Self { executor }
    }
}

impl<S> Layer<S> for ResilienceLayer {
    type Service = ResilientService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResilientService {
            inner,
            executor: self.executor.clone(),
        }
    }
}

/// Service produced by [`ResilienceLayer`].
///
/// Each attempt drives a clone of the inner service to readiness before
/// calling it.
#[derive(Clone, Debug)]
pub struct ResilientService<S> {
    inner: S,
    executor: ResilientExecutor,
}

impl<S> ResilientService<S> {
    pub fn executor(&self) -> &ResilientExecutor {
        &self.executor
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> Service<Request> for ResilientService<S>
where
    S: Service<Request, Response = Response, Error = TransportError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = HttpClientError;
    type Future = BoxFuture<'static, Result<Response, HttpClientError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let executor = self.executor.clone();
        let inner = self.inner.clone();

        Box::pin(async move {
            executor
                .execute_async(request, move |request| inner.clone().oneshot(request))
                .await
        })
    }
}
