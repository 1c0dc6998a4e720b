use crate::error::TransportError;
use crate::request::Request;
use crate::response::Response;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// Sends a single HTTP request.
///
/// Implementations do no retrying of their own. They must honour
/// [`Request::timeout`] and report failures with a [`TransportError`] whose
/// kind separates transient I/O failures and timeouts from everything else.
pub trait Transport: Send + Sync + 'static {
    /// Sends `request`, blocking the calling thread.
    fn send(&self, request: &Request) -> Result<Response, TransportError>;

    /// Sends `request` without blocking. The response body is materialized.
    fn send_async(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportError>>;

    /// Returns a transport that uses `timeout` when establishing connections.
    ///
    /// Fails when the underlying client cannot be rebuilt; `self` is left
    /// untouched either way.
    fn with_connect_timeout(&self, timeout: Duration) -> Result<Self, TransportError>
    where
        Self: Sized;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }

    fn send_async(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportError>> {
        (**self).send_async(request)
    }

    fn with_connect_timeout(&self, timeout: Duration) -> Result<Self, TransportError> {
        (**self).with_connect_timeout(timeout).map(Arc::new)
    }
}

/// Exposes the async half of a [`Transport`] as a tower [`Service`].
pub struct TransportService<T> {
    transport: Arc<T>,
}

impl<T> TransportService<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }
}

impl<T> Clone for TransportService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Service<Request> for TransportService<T> {
    type Response = Response;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<Response, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.transport.send_async(request)
    }
}
