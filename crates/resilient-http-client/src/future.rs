use crate::error::HttpClientError;
use crate::response::Response;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

/// Pending result of [`ResilientHttpClient::make_async_request`].
///
/// The request runs on the client's scheduler whether or not this future is
/// polled. Dropping it, or calling [`cancel`](Self::cancel), aborts the
/// request at its next await point; an aborted request resolves to
/// [`HttpClientError::Cancelled`].
///
/// [`ResilientHttpClient::make_async_request`]: crate::ResilientHttpClient::make_async_request
#[must_use = "dropping a ResponseFuture cancels the request"]
#[derive(Debug)]
pub struct ResponseFuture {
    handle: JoinHandle<Result<Response, HttpClientError>>,
}

impl ResponseFuture {
    pub(crate) fn new(handle: JoinHandle<Result<Response, HttpClientError>>) -> Self {
        Self { handle }
    }

    /// Aborts the request. Pending retries and backoff waits are abandoned.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Whether the request has completed, failed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for ResponseFuture {
    type Output = Result<Response, HttpClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) if err.is_cancelled() => {
                Poll::Ready(Err(HttpClientError::Cancelled))
            }
            Poll::Ready(Err(err)) => std::panic::resume_unwind(err.into_panic()),
        }
    }
}

impl Drop for ResponseFuture {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
