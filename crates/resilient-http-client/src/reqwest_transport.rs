use crate::error::{TransportError, TransportErrorKind};
use crate::request::Request;
use crate::response::Response;
use crate::transport::Transport;
use futures::future::BoxFuture;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// [`Transport`] backed by reqwest.
///
/// The async client is built eagerly. The blocking client owns a private
/// runtime thread, so it is only built on the first blocking send; a
/// transport used purely from async code never creates it.
#[derive(Clone)]
pub struct ReqwestTransport {
    connect_timeout: Option<Duration>,
    client: reqwest::Client,
    blocking: Arc<OnceLock<reqwest::blocking::Client>>,
}

impl ReqwestTransport {
    /// Creates a transport with reqwest's default connect timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::build(None)
    }

    fn build(connect_timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().map_err(map_reqwest_error)?;
        Ok(Self {
            connect_timeout,
            client,
            blocking: Arc::new(OnceLock::new()),
        })
    }

    /// Connect timeout in use, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    fn blocking_client(&self) -> Result<&reqwest::blocking::Client, TransportError> {
        if let Some(client) = self.blocking.get() {
            return Ok(client);
        }

        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build().map_err(map_reqwest_error)?;
        // Losing a concurrent initialization drops this client.
        let _ = self.blocking.set(client);
        self.blocking
            .get()
            .ok_or_else(|| TransportError::new(TransportErrorKind::Other, "blocking client unavailable"))
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let client = self.blocking_client()?;

        let mut builder = client
            .request(request.method().clone(), request.uri().to_string())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }
        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        Ok(Response::streaming(status, headers, response))
    }

    fn send_async(&self, request: Request) -> BoxFuture<'static, Result<Response, TransportError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let mut builder = client
                .request(request.method().clone(), request.uri().to_string())
                .headers(request.headers().clone());
            if let Some(body) = request.body() {
                builder = builder.body(body.clone());
            }
            if let Some(timeout) = request.timeout() {
                builder = builder.timeout(timeout);
            }

            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            let headers = response.headers().clone();
            let text = response.text().await.map_err(map_reqwest_error)?;
            Ok(Response::new(status, headers, text))
        })
    }

    fn with_connect_timeout(&self, timeout: Duration) -> Result<Self, TransportError> {
        Self::build(Some(timeout))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_builder() {
        TransportErrorKind::InvalidRequest
    } else {
        TransportErrorKind::Io
    };
    TransportError::new(kind, err.to_string()).with_source(err)
}
