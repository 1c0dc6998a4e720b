use resilient_http_circuitbreaker::{CallNotPermitted, CircuitBreakerError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Broad category of a transport failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection-level I/O failure: refused, reset, DNS, broken pipe.
    Io,
    /// The connect or request deadline passed.
    Timeout,
    /// The request could not be sent as built.
    InvalidRequest,
    /// Anything the transport could not categorize.
    Other,
}

impl TransportErrorKind {
    /// Stable lowercase name, used in logs and metric labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Io => "io",
            Self::Timeout => "timeout",
            Self::InvalidRequest => "invalid_request",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    /// Creates an error of `kind`.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Connection-level I/O failure.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Io, message)
    }

    /// Deadline of `after` passed without a response.
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    /// The request could not be sent as built.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::InvalidRequest, message)
    }

    /// Attaches the underlying cause.
    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: Into<BoxError>,
    {
        self.source = Some(source.into());
        self
    }

    /// Category of this failure.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Human-readable description, without the category prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true for the kinds a default retry policy retries: I/O
    /// failures and timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Io | TransportErrorKind::Timeout
        )
    }

    /// Returns true if a deadline passed.
    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
            std::io::ErrorKind::InvalidInput => TransportErrorKind::InvalidRequest,
            _ => TransportErrorKind::Io,
        };
        TransportError::new(kind, err.to_string()).with_source(err)
    }
}

/// Errors returned by [`ResilientHttpClient`](crate::ResilientHttpClient).
///
/// A response with an error status is not an error: exhausted retries hand
/// back the last response as-is.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HttpClientError {
    /// The transport failed on the last attempt.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The circuit breaker refused the attempt; the transport was not called.
    #[error("circuit breaker '{name}' is open; call not permitted")]
    CircuitOpen { name: String },

    /// The async request was cancelled before it completed.
    #[error("request was cancelled")]
    Cancelled,

    /// The background scheduler could not be started.
    #[error("failed to start request scheduler: {0}")]
    Scheduler(#[source] std::io::Error),
}

impl HttpClientError {
    /// Returns true if the breaker refused the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, HttpClientError::CircuitOpen { .. })
    }

    /// Returns true if the last attempt timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpClientError::Transport(e) if e.is_timeout())
    }

    /// Returns true for a transport failure worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, HttpClientError::Transport(e) if e.is_transient())
    }

    /// Returns true if the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HttpClientError::Cancelled)
    }

    /// The transport failure, if that is what this is.
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            HttpClientError::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// Stable lowercase name of the error category.
    pub fn kind_str(&self) -> &'static str {
        match self {
            HttpClientError::Transport(e) => e.kind().as_str(),
            HttpClientError::CircuitOpen { .. } => "circuit_open",
            HttpClientError::Cancelled => "cancelled",
            HttpClientError::Scheduler(_) => "scheduler",
        }
    }
}

impl From<CallNotPermitted> for HttpClientError {
    fn from(rejected: CallNotPermitted) -> Self {
        HttpClientError::CircuitOpen {
            name: rejected.name,
        }
    }
}

impl From<CircuitBreakerError<TransportError>> for HttpClientError {
    fn from(err: CircuitBreakerError<TransportError>) -> Self {
        match err {
            CircuitBreakerError::NotPermitted(rejected) => rejected.into(),
            CircuitBreakerError::Inner(e) => HttpClientError::Transport(e),
        }
    }
}
