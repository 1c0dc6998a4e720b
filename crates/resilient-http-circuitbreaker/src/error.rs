use crate::CircuitState;
use thiserror::Error;

/// A call was refused because the breaker is open, or half-open with every
/// trial slot taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{name}' is {state:?}; call not permitted")]
pub struct CallNotPermitted {
    /// Name of the breaker that refused the call.
    pub name: String,
    /// State observed when the call was refused.
    pub state: CircuitState,
}

/// Errors returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute)
/// and friends.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The call was never attempted.
    #[error(transparent)]
    NotPermitted(#[from] CallNotPermitted),

    /// The guarded call ran and returned an error.
    #[error("guarded call failed: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the breaker refused the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::NotPermitted(_))
    }

    /// Returns the error produced by the guarded call, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::NotPermitted(_) => None,
        }
    }

    /// Maps the inner error, leaving rejections untouched.
    pub fn map_inner<F, U>(self, f: F) -> CircuitBreakerError<U>
    where
        F: FnOnce(E) -> U,
    {
        match self {
            CircuitBreakerError::NotPermitted(rejected) => CircuitBreakerError::NotPermitted(rejected),
            CircuitBreakerError::Inner(e) => CircuitBreakerError::Inner(f(e)),
        }
    }
}
