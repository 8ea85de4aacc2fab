use std::time::Duration;
use thiserror::Error;

/// Errors returned by the `CircuitBreakerService`.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; calls are not permitted.
    #[error("circuit is open; call not permitted")]
    OpenCircuit,

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit)
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<E> for CircuitBreakerError<E> {
    fn from(err: E) -> Self {
        CircuitBreakerError::Inner(err)
    }
}

/// A circuit breaker configuration that cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The failure threshold must be at least one.
    #[error("failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    /// The open state must last for a positive duration.
    #[error("reset_timeout must be positive, got {0:?}")]
    NonPositiveResetTimeout(Duration),

    /// The failure window must span a positive duration.
    #[error("window_size must be positive, got {0:?}")]
    NonPositiveWindowSize(Duration),
}
