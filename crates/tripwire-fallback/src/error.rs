//! Error types for the protected executor.

use crate::FallbackReason;
use std::time::Duration;
use thiserror::Error;
use tripwire_circuitbreaker::ConfigError;

/// A type-erased error returned by primaries and fallback providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Neither the primary nor the fallback produced a value.
///
/// This is the only error a caller of the executor ever sees: primary
/// failures are absorbed by the fallback, so this is raised only when the
/// fallback is exhausted too.
#[derive(Debug, Error)]
#[error("{name} unavailable: primary {reason}, fallback failed: {source}")]
pub struct ServiceUnavailable {
    name: String,
    reason: FallbackReason,
    #[source]
    source: BoxError,
}

impl ServiceUnavailable {
    pub(crate) fn new(name: impl Into<String>, reason: FallbackReason, source: BoxError) -> Self {
        Self {
            name: name.into(),
            reason,
            source,
        }
    }

    /// Name of the executor that gave up.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Why the primary was not used.
    pub fn reason(&self) -> FallbackReason {
        self.reason
    }

    /// Returns the fallback provider's error.
    pub fn into_source(self) -> BoxError {
        self.source
    }
}

/// An executor or monitor configuration that cannot be built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorConfigError {
    /// The circuit breaker half of the settings is invalid.
    #[error(transparent)]
    Breaker(#[from] ConfigError),

    /// Calls need a positive time budget.
    #[error("call_timeout must be positive, got {0:?}")]
    NonPositiveCallTimeout(Duration),

    /// At least one primary must be able to run.
    #[error("max_concurrent_calls must be at least 1")]
    ZeroConcurrentCalls,

    /// Fallbacks count as partial successes, never more than a full one.
    #[error("fallback_weight must be between 0.0 and 1.0, got {0}")]
    FallbackWeightOutOfRange(f64),

    /// The monitor's sample window must span a positive duration.
    #[error("sample_window must be positive, got {0:?}")]
    NonPositiveSampleWindow(Duration),
}

/// A [`CachedFallback`](crate::CachedFallback) asked for a value before any
/// was cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no cached value available")]
pub struct FallbackEmpty;
