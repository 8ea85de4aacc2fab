//! Configuration for the protected executor.

use crate::error::{BoxError, ExecutorConfigError};
use crate::{FallbackEvent, ProtectedExecutor, ServiceMonitor};
use std::sync::Arc;
use std::time::Duration;
use tripwire_circuitbreaker::{CircuitBreaker, CircuitBreakerConfigBuilder};
use tripwire_core::{EventListeners, FnListener};

/// Decides whether a primary error counts against the circuit breaker.
pub type ErrorPredicate = Arc<dyn Fn(&BoxError) -> bool + Send + Sync>;

/// Immutable executor configuration.
pub struct ExecutorConfig {
    pub(crate) name: String,
    pub(crate) call_timeout: Duration,
    pub(crate) max_concurrent_calls: usize,
    pub(crate) counts_as_failure: ErrorPredicate,
    pub(crate) monitor: Option<ServiceMonitor>,
    pub(crate) event_listeners: EventListeners<FallbackEvent>,
}

impl ExecutorConfig {
    /// Name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default time budget for one primary call.
    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// How many primaries may run at once.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }
}

impl std::fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("name", &self.name)
            .field("call_timeout", &self.call_timeout)
            .field("max_concurrent_calls", &self.max_concurrent_calls)
            .field("monitor", &self.monitor)
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for a [`ProtectedExecutor`].
pub struct ExecutorConfigBuilder {
    name: Option<String>,
    call_timeout: Duration,
    max_concurrent_calls: usize,
    counts_as_failure: ErrorPredicate,
    monitor: Option<ServiceMonitor>,
    event_listeners: EventListeners<FallbackEvent>,
}

impl Default for ExecutorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            name: None,
            call_timeout: Duration::from_secs(2),
            max_concurrent_calls: 32,
            counts_as_failure: Arc::new(|_| true),
            monitor: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name used in events, logs and metrics.
    ///
    /// Default: the circuit breaker's name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets how long a primary may run before it is abandoned and the
    /// fallback is used.
    ///
    /// Default: 2 seconds
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets how many primaries may run at once. Calls beyond the limit are
    /// served by the fallback without touching the primary.
    ///
    /// Default: 32
    pub fn max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    /// Only primary errors matching `predicate` are recorded as breaker
    /// failures. Other errors are recorded as nothing, but the call is still
    /// served by the fallback. Timeouts and panics always count.
    ///
    /// ```rust
    /// use tripwire_fallback::ProtectedExecutor;
    ///
    /// #[derive(Debug, thiserror::Error)]
    /// #[error("invalid request")]
    /// struct Invalid;
    ///
    /// let builder = ProtectedExecutor::builder()
    ///     .count_failures_when(|err| !err.is::<Invalid>());
    /// ```
    pub fn count_failures_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BoxError) -> bool + Send + Sync + 'static,
    {
        self.counts_as_failure = Arc::new(predicate);
        self
    }

    /// Reports every call outcome to `monitor`.
    pub fn monitor(mut self, monitor: ServiceMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Adds an event listener.
    pub fn on_event<F>(mut self, listener: F) -> Self
    where
        F: Fn(&FallbackEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(listener));
        self
    }

    /// Validates the configuration and builds an executor guarded by
    /// `breaker`.
    pub fn build(self, breaker: CircuitBreaker) -> Result<ProtectedExecutor, ExecutorConfigError> {
        if self.call_timeout.is_zero() {
            return Err(ExecutorConfigError::NonPositiveCallTimeout(
                self.call_timeout,
            ));
        }
        if self.max_concurrent_calls == 0 {
            return Err(ExecutorConfigError::ZeroConcurrentCalls);
        }

        let config = ExecutorConfig {
            name: self.name.unwrap_or_else(|| breaker.name().to_string()),
            call_timeout: self.call_timeout,
            max_concurrent_calls: self.max_concurrent_calls,
            counts_as_failure: self.counts_as_failure,
            monitor: self.monitor,
            event_listeners: self.event_listeners,
        };
        Ok(ProtectedExecutor::new(config, breaker))
    }
}

/// The flat set of knobs for one protected dependency.
///
/// Useful when settings come from a configuration file:
///
/// ```rust
/// use std::time::Duration;
/// use tripwire_fallback::GuardSettings;
///
/// let settings = GuardSettings {
///     failure_threshold: 5,
///     call_timeout: Duration::from_millis(500),
///     ..GuardSettings::default()
/// };
/// let executor = settings.build("recommendations").unwrap();
/// assert_eq!(executor.breaker().config().failure_threshold(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GuardSettings {
    /// Failures inside the window that open the circuit.
    pub failure_threshold: usize,
    /// How long the circuit stays open after the last failure.
    pub reset_timeout: Duration,
    /// Span of the failure window.
    pub window_size: Duration,
    /// Sustained success required in half-open before closing.
    pub min_half_open_duration: Duration,
    /// Time budget for one primary call.
    pub call_timeout: Duration,
    /// How many primaries may run at once.
    pub max_concurrent_calls: usize,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(5),
            window_size: Duration::from_secs(60),
            min_half_open_duration: Duration::from_secs(30),
            call_timeout: Duration::from_secs(2),
            max_concurrent_calls: 32,
        }
    }
}

impl GuardSettings {
    /// Returns a breaker builder carrying the breaker half of the settings.
    pub fn breaker_builder(&self) -> CircuitBreakerConfigBuilder {
        CircuitBreaker::builder()
            .failure_threshold(self.failure_threshold)
            .reset_timeout(self.reset_timeout)
            .window_size(self.window_size)
            .min_half_open_duration(self.min_half_open_duration)
    }

    /// Returns an executor builder carrying the executor half of the settings.
    pub fn executor_builder(&self) -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::new()
            .call_timeout(self.call_timeout)
            .max_concurrent_calls(self.max_concurrent_calls)
    }

    /// Builds a named breaker and an executor around it.
    pub fn build(&self, name: impl Into<String>) -> Result<ProtectedExecutor, ExecutorConfigError> {
        let breaker = self.breaker_builder().name(name).build()?;
        self.executor_builder().build(breaker)
    }
}
