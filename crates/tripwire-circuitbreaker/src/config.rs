use crate::error::ConfigError;
use crate::events::CircuitBreakerEvent;
use crate::{CircuitBreaker, CircuitState};
use std::time::Duration;
use tripwire_core::{EventListeners, FnListener, SharedClock, SystemClock};

/// Immutable configuration for a circuit breaker.
///
/// Built once through [`CircuitBreakerConfigBuilder`] and never mutated
/// afterwards.
#[derive(Debug)]
pub struct CircuitBreakerConfig {
    pub(crate) failure_threshold: usize,
    pub(crate) reset_timeout: Duration,
    pub(crate) window_size: Duration,
    pub(crate) min_half_open_duration: Duration,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Failures inside the window needed to open the circuit.
    pub fn failure_threshold(&self) -> usize {
        self.failure_threshold
    }

    /// How long the circuit stays open after the last failure.
    pub fn reset_timeout(&self) -> Duration {
        self.reset_timeout
    }

    /// Span of the failure window.
    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    /// Sustained success required in half-open before closing.
    pub fn min_half_open_duration(&self) -> Duration {
        self.min_half_open_duration
    }

    /// Name used in events, logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: usize,
    reset_timeout: Duration,
    window_size: Duration,
    min_half_open_duration: Duration,
    name: String,
    clock: SharedClock,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(5),
            window_size: Duration::from_secs(60),
            min_half_open_duration: Duration::from_secs(30),
            name: String::from("<unnamed>"),
            clock: SystemClock::shared(),
            event_listeners: EventListeners::new(),
        }
    }

    // =========================================================================
    // Presets
    // =========================================================================

    /// Preset: balanced configuration, identical to the defaults.
    ///
    /// - 3 failures within 60 seconds open the circuit
    /// - 5 second reset timeout
    /// - 30 seconds of sustained success to close from half-open
    pub fn standard() -> Self {
        Self::new()
            .failure_threshold(3)
            .reset_timeout(Duration::from_secs(5))
            .window_size(Duration::from_secs(60))
            .min_half_open_duration(Duration::from_secs(30))
    }

    /// Preset: open on the first failure and probe again quickly.
    ///
    /// - 1 failure within 10 seconds opens the circuit
    /// - 1 second reset timeout
    /// - the first success in half-open closes the circuit
    pub fn fast_fail() -> Self {
        Self::new()
            .failure_threshold(1)
            .reset_timeout(Duration::from_secs(1))
            .window_size(Duration::from_secs(10))
            .min_half_open_duration(Duration::ZERO)
    }

    /// Preset: tolerate bursts of transient failures.
    ///
    /// - 10 failures within 120 seconds open the circuit
    /// - 30 second reset timeout
    /// - 60 seconds of sustained success to close from half-open
    pub fn tolerant() -> Self {
        Self::new()
            .failure_threshold(10)
            .reset_timeout(Duration::from_secs(30))
            .window_size(Duration::from_secs(120))
            .min_half_open_duration(Duration::from_secs(60))
    }

    /// Sets how many failures inside the window open the circuit.
    ///
    /// Default: 3
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open after the last failure before a
    /// probe is let through.
    ///
    /// Default: 5 seconds
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Sets the span of the sliding failure window.
    ///
    /// Default: 60 seconds
    pub fn window_size(mut self, window: Duration) -> Self {
        self.window_size = window;
        self
    }

    /// Sets how long successes must be sustained in half-open before the
    /// circuit closes. A success recorded earlier keeps the circuit half-open.
    ///
    /// Default: 30 seconds
    pub fn min_half_open_duration(mut self, duration: Duration) -> Self {
        self.min_half_open_duration = duration;
        self
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Sets the time source.
    ///
    /// Default: [`SystemClock`]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a callback invoked with `(from, to)` on every state
    /// transition.
    ///
    /// # Example
    /// ```rust
    /// use tripwire_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let breaker = CircuitBreakerConfig::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("circuit opened (was {from})");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback invoked with the current state when a call is
    /// admitted.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback invoked when a call is rejected by an open
    /// circuit.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback invoked with the state in which a success was
    /// recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback invoked with the state in which a failure was
    /// recorded.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a listener for every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if self.reset_timeout.is_zero() {
            return Err(ConfigError::NonPositiveResetTimeout(self.reset_timeout));
        }
        if self.window_size.is_zero() {
            return Err(ConfigError::NonPositiveWindowSize(self.window_size));
        }
        Ok(())
    }

    /// Validates the configuration and builds a circuit breaker.
    ///
    /// Misconfiguration is reported here and never at call time.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        self.validate()?;

        let config = CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: self.reset_timeout,
            window_size: self.window_size,
            min_half_open_duration: self.min_half_open_duration,
            name: self.name,
            event_listeners: self.event_listeners,
        };

        Ok(CircuitBreaker::new(config, self.clock))
    }

    /// Builds a circuit breaker and wraps it in a tower layer.
    pub fn build_layer(self) -> Result<crate::CircuitBreakerLayer, ConfigError> {
        self.build().map(crate::CircuitBreakerLayer::new)
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
