use crate::circuit::{Circuit, CircuitMetrics, CircuitState, Transition};
use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tripwire_core::SharedClock;

const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);

/// A circuit breaker guarding one logical dependency.
///
/// The handle is cheap to clone; every clone shares the same state, so one
/// breaker is created per dependency and handed to all of its callers.
///
/// The failure window and the state are mutated together under one lock,
/// which makes [`try_acquire`](Self::try_acquire),
/// [`record_success`](Self::record_success) and
/// [`record_failure`](Self::record_failure) linearizable. Events are
/// delivered after the lock is released, so listeners may call back into the
/// breaker.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

struct Shared {
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
    config: CircuitBreakerConfig,
    clock: SharedClock,
}

/// The outcome of asking the breaker for admission.
#[must_use = "a rejected call should be routed to a fallback"]
#[derive(Debug)]
pub enum Admission {
    /// The call may proceed; report its result through the permit.
    Permitted(CallPermit),
    /// The circuit is open; the call must not reach the dependency.
    Rejected,
}

impl Admission {
    /// Returns true if the call was admitted.
    pub fn is_permitted(&self) -> bool {
        matches!(self, Admission::Permitted(_))
    }

    /// Returns the permit of an admitted call.
    pub fn into_permit(self) -> Option<CallPermit> {
        match self {
            Admission::Permitted(permit) => Some(permit),
            Admission::Rejected => None,
        }
    }
}

/// Proof that a call was admitted, used to report its result.
///
/// A permit remembers the breaker epoch it was issued in. If the breaker has
/// transitioned since, the result describes a dependency the breaker has
/// already reassessed and is discarded. Dropping a permit without recording
/// anything (for example because the caller cancelled the call) leaves the
/// breaker untouched.
#[must_use = "report the call result with record_success or record_failure"]
pub struct CallPermit {
    breaker: CircuitBreaker,
    epoch: u64,
    state: CircuitState,
}

impl CallPermit {
    /// The state the breaker was in when the call was admitted.
    pub fn admitted_in(&self) -> CircuitState {
        self.state
    }

    /// Records a success. Returns false if the result was stale and
    /// discarded.
    pub fn record_success(self) -> bool {
        self.breaker.record(Some(self.epoch), true)
    }

    /// Records a failure. Returns false if the result was stale and
    /// discarded.
    pub fn record_failure(self) -> bool {
        self.breaker.record(Some(self.epoch), false)
    }
}

impl fmt::Debug for CallPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallPermit")
            .field("breaker", &self.breaker.name())
            .field("epoch", &self.epoch)
            .field("state", &self.state)
            .finish()
    }
}

impl CircuitBreaker {
    /// Creates a new builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub(crate) fn new(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();

        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let circuit = Circuit::new_with_atomic(&config, Arc::clone(&state_atomic), clock.now());

        #[cfg(feature = "metrics")]
        gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
            .set(CircuitState::Closed as u8 as f64);

        Self {
            shared: Arc::new(Shared {
                circuit: Mutex::new(circuit),
                state_atomic,
                config,
                clock,
            }),
        }
    }

    /// Returns the breaker name.
    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Returns the immutable configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.shared.config
    }

    /// Asks for admission and returns a permit for reporting the result.
    ///
    /// - Closed: always admitted.
    /// - Open: rejected until more than `reset_timeout` has passed since the
    ///   last failure; the first call after that moves the circuit to
    ///   half-open and is admitted.
    /// - Half-open: admitted. At most one probe at a time is the caller's
    ///   responsibility; `tripwire-fallback`'s executor enforces it.
    pub fn try_acquire(&self) -> Admission {
        let now = self.shared.clock.now();
        let (permitted, transition, state, epoch) = {
            let mut circuit = self.shared.circuit.lock();
            let (permitted, transition) = circuit.try_acquire(now, &self.shared.config);
            (permitted, transition, circuit.state(), circuit.epoch())
        };
        self.publish_transition(transition, now);

        let config = &self.shared.config;
        if permitted {
            #[cfg(feature = "tracing")]
            tracing::trace!(breaker = %config.name, state = %state, "circuit breaker permitted call");

            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallPermitted {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                    state,
                });

            Admission::Permitted(CallPermit {
                breaker: self.clone(),
                epoch,
                state,
            })
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(breaker = %config.name, "circuit breaker rejected call (circuit open)");

            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);

            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallRejected {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                });

            Admission::Rejected
        }
    }

    /// Returns whether a request may go to the dependency right now.
    pub fn allow_request(&self) -> bool {
        self.try_acquire().is_permitted()
    }

    /// Records a success regardless of when the call was admitted.
    ///
    /// Clears the failure window. In half-open, closes the circuit once the
    /// probe has lasted at least `min_half_open_duration`; an earlier success
    /// keeps the circuit half-open. Repeated calls while closed are no-ops.
    pub fn record_success(&self) {
        self.record(None, true);
    }

    /// Records a failure regardless of when the call was admitted.
    ///
    /// The failure is added to the window and the window is pruned. When
    /// closed, reaching `failure_threshold` opens the circuit. Any failure in
    /// half-open reopens it.
    pub fn record_failure(&self) {
        self.record(None, false);
    }

    fn record(&self, epoch: Option<u64>, success: bool) -> bool {
        let now = self.shared.clock.now();
        let config = &self.shared.config;

        let (applied, state, transition) = {
            let mut circuit = self.shared.circuit.lock();
            let state = circuit.state();
            if epoch.is_some_and(|epoch| epoch != circuit.epoch()) {
                (false, state, None)
            } else if success {
                (true, state, circuit.record_success(now, config))
            } else {
                (true, state, circuit.record_failure(now, config))
            }
        };

        if !applied {
            #[cfg(feature = "tracing")]
            tracing::debug!(breaker = %config.name, state = %state, "discarding result of a call admitted before the last transition");

            config
                .event_listeners
                .emit(&CircuitBreakerEvent::StaleResultDiscarded {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                    state,
                });
            return false;
        }

        if success {
            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);

            config
                .event_listeners
                .emit(&CircuitBreakerEvent::SuccessRecorded {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                    state,
                });
        } else {
            #[cfg(feature = "metrics")]
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);

            config
                .event_listeners
                .emit(&CircuitBreakerEvent::FailureRecorded {
                    pattern_name: config.name.clone(),
                    timestamp: now,
                    state,
                });
        }

        self.publish_transition(transition, now);
        true
    }

    /// Administrative override: clears the window and closes the circuit.
    pub fn reset(&self) {
        let now = self.shared.clock.now();
        let transition = self.shared.circuit.lock().reset(now);
        self.publish_transition(transition, now);
    }

    /// Forces the circuit open as if a failure had just been recorded.
    pub fn force_open(&self) {
        let now = self.shared.clock.now();
        let transition = self.shared.circuit.lock().force_open(now);
        self.publish_transition(transition, now);
    }

    /// Forces the circuit half-open, starting a fresh probe.
    pub fn force_half_open(&self) {
        let now = self.shared.clock.now();
        let transition = self.shared.circuit.lock().force_half_open(now);
        self.publish_transition(transition, now);
    }

    /// Applies the OPEN -> HALF_OPEN timeout check and returns the resulting
    /// state.
    ///
    /// State transitions are evaluated lazily; no background timer moves an
    /// open circuit to half-open. This is the explicit tick.
    pub fn evaluate(&self) -> CircuitState {
        let now = self.shared.clock.now();
        let (state, transition) = {
            let mut circuit = self.shared.circuit.lock();
            let transition = circuit.evaluate(now, &self.shared.config);
            (circuit.state(), transition)
        };
        self.publish_transition(transition, now);
        state
    }

    /// Returns the current state after applying the timeout check, consistent
    /// with what [`allow_request`](Self::allow_request) would observe.
    pub fn current_state(&self) -> CircuitState {
        self.evaluate()
    }

    /// Returns the last committed state without evaluating timeouts.
    ///
    /// Lock-free; safe to call from metrics collectors and health checks.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state_atomic.load(Ordering::Acquire))
    }

    /// Returns whether the last committed state is open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns a consistent snapshot of the breaker.
    pub fn metrics(&self) -> CircuitMetrics {
        let now = self.shared.clock.now();
        self.shared
            .circuit
            .lock()
            .metrics(now, &self.shared.config)
    }

    /// Returns the instant of the failure that last opened the circuit.
    pub fn last_failure_time(&self) -> Option<Instant> {
        self.shared.circuit.lock().last_failure_time()
    }

    /// Returns an HTTP status code based on circuit state.
    ///
    /// - Closed: 200
    /// - HalfOpen: 200 (accepting probes)
    /// - Open: 503
    pub fn http_status(&self) -> u16 {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => 200,
            CircuitState::Open => 503,
        }
    }

    /// Returns "healthy", "degraded" or "unhealthy" for closed, half-open and
    /// open respectively.
    pub fn health_status(&self) -> &'static str {
        match self.state() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }

    /// Prunes expired failures from the window without changing state.
    pub fn sweep(&self) {
        let now = self.shared.clock.now();
        self.shared.circuit.lock().sweep(now);
    }

    /// Spawns a task that calls [`sweep`](Self::sweep) every `period`.
    ///
    /// The task only holds a weak reference and exits once every breaker
    /// handle has been dropped. Periods shorter than a millisecond are raised
    /// to one. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let period = period.max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                CircuitBreaker { shared }.sweep();
            }
        })
    }

    fn publish_transition(&self, transition: Option<Transition>, now: Instant) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        let config = &self.shared.config;

        #[cfg(feature = "tracing")]
        match to {
            CircuitState::Open => {
                tracing::warn!(breaker = %config.name, from = %from, to = %to, "circuit breaker opened")
            }
            _ => tracing::info!(breaker = %config.name, from = %from, to = %to, "circuit state transition"),
        }

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(to as u8 as f64);
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                pattern_name: config.name.clone(),
                timestamp: now,
                from_state: from,
                to_state: to,
            });
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.config.name)
            .field("state", &self.state())
            .finish()
    }
}
