use crate::config::CircuitBreakerConfig;
use crate::window::FailureWindow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and probe calls are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Returns a stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of circuit breaker metrics for observability.
///
/// All fields come from one critical section, so they describe a single
/// consistent point in time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitMetrics {
    /// Current state of the circuit breaker.
    pub state: CircuitState,
    /// Failures still inside the sliding window.
    pub failures_in_window: usize,
    /// Failures needed inside the window to open the circuit.
    pub failure_threshold: usize,
    /// Time since the failure that last opened (or re-opened) the circuit.
    pub time_since_last_failure: Option<Duration>,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
    /// Time spent probing, present only while half-open.
    pub half_open_elapsed: Option<Duration>,
}

/// A state change produced by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
}

/// Present only while the circuit is half-open.
#[derive(Debug, Clone, Copy)]
struct HalfOpenProbe {
    started_at: Instant,
}

/// The breaker state machine.
///
/// Every method takes `now` explicitly and returns the transition it caused,
/// if any. Callers hold the breaker lock across the call so the window update
/// and the resulting transition form one atomic step.
pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    window: FailureWindow,
    last_failure_time: Option<Instant>,
    probe: Option<HalfOpenProbe>,
    last_state_change: Instant,
    epoch: u64,
}

impl Circuit {
    pub(crate) fn new_with_atomic(
        config: &CircuitBreakerConfig,
        state_atomic: Arc<AtomicU8>,
        now: Instant,
    ) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            window: FailureWindow::new(config.window_size),
            last_failure_time: None,
            probe: None,
            last_state_change: now,
            epoch: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn new(config: &CircuitBreakerConfig, now: Instant) -> Self {
        Self::new_with_atomic(config, Arc::new(AtomicU8::new(0)), now)
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    /// Bumped on every transition; lets permits detect stale results.
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn last_failure_time(&self) -> Option<Instant> {
        self.last_failure_time
    }

    fn reset_timeout_elapsed(&self, now: Instant, config: &CircuitBreakerConfig) -> bool {
        match self.last_failure_time {
            Some(at) => now.saturating_duration_since(at) > config.reset_timeout,
            None => true,
        }
    }

    /// Applies the lazy OPEN -> HALF_OPEN timeout check.
    pub(crate) fn evaluate(
        &mut self,
        now: Instant,
        config: &CircuitBreakerConfig,
    ) -> Option<Transition> {
        if self.state == CircuitState::Open && self.reset_timeout_elapsed(now, config) {
            Some(self.transition_to(CircuitState::HalfOpen, now))
        } else {
            None
        }
    }

    /// Admission decision. Half-open admits every caller; limiting probes to
    /// one at a time is up to the caller.
    pub(crate) fn try_acquire(
        &mut self,
        now: Instant,
        config: &CircuitBreakerConfig,
    ) -> (bool, Option<Transition>) {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => (true, None),
            CircuitState::Open => {
                let transition = self.evaluate(now, config);
                (transition.is_some(), transition)
            }
        }
    }

    pub(crate) fn record_success(
        &mut self,
        now: Instant,
        config: &CircuitBreakerConfig,
    ) -> Option<Transition> {
        self.window.clear();

        match (self.state, self.probe) {
            (CircuitState::HalfOpen, Some(probe))
                if now.saturating_duration_since(probe.started_at)
                    >= config.min_half_open_duration =>
            {
                Some(self.transition_to(CircuitState::Closed, now))
            }
            _ => None,
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        now: Instant,
        config: &CircuitBreakerConfig,
    ) -> Option<Transition> {
        let failures = self.window.record(now);

        match self.state {
            CircuitState::HalfOpen => {
                self.last_failure_time = Some(now);
                Some(self.transition_to(CircuitState::Open, now))
            }
            CircuitState::Closed if failures >= config.failure_threshold => {
                self.last_failure_time = Some(now);
                Some(self.transition_to(CircuitState::Open, now))
            }
            CircuitState::Open if failures >= config.failure_threshold => {
                // Still failing hard: push the reset deadline out.
                self.last_failure_time = Some(now);
                None
            }
            _ => None,
        }
    }

    /// Administrative override: closes the circuit and forgets all failures.
    pub(crate) fn reset(&mut self, now: Instant) -> Option<Transition> {
        self.window.clear();
        self.last_failure_time = None;
        if self.state == CircuitState::Closed {
            None
        } else {
            Some(self.transition_to(CircuitState::Closed, now))
        }
    }

    pub(crate) fn force_open(&mut self, now: Instant) -> Option<Transition> {
        self.last_failure_time = Some(now);
        if self.state == CircuitState::Open {
            None
        } else {
            Some(self.transition_to(CircuitState::Open, now))
        }
    }

    pub(crate) fn force_half_open(&mut self, now: Instant) -> Option<Transition> {
        if self.state == CircuitState::HalfOpen {
            None
        } else {
            Some(self.transition_to(CircuitState::HalfOpen, now))
        }
    }

    pub(crate) fn sweep(&mut self, now: Instant) {
        self.window.prune(now);
    }

    pub(crate) fn metrics(&mut self, now: Instant, config: &CircuitBreakerConfig) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            failures_in_window: self.window.count(now),
            failure_threshold: config.failure_threshold,
            time_since_last_failure: self
                .last_failure_time
                .map(|at| now.saturating_duration_since(at)),
            time_since_state_change: now.saturating_duration_since(self.last_state_change),
            half_open_elapsed: self
                .probe
                .map(|probe| now.saturating_duration_since(probe.started_at)),
        }
    }

    fn transition_to(&mut self, state: CircuitState, now: Instant) -> Transition {
        let from = self.state;

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = now;
        self.epoch = self.epoch.wrapping_add(1);

        match state {
            CircuitState::HalfOpen => {
                self.window.clear();
                self.probe = Some(HalfOpenProbe { started_at: now });
            }
            CircuitState::Closed | CircuitState::Open => {
                self.probe = None;
            }
        }

        Transition { from, to: state }
    }
}
