//! Health accounting for a protected dependency.
//!
//! A [`ServiceMonitor`] counts how calls were answered: fresh from the
//! primary, degraded from the fallback, or not at all. Fallbacks count as
//! partial successes when computing the success rate.

use crate::error::ExecutorConfigError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tripwire_core::{SharedClock, SystemClock};

const DEFAULT_FALLBACK_WEIGHT: f64 = 0.7;
const DEFAULT_SAMPLE_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleKind {
    Success,
    Fallback,
    Error,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    kind: SampleKind,
}

#[derive(Debug, Default)]
struct Tally {
    successes: u64,
    fallbacks: u64,
    errors: u64,
    last_success: Option<Instant>,
    last_failure: Option<Instant>,
    last_response_time: Option<Duration>,
    samples: VecDeque<Sample>,
}

impl Tally {
    fn push(&mut self, at: Instant, kind: SampleKind, window: Duration) {
        self.samples.push_back(Sample { at, kind });
        self.prune(at, window);
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.samples.front() {
            if now.saturating_duration_since(oldest.at) > window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

fn weighted_rate(successes: u64, fallbacks: u64, errors: u64, weight: f64) -> Option<f64> {
    let total = successes + fallbacks + errors;
    if total == 0 {
        return None;
    }
    Some((successes as f64 + fallbacks as f64 * weight) / total as f64)
}

/// Point-in-time view of a [`ServiceMonitor`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MonitorSnapshot {
    /// Calls answered by the primary.
    pub successes: u64,
    /// Calls answered by the fallback.
    pub fallbacks: u64,
    /// Calls that could not be answered.
    pub errors: u64,
    /// Lifetime weighted success rate, `None` before the first call.
    pub success_rate: Option<f64>,
    /// Weighted success rate over the sample window.
    pub windowed_success_rate: Option<f64>,
    /// Duration of the last successful primary call.
    pub last_response_time: Option<Duration>,
    /// Time since the primary last succeeded.
    pub since_last_success: Option<Duration>,
    /// Time since a call last went unanswered.
    pub since_last_failure: Option<Duration>,
}

/// Result of [`ServiceMonitor::health`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorHealth {
    /// Nothing to report.
    Healthy,
    /// The windowed success rate fell below the minimum.
    LowSuccessRate(f64),
    /// The primary has not succeeded for longer than allowed.
    Silent(Duration),
}

/// Thread-safe call accounting, shared between clones.
#[derive(Clone)]
pub struct ServiceMonitor {
    tally: Arc<Mutex<Tally>>,
    fallback_weight: f64,
    sample_window: Duration,
    clock: SharedClock,
    created_at: Instant,
}

impl ServiceMonitor {
    /// Creates a monitor weighting fallbacks at 0.7 over a five minute
    /// window.
    pub fn new() -> Self {
        Self::build(
            DEFAULT_FALLBACK_WEIGHT,
            DEFAULT_SAMPLE_WINDOW,
            SystemClock::shared(),
        )
    }

    /// Creates a monitor with a custom fallback weight and sample window.
    pub fn with_settings(
        fallback_weight: f64,
        sample_window: Duration,
    ) -> Result<Self, ExecutorConfigError> {
        if !(0.0..=1.0).contains(&fallback_weight) {
            return Err(ExecutorConfigError::FallbackWeightOutOfRange(
                fallback_weight,
            ));
        }
        if sample_window.is_zero() {
            return Err(ExecutorConfigError::NonPositiveSampleWindow(sample_window));
        }
        Ok(Self::build(
            fallback_weight,
            sample_window,
            SystemClock::shared(),
        ))
    }

    fn build(fallback_weight: f64, sample_window: Duration, clock: SharedClock) -> Self {
        let created_at = clock.now();
        Self {
            tally: Arc::new(Mutex::new(Tally::default())),
            fallback_weight,
            sample_window,
            clock,
            created_at,
        }
    }

    /// Replaces the time source. The returned monitor starts empty.
    pub fn with_clock(self, clock: SharedClock) -> Self {
        Self::build(self.fallback_weight, self.sample_window, clock)
    }

    /// Records a primary success and how long it took.
    pub fn record_success(&self, response_time: Duration) {
        let now = self.clock.now();
        let mut tally = self.tally.lock();
        tally.successes += 1;
        tally.last_success = Some(now);
        tally.last_response_time = Some(response_time);
        tally.push(now, SampleKind::Success, self.sample_window);
    }

    /// Records a call answered by the fallback.
    pub fn record_fallback(&self) {
        let now = self.clock.now();
        let mut tally = self.tally.lock();
        tally.fallbacks += 1;
        tally.push(now, SampleKind::Fallback, self.sample_window);
    }

    /// Records a call that could not be answered at all.
    pub fn record_error(&self) {
        let now = self.clock.now();
        let mut tally = self.tally.lock();
        tally.errors += 1;
        tally.last_failure = Some(now);
        tally.push(now, SampleKind::Error, self.sample_window);
    }

    /// Lifetime weighted success rate, `None` before the first call.
    pub fn success_rate(&self) -> Option<f64> {
        let tally = self.tally.lock();
        weighted_rate(
            tally.successes,
            tally.fallbacks,
            tally.errors,
            self.fallback_weight,
        )
    }

    /// Weighted success rate over the sample window.
    pub fn windowed_success_rate(&self) -> Option<f64> {
        let now = self.clock.now();
        let mut tally = self.tally.lock();
        tally.prune(now, self.sample_window);
        self.windowed_rate(&tally)
    }

    fn windowed_rate(&self, tally: &Tally) -> Option<f64> {
        let (mut s, mut f, mut e) = (0, 0, 0);
        for sample in &tally.samples {
            match sample.kind {
                SampleKind::Success => s += 1,
                SampleKind::Fallback => f += 1,
                SampleKind::Error => e += 1,
            }
        }
        weighted_rate(s, f, e, self.fallback_weight)
    }

    /// Returns a consistent snapshot of all counters.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let now = self.clock.now();
        let mut tally = self.tally.lock();
        tally.prune(now, self.sample_window);

        MonitorSnapshot {
            successes: tally.successes,
            fallbacks: tally.fallbacks,
            errors: tally.errors,
            success_rate: weighted_rate(
                tally.successes,
                tally.fallbacks,
                tally.errors,
                self.fallback_weight,
            ),
            windowed_success_rate: self.windowed_rate(&tally),
            last_response_time: tally.last_response_time,
            since_last_success: tally
                .last_success
                .map(|at| now.saturating_duration_since(at)),
            since_last_failure: tally
                .last_failure
                .map(|at| now.saturating_duration_since(at)),
        }
    }

    /// Forgets everything recorded so far.
    pub fn reset(&self) {
        *self.tally.lock() = Tally::default();
    }

    /// Judges the dependency's health.
    ///
    /// A low rate is only reported once the window holds at least one sample.
    /// Silence is measured from the last primary success, or from the
    /// monitor's creation if there has been none.
    pub fn health(&self, min_success_rate: f64, max_silence: Duration) -> MonitorHealth {
        let now = self.clock.now();
        let mut tally = self.tally.lock();
        tally.prune(now, self.sample_window);

        if let Some(rate) = self.windowed_rate(&tally) {
            if rate < min_success_rate {
                return MonitorHealth::LowSuccessRate(rate);
            }
        }

        let silent_for = now.saturating_duration_since(tally.last_success.unwrap_or(self.created_at));
        if silent_for > max_silence {
            return MonitorHealth::Silent(silent_for);
        }

        MonitorHealth::Healthy
    }
}

impl Default for ServiceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMonitor")
            .field("fallback_weight", &self.fallback_weight)
            .field("sample_window", &self.sample_window)
            .finish()
    }
}

const MIN_CHECK_PERIOD: Duration = Duration::from_millis(1);

/// How often and against which limits [`spawn_health_reporter`] checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthCheck {
    /// Time between checks. Periods shorter than a millisecond are raised
    /// to one.
    pub period: Duration,
    /// Lowest acceptable windowed success rate.
    pub min_success_rate: f64,
    /// Longest acceptable time without a primary success.
    pub max_silence: Duration,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(60),
            min_success_rate: 0.6,
            max_silence: Duration::from_secs(5 * 60),
        }
    }
}

/// Periodically checks `monitor` and hands every unhealthy verdict to
/// `on_unhealthy` together with `name`.
///
/// With the `tracing` feature each verdict is also logged at `warn`. Must be
/// called from within a tokio runtime; abort the handle to stop reporting.
pub fn spawn_health_reporter<F>(
    name: impl Into<String>,
    monitor: ServiceMonitor,
    check: HealthCheck,
    on_unhealthy: F,
) -> JoinHandle<()>
where
    F: Fn(&str, MonitorHealth) + Send + 'static,
{
    let name = name.into();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(check.period.max(MIN_CHECK_PERIOD));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let health = monitor.health(check.min_success_rate, check.max_silence);
            match health {
                MonitorHealth::Healthy => continue,
                MonitorHealth::LowSuccessRate(_rate) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(service = %name, success_rate = _rate, "low success rate");
                }
                MonitorHealth::Silent(_elapsed) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(service = %name, silent_for = ?_elapsed, "no successful primary call recently");
                }
            }
            on_unhealthy(&name, health);
        }
    })
}
