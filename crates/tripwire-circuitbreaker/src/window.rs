//! Time-bounded failure window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Failure timestamps observed within the last `window_size`.
///
/// Entries are kept in arrival order and evicted oldest-first. An entry
/// recorded at `t` is retained while `now - t <= window_size` and dropped as
/// soon as `now > t + window_size`. Every mutating call prunes first, so the
/// window never reports failures that have aged out.
///
/// The window has no interior synchronization; the circuit breaker guards it
/// together with the state it drives.
#[derive(Debug, Clone)]
pub(crate) struct FailureWindow {
    window_size: Duration,
    failures: VecDeque<Instant>,
}

impl FailureWindow {
    pub(crate) fn new(window_size: Duration) -> Self {
        Self {
            window_size,
            failures: VecDeque::new(),
        }
    }

    /// Records a failure at `now` and returns the pruned count.
    pub(crate) fn record(&mut self, now: Instant) -> usize {
        self.failures.push_back(now);
        self.prune(now);
        self.failures.len()
    }

    /// Drops every failure older than the window, relative to `now`.
    pub(crate) fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.failures.front() {
            // Timestamps from a clock that moved backwards are kept.
            if now.saturating_duration_since(*oldest) > self.window_size {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns the number of failures still inside the window at `now`.
    pub(crate) fn count(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.failures.len()
    }

    pub(crate) fn clear(&mut self) {
        self.failures.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}
