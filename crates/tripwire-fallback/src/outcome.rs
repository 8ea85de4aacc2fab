use std::fmt;

/// Why a call was served by the fallback instead of the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    /// The circuit was open; the primary was never invoked.
    Rejected,
    /// Every worker slot was busy; the primary was never invoked.
    Saturated,
    /// The circuit is half-open and another call is already probing the
    /// primary; the primary was never invoked.
    ProbeInFlight,
    /// The primary returned an error.
    Failed,
    /// The primary did not finish within the call timeout.
    TimedOut,
    /// The primary panicked.
    Panicked,
    /// The primary's task was cancelled before it produced a result.
    Cancelled,
}

impl FallbackReason {
    /// Returns a stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::Rejected => "rejected",
            FallbackReason::Saturated => "saturated",
            FallbackReason::ProbeInFlight => "probe_in_flight",
            FallbackReason::Failed => "failed",
            FallbackReason::TimedOut => "timed_out",
            FallbackReason::Panicked => "panicked",
            FallbackReason::Cancelled => "cancelled",
        }
    }

    /// Returns true if the primary was skipped as a deliberate fast-fail
    /// rather than because it misbehaved.
    pub fn is_fast_fail(&self) -> bool {
        matches!(
            self,
            FallbackReason::Rejected | FallbackReason::Saturated | FallbackReason::ProbeInFlight
        )
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FallbackReason::Rejected => "rejected by open circuit",
            FallbackReason::Saturated => "rejected by saturated worker pool",
            FallbackReason::ProbeInFlight => "rejected while a recovery probe is in flight",
            FallbackReason::Failed => "failed",
            FallbackReason::TimedOut => "timed out",
            FallbackReason::Panicked => "panicked",
            FallbackReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// A value together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Fresh from the primary.
    Primary(T),
    /// Served by the fallback provider.
    Fallback {
        /// The fallback value.
        value: T,
        /// Why the primary was not used.
        reason: FallbackReason,
    },
}

impl<T> Outcome<T> {
    /// Discards the provenance.
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Primary(value) | Outcome::Fallback { value, .. } => value,
        }
    }

    /// Returns a reference to the value.
    pub fn value(&self) -> &T {
        match self {
            Outcome::Primary(value) | Outcome::Fallback { value, .. } => value,
        }
    }

    /// Returns true if the value is degraded.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::Fallback { .. })
    }

    /// Returns the fallback reason, if the fallback was used.
    pub fn reason(&self) -> Option<FallbackReason> {
        match self {
            Outcome::Primary(_) => None,
            Outcome::Fallback { reason, .. } => Some(*reason),
        }
    }
}
