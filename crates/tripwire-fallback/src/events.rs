//! Events emitted by the protected executor.

use crate::FallbackReason;
use std::time::{Duration, Instant};
use tripwire_core::ResilienceEvent;

/// Events emitted by the protected executor.
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// The primary produced a value.
    PrimarySucceeded {
        /// Name of the executor.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the primary took.
        duration: Duration,
    },

    /// The primary failed, timed out, panicked or was cancelled.
    PrimaryFailed {
        /// Name of the executor.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// What went wrong.
        reason: FallbackReason,
        /// Whether the failure was recorded against the circuit breaker.
        recorded: bool,
    },

    /// The primary was skipped without being invoked.
    Rejected {
        /// Name of the executor.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// A fast-fail reason, see [`FallbackReason::is_fast_fail`].
        reason: FallbackReason,
    },

    /// The fallback produced a value.
    FallbackApplied {
        /// Name of the executor.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Why the primary was not used.
        reason: FallbackReason,
    },

    /// The fallback failed too; the caller gets `ServiceUnavailable`.
    FallbackFailed {
        /// Name of the executor.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Why the primary was not used.
        reason: FallbackReason,
    },
}

impl ResilienceEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::PrimarySucceeded { .. } => "primary_succeeded",
            Self::PrimaryFailed { .. } => "primary_failed",
            Self::Rejected { .. } => "rejected",
            Self::FallbackApplied { .. } => "fallback_applied",
            Self::FallbackFailed { .. } => "fallback_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::PrimarySucceeded { timestamp, .. }
            | Self::PrimaryFailed { timestamp, .. }
            | Self::Rejected { timestamp, .. }
            | Self::FallbackApplied { timestamp, .. }
            | Self::FallbackFailed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::PrimarySucceeded { pattern_name, .. }
            | Self::PrimaryFailed { pattern_name, .. }
            | Self::Rejected { pattern_name, .. }
            | Self::FallbackApplied { pattern_name, .. }
            | Self::FallbackFailed { pattern_name, .. } => pattern_name,
        }
    }
}
