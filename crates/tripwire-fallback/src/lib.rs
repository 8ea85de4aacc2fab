//! Protected calls with graceful degradation.
//!
//! A [`ProtectedExecutor`] runs a primary operation behind a
//! [`CircuitBreaker`](tripwire_circuitbreaker::CircuitBreaker), a call timeout
//! and a bounded worker pool. Whenever the primary cannot answer (open
//! circuit, saturated pool, error, timeout or panic) the call is answered by a
//! [`FallbackProvider`] instead. Only when the fallback fails too does the
//! caller see an error, [`ServiceUnavailable`].
//!
//! Successful primary results are offered to the fallback through
//! [`FallbackProvider::refresh`], so a [`CachedFallback`] always serves the
//! last good answer.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tripwire_circuitbreaker::CircuitBreaker;
//! use tripwire_fallback::{CachedFallback, Outcome, ProtectedExecutor};
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::builder()
//!     .name("profile")
//!     .failure_threshold(3)
//!     .build()
//!     .unwrap();
//! let executor = ProtectedExecutor::builder()
//!     .call_timeout(Duration::from_secs(2))
//!     .build(breaker)
//!     .unwrap();
//! let cache = CachedFallback::seeded("guest".to_string());
//!
//! let name = executor
//!     .execute_outcome(
//!         || async { Err::<String, _>(std::io::Error::other("connection reset")) },
//!         &cache,
//!     )
//!     .await
//!     .unwrap();
//!
//! assert!(name.is_fallback());
//! assert_eq!(name.into_inner(), "guest");
//! # }
//! ```
//!
//! # Fallback reasons
//!
//! [`FallbackReason::Rejected`], [`FallbackReason::Saturated`] and
//! [`FallbackReason::ProbeInFlight`] are deliberate fast-fails and never
//! count against the breaker. Timeouts and
//! panics always do. Primary errors count unless the executor was told
//! otherwise with
//! [`count_failures_when`](ExecutorConfigBuilder::count_failures_when).
//! A cancelled primary is never recorded.
//!
//! While the circuit is half-open the executor sends one call at a time to
//! the primary. Concurrent callers are served from the fallback with
//! [`FallbackReason::ProbeInFlight`] until the probe's task has finished.
//!
//! # Monitoring
//!
//! Attach a [`ServiceMonitor`] to track success, fallback and error counts
//! and a weighted success rate, and [`spawn_health_reporter`] to be told when
//! the dependency looks unhealthy.
//!
//! # Feature Flags
//! - `metrics`: call counters and primary latency histogram
//! - `tracing`: logs through the `tracing` crate
//! - `serde`: `GuardSettings` (de)serialization and `Serialize` for
//!   `MonitorSnapshot`

mod client;
mod config;
mod error;
mod events;
mod executor;
mod layer;
mod monitor;
mod outcome;
mod provider;

pub use client::{Dependency, ProtectedClient};
pub use config::{ErrorPredicate, ExecutorConfig, ExecutorConfigBuilder, GuardSettings};
pub use error::{BoxError, ExecutorConfigError, FallbackEmpty, ServiceUnavailable};
pub use events::FallbackEvent;
pub use executor::ProtectedExecutor;
pub use layer::{ProtectedCall, ProtectedCallLayer};
pub use monitor::{spawn_health_reporter, HealthCheck, MonitorHealth, MonitorSnapshot, ServiceMonitor};
pub use outcome::{FallbackReason, Outcome};
pub use provider::{CachedFallback, FallbackProvider, FnFallback, StaticFallback};

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    use metrics::{describe_counter, describe_histogram};

    METRICS_INIT.call_once(|| {
        describe_counter!(
            "fallback_calls_total",
            "Total number of protected calls by result and fallback reason"
        );
        describe_histogram!(
            "fallback_primary_duration_seconds",
            "Duration of successful primary calls"
        );
    });
}
