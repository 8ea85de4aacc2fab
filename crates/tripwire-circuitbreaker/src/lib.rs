//! A failure-counting circuit breaker.
//!
//! The breaker watches calls to one dependency and stops sending it traffic
//! once `failure_threshold` failures land inside a sliding time window.
//!
//! ## States
//! - **Closed**: calls flow; failures are counted in the window
//! - **Open**: calls are rejected until `reset_timeout` has passed since the
//!   last failure
//! - **Half-Open**: calls flow as probes; any failure reopens the circuit and
//!   the circuit only closes after successes sustained for
//!   `min_half_open_duration`
//!
//! Transitions out of open are evaluated lazily, on the next admission check
//! or an explicit [`CircuitBreaker::evaluate`]; no timer runs in the
//! background.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use tripwire_circuitbreaker::{Admission, CircuitBreaker, CircuitState};
//!
//! let breaker = CircuitBreaker::builder()
//!     .name("payments")
//!     .failure_threshold(3)
//!     .reset_timeout(Duration::from_secs(5))
//!     .window_size(Duration::from_secs(60))
//!     .build()
//!     .unwrap();
//!
//! match breaker.try_acquire() {
//!     Admission::Permitted(permit) => {
//!         // call the dependency, then report what happened
//!         permit.record_failure();
//!     }
//!     Admission::Rejected => {
//!         // serve a fallback
//!     }
//! }
//!
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! ```
//!
//! ### As Tower middleware
//!
//! ```rust
//! use tower::{Service, ServiceBuilder, ServiceExt, service_fn};
//! use tripwire_circuitbreaker::{CircuitBreaker, CircuitBreakerError};
//!
//! # async fn example() {
//! let layer = CircuitBreaker::builder().name("search").build_layer().unwrap();
//! let mut service = ServiceBuilder::new()
//!     .layer(layer)
//!     .service(service_fn(|q: String| async move { Ok::<_, std::io::Error>(q) }));
//!
//! match service.ready().await.unwrap().call("rust".to_string()).await {
//!     Ok(hits) => println!("{hits}"),
//!     Err(CircuitBreakerError::OpenCircuit) => eprintln!("search is down"),
//!     Err(CircuitBreakerError::Inner(e)) => eprintln!("search failed: {e}"),
//! }
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: call, transition and state metrics through the `metrics` crate
//! - `tracing`: logs through the `tracing` crate
//! - `serde`: `Serialize` for `CircuitState` and `CircuitMetrics`

pub use breaker::{Admission, CallPermit, CircuitBreaker};
pub use circuit::{CircuitMetrics, CircuitState};
pub use classifier::{DefaultClassifier, FailureClassifier, FnClassifier};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::{CircuitBreakerError, ConfigError};
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;
pub use service::CircuitBreakerService;

mod breaker;
mod circuit;
pub mod classifier;
mod config;
mod error;
mod events;
mod layer;
mod service;
mod window;

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    use metrics::{describe_counter, describe_gauge};

    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Total number of calls through the circuit breaker"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker (0 = closed, 1 = open, 2 = half-open)"
        );
    });
}
