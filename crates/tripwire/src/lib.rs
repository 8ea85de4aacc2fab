//! Circuit breaking and graceful degradation for async Rust services.
//!
//! `tripwire` protects a caller from a failing dependency. A circuit breaker
//! counts failures in a sliding time window and stops traffic once they
//! pile up; a protected executor runs each call under a timeout and answers
//! from a fallback whenever the dependency cannot.
//!
//! # Crates
//!
//! - **Circuit Breaker** (`circuitbreaker` feature): the breaker state
//!   machine, call permits and a Tower layer
//! - **Fallback** (`fallback` feature): fallback providers, the protected
//!   executor, the service monitor and a Tower layer
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! tripwire = { version = "0.1", features = ["full"] }
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "full")]
//! # {
//! use std::time::Duration;
//! use tripwire::circuitbreaker::CircuitBreaker;
//! use tripwire::fallback::{CachedFallback, ProtectedExecutor};
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::builder()
//!     .name("inventory")
//!     .failure_threshold(3)
//!     .reset_timeout(Duration::from_secs(5))
//!     .window_size(Duration::from_secs(60))
//!     .build()
//!     .unwrap();
//!
//! let executor = ProtectedExecutor::builder()
//!     .call_timeout(Duration::from_secs(2))
//!     .build(breaker)
//!     .unwrap();
//!
//! let stock = CachedFallback::seeded(0u32);
//! let count = executor
//!     .execute(|| async { Ok::<_, std::io::Error>(12u32) }, &stock)
//!     .await
//!     .unwrap();
//! # }
//! # }
//! ```
//!
//! See the [`patterns`] module for guidance on choosing thresholds.

pub mod patterns;

pub use tripwire_core as core;

#[cfg(feature = "circuitbreaker")]
pub use tripwire_circuitbreaker as circuitbreaker;

#[cfg(feature = "fallback")]
pub use tripwire_fallback as fallback;
