//! # Pattern Guides
//!
//! When to reach for each piece, and how to tune it.
//!
//! - [Circuit Breaker](circuit_breaker) - Stop calling a failing dependency
//! - [Fallback](fallback) - Answer from a cheaper source when the primary cannot

/// Circuit Breaker pattern guide
pub mod circuit_breaker {
    //! # Circuit Breaker
    //!
    //! Stops sending traffic to a dependency once `failure_threshold`
    //! failures land within `window_size`, and lets probes through again
    //! after `reset_timeout`.
    //!
    //! ## When to Use
    //!
    //! - Remote calls that can hang or fail for minutes at a time
    //! - Dependencies whose failures cost you threads, sockets or latency
    //! - Anywhere retries would only add load to a struggling service
    //!
    //! ## Tuning
    //!
    //! | Knob | Too low | Too high |
    //! |------|---------|----------|
    //! | `failure_threshold` | Opens on noise | Keeps hammering a dead service |
    //! | `window_size` | Slow trickles of failures never add up | Old failures linger |
    //! | `reset_timeout` | Probes a service that is still down | Recovers slowly |
    //! | `min_half_open_duration` | Flaps between open and closed | Stays degraded long after recovery |
    //!
    //! A success in half-open only closes the circuit once the probe has
    //! lasted `min_half_open_duration`; any failure in half-open reopens it.
    //! Set the duration to zero to close on the first successful probe.
    //!
    //! ## Anti-Patterns
    //!
    //! - One breaker per request: state must be shared by every caller of a
    //!   dependency, so build the breaker once and clone the handle
    //! - Counting client errors: a validation failure says nothing about the
    //!   dependency; use a classifier to forgive it
}

/// Fallback pattern guide
pub mod fallback {
    //! # Fallback
    //!
    //! Serves a degraded answer instead of an error when the primary is
    //! rejected, saturated, failing, slow or panicking.
    //!
    //! ## Choosing a Provider
    //!
    //! - `StaticFallback`: a safe default such as an empty list
    //! - `CachedFallback`: the last good answer, refreshed on every primary
    //!   success
    //! - `FnFallback`: anything else, such as reading a local replica
    //!
    //! ## Call Timeouts
    //!
    //! A primary that misses `call_timeout` is abandoned, not killed. It keeps
    //! its worker slot until it finishes, so size `max_concurrent_calls` for
    //! the slowest calls you expect to abandon.
    //!
    //! ## Watching Degradation
    //!
    //! `Outcome::Fallback` tells a caller it got a stale answer. A
    //! `ServiceMonitor` with a health reporter tells an operator that too
    //! many answers were stale.
}
