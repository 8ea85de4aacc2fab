use super::{breaker, millis, recording_breaker, secs};
use std::time::Duration;
use tripwire_circuitbreaker::CircuitState;
use tripwire_core::Clock;

/// One failure with threshold 1 opens; the reset timeout lets a probe through.
#[test]
fn single_failure_opens_then_probes_after_reset_timeout() {
    let (cb, clock) = breaker(1, secs(5), secs(60), secs(30));

    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);
    assert!(!cb.allow_request());

    clock.advance(millis(5_100));
    assert!(cb.allow_request());
    assert_eq!(cb.state(), CircuitState::HalfOpen);
}

/// Failures that age out of the window never reset an open circuit.
#[test]
fn pruned_window_does_not_disturb_open_state() {
    let (cb, clock) = breaker(3, secs(5), secs(10), secs(30));
    let t0 = clock.now();

    cb.record_failure();
    clock.advance(secs(3));
    cb.record_failure();
    clock.advance(secs(3));
    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);
    let opened_at = cb.last_failure_time().unwrap();
    assert_eq!(opened_at - t0, secs(6));

    clock.advance(secs(14));
    cb.record_failure();

    assert_eq!(cb.state(), CircuitState::Open);
    // Only the t=20 failure is left, below threshold, so the deadline stays put.
    assert_eq!(cb.last_failure_time(), Some(opened_at));
    assert_eq!(cb.metrics().failures_in_window, 1);
}

/// An early success keeps the circuit half-open; a later one closes it.
#[test]
fn half_open_closes_only_after_sustained_success() {
    let (cb, clock, transitions) = recording_breaker(1, secs(30));

    cb.record_failure();
    clock.advance(millis(5_001));
    assert_eq!(cb.evaluate(), CircuitState::HalfOpen);

    cb.record_success();
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    clock.advance(secs(31));
    cb.record_success();
    assert_eq!(cb.state(), CircuitState::Closed);

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

#[test]
fn reset_timeout_boundary_is_exclusive() {
    let (cb, clock) = breaker(1, secs(5), secs(60), secs(30));

    cb.record_failure();
    clock.advance(secs(5));
    assert!(!cb.allow_request());
    assert_eq!(cb.current_state(), CircuitState::Open);

    clock.advance(Duration::from_nanos(1));
    assert!(cb.allow_request());
}

#[test]
fn success_while_closed_is_idempotent() {
    let (cb, _clock, transitions) = recording_breaker(3, secs(30));

    for _ in 0..10 {
        cb.record_success();
    }
    assert_eq!(cb.state(), CircuitState::Closed);
    assert!(transitions.lock().unwrap().is_empty());
}

#[test]
fn success_clears_failures_below_threshold() {
    let (cb, _clock) = breaker(3, secs(5), secs(60), secs(30));

    cb.record_failure();
    cb.record_failure();
    cb.record_success();
    cb.record_failure();
    cb.record_failure();

    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.metrics().failures_in_window, 2);
}

#[test]
fn full_round_trip() {
    let (cb, clock, transitions) = recording_breaker(2, Duration::ZERO);

    cb.record_failure();
    cb.record_failure();
    assert!(!cb.allow_request());

    clock.advance(secs(6));
    let permit = cb.try_acquire().into_permit().unwrap();
    assert_eq!(permit.admitted_in(), CircuitState::HalfOpen);
    assert!(permit.record_success());

    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(transitions.lock().unwrap().len(), 3);
    assert_eq!(cb.metrics().failures_in_window, 0);
}
