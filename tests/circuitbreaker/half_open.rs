use super::{breaker, millis, recording_breaker, secs};
use std::time::Duration;
use tripwire_circuitbreaker::{CircuitBreaker, CircuitState};
use tripwire_core::ManualClock;

fn tripped_into_half_open(min_half_open: Duration) -> (CircuitBreaker, ManualClock) {
    let (cb, clock) = breaker(3, secs(5), secs(60), min_half_open);
    cb.force_open();
    clock.advance(millis(5_001));
    assert_eq!(cb.evaluate(), CircuitState::HalfOpen);
    (cb, clock)
}

#[test]
fn any_failure_in_half_open_reopens_regardless_of_threshold() {
    let (cb, _clock) = tripped_into_half_open(secs(30));

    cb.record_failure();
    assert_eq!(cb.state(), CircuitState::Open);
    assert!(!cb.allow_request());
}

#[test]
fn reopened_circuit_waits_a_full_reset_timeout() {
    let (cb, clock) = tripped_into_half_open(secs(30));

    clock.advance(secs(1));
    cb.record_failure();

    clock.advance(secs(4));
    assert!(!cb.allow_request());
    clock.advance(secs(2));
    assert!(cb.allow_request());
}

#[test]
fn half_open_admits_every_caller() {
    let (cb, _clock) = tripped_into_half_open(secs(30));

    for _ in 0..5 {
        assert!(cb.allow_request());
    }
    assert_eq!(cb.state(), CircuitState::HalfOpen);
}

#[test]
fn zero_min_duration_closes_on_first_success() {
    let (cb, _clock) = tripped_into_half_open(Duration::ZERO);

    cb.record_success();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn half_open_elapsed_is_reported_while_probing() {
    let (cb, clock) = tripped_into_half_open(secs(30));

    clock.advance(secs(12));
    assert_eq!(cb.metrics().half_open_elapsed, Some(secs(12)));

    clock.advance(secs(20));
    cb.record_success();
    assert_eq!(cb.metrics().half_open_elapsed, None);
}

#[test]
fn success_then_failure_in_half_open_reopens() {
    let (cb, clock, transitions) = recording_breaker(1, secs(30));

    cb.record_failure();
    clock.advance(secs(6));
    assert!(cb.allow_request());

    cb.record_success();
    cb.record_failure();

    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(
        transitions.lock().unwrap().last(),
        Some(&(CircuitState::HalfOpen, CircuitState::Open))
    );
}
