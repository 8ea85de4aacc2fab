use super::{breaker, millis, secs};
use tripwire_circuitbreaker::CircuitState;

#[test]
fn failures_spread_wider_than_window_never_open() {
    let (cb, clock) = breaker(3, secs(5), secs(10), secs(30));

    for _ in 0..20 {
        cb.record_failure();
        clock.advance(secs(6));
    }

    // At most two failures ever share a 10 second span.
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn failure_exactly_at_window_edge_still_counts() {
    let (cb, clock) = breaker(2, secs(5), secs(10), secs(30));

    cb.record_failure();
    clock.advance(secs(10));
    cb.record_failure();

    assert_eq!(cb.state(), CircuitState::Open);
}

#[test]
fn failure_just_past_window_edge_is_pruned() {
    let (cb, clock) = breaker(2, secs(5), secs(10), secs(30));

    cb.record_failure();
    clock.advance(millis(10_001));
    cb.record_failure();

    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.metrics().failures_in_window, 1);
}

#[test]
fn sweep_prunes_without_transitions() {
    let (cb, clock) = breaker(5, secs(5), secs(10), secs(30));

    cb.record_failure();
    cb.record_failure();
    clock.advance(secs(11));
    cb.sweep();

    let metrics = cb.metrics();
    assert_eq!(metrics.failures_in_window, 0);
    assert_eq!(metrics.state, CircuitState::Closed);
    assert_eq!(metrics.failure_threshold, 5);
}

#[test]
fn metrics_snapshot_tracks_time() {
    let (cb, clock) = breaker(1, secs(5), secs(60), secs(30));

    cb.record_failure();
    clock.advance(secs(2));

    let metrics = cb.metrics();
    assert_eq!(metrics.state, CircuitState::Open);
    assert_eq!(metrics.time_since_last_failure, Some(secs(2)));
    assert_eq!(metrics.time_since_state_change, secs(2));
    assert_eq!(metrics.half_open_elapsed, None);
}
