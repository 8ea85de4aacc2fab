//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - A closed circuit never holds `failure_threshold` failures in its window
//! - The window counts exactly the failures since the last success that are
//!   no older than `window_size`
//! - Only legal transitions are ever taken
//! - Moving from open to half-open empties the window
//! - An open circuit rejects until the reset timeout has passed

use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tripwire_circuitbreaker::{CircuitBreaker, CircuitState};
use tripwire_core::ManualClock;

#[derive(Debug, Clone)]
enum Op {
    Fail,
    Succeed,
    Acquire,
    Advance(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Fail),
        1 => Just(Op::Succeed),
        2 => Just(Op::Acquire),
        2 => (0u64..4_000).prop_map(Op::Advance),
    ]
}

fn legal(from: CircuitState, to: CircuitState) -> bool {
    matches!(
        (from, to),
        (CircuitState::Closed, CircuitState::Open)
            | (CircuitState::Open, CircuitState::HalfOpen)
            | (CircuitState::HalfOpen, CircuitState::Open)
            | (CircuitState::HalfOpen, CircuitState::Closed)
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn breaker_invariants_hold(
        threshold in 1usize..=5,
        window_ms in 1_000u64..=10_000,
        reset_ms in 500u64..=5_000,
        min_half_open_ms in 0u64..=3_000,
        ops in prop::collection::vec(op(), 1..200),
    ) {
        let clock = ManualClock::new();
        let transitions = Arc::new(Mutex::new(Vec::new()));
        let t = Arc::clone(&transitions);

        let cb = CircuitBreaker::builder()
            .failure_threshold(threshold)
            .window_size(Duration::from_millis(window_ms))
            .reset_timeout(Duration::from_millis(reset_ms))
            .min_half_open_duration(Duration::from_millis(min_half_open_ms))
            .clock(clock.shared())
            .on_state_transition(move |from, to| t.lock().unwrap().push((from, to)))
            .build()
            .unwrap();

        // Failure offsets in ms since start, cleared on success.
        let mut model: Vec<u64> = Vec::new();
        let mut now_ms = 0u64;

        for op in ops {
            match op {
                Op::Fail => {
                    cb.record_failure();
                    model.push(now_ms);
                }
                Op::Succeed => {
                    cb.record_success();
                    model.clear();
                }
                Op::Acquire => {
                    let was_open = cb.state() == CircuitState::Open;
                    let since_failure = cb.metrics().time_since_last_failure;
                    let permitted = cb.allow_request();
                    if was_open {
                        let expired = since_failure
                            .map_or(true, |elapsed| elapsed > Duration::from_millis(reset_ms));
                        prop_assert_eq!(permitted, expired);
                        if permitted {
                            // Entering half-open starts the probe with an empty window.
                            prop_assert_eq!(cb.state(), CircuitState::HalfOpen);
                            model.clear();
                        }
                    } else {
                        prop_assert!(permitted);
                    }
                }
                Op::Advance(ms) => {
                    clock.advance(Duration::from_millis(ms));
                    now_ms += ms;
                }
            }

            let metrics = cb.metrics();
            let expected = model.iter().filter(|&&at| now_ms - at <= window_ms).count();
            prop_assert_eq!(metrics.failures_in_window, expected);
            prop_assert_eq!(metrics.state, cb.state());
            if metrics.state == CircuitState::Closed {
                prop_assert!(metrics.failures_in_window < threshold);
            }
        }

        for (from, to) in transitions.lock().unwrap().iter() {
            prop_assert!(legal(*from, *to), "illegal transition {} -> {}", from, to);
        }
    }

    #[test]
    fn threshold_failures_in_quick_succession_always_open(
        threshold in 1usize..=20,
        gap_ms in 0u64..=100,
    ) {
        let clock = ManualClock::new();
        let cb = CircuitBreaker::builder()
            .failure_threshold(threshold)
            .window_size(Duration::from_secs(60))
            .clock(clock.shared())
            .build()
            .unwrap();

        for i in 0..threshold {
            prop_assert_eq!(cb.state(), CircuitState::Closed, "opened early at failure {}", i);
            cb.record_failure();
            clock.advance(Duration::from_millis(gap_ms));
        }
        prop_assert_eq!(cb.state(), CircuitState::Open);
    }
}
