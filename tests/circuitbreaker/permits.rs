use super::{breaker, secs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tripwire_circuitbreaker::{Admission, CircuitBreaker, CircuitBreakerEvent, CircuitState};
use tripwire_core::{ManualClock, ResilienceEvent};

#[test]
fn rejected_admission_carries_no_permit() {
    let (cb, _clock) = breaker(1, secs(5), secs(60), secs(30));
    cb.force_open();

    let admission = cb.try_acquire();
    assert!(!admission.is_permitted());
    assert!(matches!(admission, Admission::Rejected));
}

#[test]
fn late_failure_from_before_half_open_is_discarded() {
    let (cb, clock) = breaker(1, secs(5), secs(60), secs(30));

    let slow = cb.try_acquire().into_permit().unwrap();
    cb.record_failure();
    clock.advance(secs(6));
    assert_eq!(cb.evaluate(), CircuitState::HalfOpen);

    // A failure from the closed era must not knock the probe back open.
    assert!(!slow.record_failure());
    assert_eq!(cb.state(), CircuitState::HalfOpen);
}

#[test]
fn permits_issued_in_the_same_state_all_apply() {
    let (cb, _clock) = breaker(3, secs(5), secs(60), secs(30));

    let permits: Vec<_> = (0..3)
        .map(|_| cb.try_acquire().into_permit().unwrap())
        .collect();

    let applied: Vec<bool> = permits.into_iter().map(|p| p.record_failure()).collect();

    // The third failure opens the circuit; all three were admitted while closed.
    assert_eq!(applied, vec![true, true, true]);
    assert_eq!(cb.state(), CircuitState::Open);
}

#[test]
fn events_describe_each_step() {
    let clock = ManualClock::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let e = Arc::clone(&events);

    let cb = CircuitBreaker::builder()
        .name("events")
        .failure_threshold(1)
        .clock(clock.shared())
        .on_event(move |event: &CircuitBreakerEvent| {
            e.lock().unwrap().push(event.event_type());
        })
        .build()
        .unwrap();

    let stale = cb.try_acquire().into_permit().unwrap();
    cb.try_acquire().into_permit().unwrap().record_failure();
    stale.record_success();
    cb.allow_request();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "call_permitted",
            "call_permitted",
            "failure_recorded",
            "state_transition",
            "stale_result_discarded",
            "call_rejected",
        ]
    );
}

#[test]
fn events_carry_the_breaker_name() {
    let clock = ManualClock::new();
    let names = Arc::new(Mutex::new(Vec::new()));
    let n = Arc::clone(&names);

    let cb = CircuitBreaker::builder()
        .name("named")
        .clock(clock.shared())
        .on_event(move |event: &CircuitBreakerEvent| {
            n.lock().unwrap().push(event.pattern_name().to_string());
        })
        .build()
        .unwrap();

    cb.record_success();
    assert_eq!(*names.lock().unwrap(), vec!["named".to_string()]);
}

#[test]
fn hooks_see_the_state_a_result_was_recorded_in() {
    let clock = ManualClock::new();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let successes = Arc::new(Mutex::new(Vec::new()));
    let rejections = Arc::new(AtomicUsize::new(0));

    let f = Arc::clone(&failures);
    let s = Arc::clone(&successes);
    let r = Arc::clone(&rejections);
    let cb = CircuitBreaker::builder()
        .failure_threshold(1)
        .reset_timeout(secs(5))
        .min_half_open_duration(Duration::ZERO)
        .clock(clock.shared())
        .on_failure(move |state| f.lock().unwrap().push(state))
        .on_success(move |state| s.lock().unwrap().push(state))
        .on_call_rejected(move || {
            r.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    cb.record_failure();
    cb.allow_request();
    clock.advance(secs(6));
    cb.allow_request();
    cb.record_success();

    assert_eq!(*failures.lock().unwrap(), vec![CircuitState::Closed]);
    assert_eq!(*successes.lock().unwrap(), vec![CircuitState::HalfOpen]);
    assert_eq!(rejections.load(Ordering::SeqCst), 1);
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[test]
fn force_open_restarts_the_reset_timeout() {
    let (cb, clock) = breaker(1, secs(5), secs(60), secs(30));

    cb.record_failure();
    clock.advance(secs(4));
    cb.force_open();

    clock.advance(secs(4));
    assert!(!cb.allow_request());
    clock.advance(secs(2));
    assert!(cb.allow_request());
}

#[test]
fn reset_discards_outstanding_permits() {
    let (cb, _clock) = breaker(2, secs(5), secs(60), secs(30));

    let permit = cb.try_acquire().into_permit().unwrap();
    cb.force_open();
    cb.reset();

    assert!(!permit.record_failure());
    assert_eq!(cb.metrics().failures_in_window, 0);
}
