use super::{executor, recording_executor, TestError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tripwire_circuitbreaker::CircuitState;
use tripwire_fallback::{
    BoxError, FallbackEvent, FallbackReason, FnFallback, Outcome, ProtectedExecutor,
    StaticFallback,
};

/// A failing primary is answered by the fallback and its error never escapes.
#[tokio::test]
async fn failing_primary_is_absorbed_by_fallback() {
    let executor = executor("orders", 3);
    let fallback = StaticFallback::new(vec!["cached order".to_string()]);

    let orders = executor
        .execute(
            || async { Err::<Vec<String>, _>(TestError::new("connection reset")) },
            &fallback,
        )
        .await
        .unwrap();

    assert_eq!(orders, vec!["cached order".to_string()]);
    assert_eq!(executor.breaker().metrics().failures_in_window, 1);
}

#[tokio::test]
async fn healthy_primary_answers_directly() {
    let executor = executor("orders", 3);
    let fallback = StaticFallback::new(0u32);

    let outcome = executor
        .execute_outcome(|| async { Ok::<_, TestError>(7u32) }, &fallback)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Primary(7));
    assert!(!outcome.is_fallback());
    assert_eq!(outcome.reason(), None);
}

#[tokio::test]
async fn open_circuit_skips_primary_entirely() {
    let executor = executor("orders", 2);
    let fallback = StaticFallback::new("degraded");
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let c = Arc::clone(&calls);
        let _ = executor
            .execute(
                move || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<&str, _>(TestError::new("down"))
                },
                &fallback,
            )
            .await
            .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(executor.breaker().state(), CircuitState::Open);

    let outcome = executor
        .execute_outcome(|| async { Ok::<_, TestError>("fresh") }, &fallback)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Fallback {
            value: "degraded",
            reason: FallbackReason::Rejected
        }
    );
}

#[tokio::test]
async fn panicking_primary_counts_as_failure() {
    let (executor, events) = recording_executor("panics", 1);
    let fallback = StaticFallback::new(1u8);

    let outcome = executor
        .execute_outcome(
            || async {
                if true {
                    panic!("primary bug");
                }
                Ok::<u8, TestError>(0)
            },
            &fallback,
        )
        .await
        .unwrap();

    assert_eq!(outcome.reason(), Some(FallbackReason::Panicked));
    assert_eq!(executor.breaker().state(), CircuitState::Open);
    assert!(events.lock().unwrap().iter().any(|e| matches!(
        e,
        FallbackEvent::PrimaryFailed {
            reason: FallbackReason::Panicked,
            recorded: true,
            ..
        }
    )));
}

#[tokio::test]
async fn uncounted_errors_still_use_fallback_but_record_nothing() {
    let breaker = super::breaker("validation", 1);
    let executor = ProtectedExecutor::builder()
        .count_failures_when(|err| {
            err.downcast_ref::<TestError>()
                .map_or(true, |e| e.code >= 500)
        })
        .build(breaker)
        .unwrap();
    let fallback = StaticFallback::new("default");

    for _ in 0..3 {
        let outcome = executor
            .execute_outcome(
                || async { Err::<&str, _>(TestError::client("bad sku")) },
                &fallback,
            )
            .await
            .unwrap();
        assert_eq!(outcome.reason(), Some(FallbackReason::Failed));
    }

    assert_eq!(executor.breaker().state(), CircuitState::Closed);
    assert_eq!(executor.breaker().metrics().failures_in_window, 0);
}

#[tokio::test]
async fn half_open_probe_recovers_the_circuit() {
    let executor = executor("recovering", 1);
    let fallback = FnFallback::new(|| Ok::<_, BoxError>(0u64));

    let _ = executor
        .execute(|| async { Err::<u64, _>(TestError::new("down")) }, &fallback)
        .await;
    assert_eq!(executor.current_state(), CircuitState::Open);

    tokio::time::sleep(std::time::Duration::from_millis(1_100)).await;

    let value = executor
        .execute(|| async { Ok::<_, TestError>(99u64) }, &fallback)
        .await
        .unwrap();
    assert_eq!(value, 99);
    assert_eq!(executor.current_state(), CircuitState::Closed);
}

#[tokio::test]
async fn blocking_primary_runs_off_the_async_workers() {
    let executor = executor("blocking", 3);
    let fallback = StaticFallback::new(String::new());

    let value = executor
        .execute_blocking(
            || {
                std::thread::sleep(std::time::Duration::from_millis(5));
                Ok::<_, TestError>("computed".to_string())
            },
            &fallback,
        )
        .await
        .unwrap();

    assert_eq!(value, "computed");
    assert_eq!(executor.available_workers(), 32);
}

#[tokio::test]
async fn events_trace_the_fallback_path() {
    let (executor, events) = recording_executor("events", 5);
    let fallback = StaticFallback::new(());

    executor
        .execute(|| async { Err::<(), _>(TestError::new("down")) }, &fallback)
        .await
        .unwrap();

    let kinds: Vec<&'static str> = events
        .lock()
        .unwrap()
        .iter()
        .map(|e| match e {
            FallbackEvent::PrimarySucceeded { .. } => "primary_succeeded",
            FallbackEvent::PrimaryFailed { .. } => "primary_failed",
            FallbackEvent::Rejected { .. } => "rejected",
            FallbackEvent::FallbackApplied { .. } => "fallback_applied",
            FallbackEvent::FallbackFailed { .. } => "fallback_failed",
        })
        .collect();
    assert_eq!(kinds, vec!["primary_failed", "fallback_applied"]);
}
