use super::{executor, TestError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tripwire_circuitbreaker::CircuitState;
use tripwire_fallback::{CachedFallback, FallbackProvider, FallbackReason, Outcome};

#[tokio::test(start_paused = true)]
async fn slow_primary_times_out_to_fallback() {
    let executor = executor("slow", 3);
    let cache = CachedFallback::seeded("stale");

    let started = tokio::time::Instant::now();
    let outcome = executor
        .execute_outcome(
            || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, TestError>("fresh")
            },
            &cache,
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Fallback {
            value: "stale",
            reason: FallbackReason::TimedOut
        }
    );
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(100) && waited < Duration::from_secs(1));
    assert_eq!(executor.breaker().metrics().failures_in_window, 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_primary_holds_its_worker_until_done() {
    let executor = executor("abandoned", 3);
    let cache = CachedFallback::seeded(0u32);
    let finished = Arc::new(AtomicBool::new(false));

    let f = Arc::clone(&finished);
    let value = executor
        .execute(
            move || async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                f.store(true, Ordering::SeqCst);
                Ok::<_, TestError>(42u32)
            },
            &cache,
        )
        .await
        .unwrap();

    assert_eq!(value, 0);
    assert_eq!(executor.available_workers(), 31);

    tokio::time::sleep(Duration::from_secs(2)).await;

    // The primary kept running, but its late answer never reached the cache.
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(cache.fallback().unwrap(), 0);
    assert_eq!(executor.available_workers(), 32);
    assert_eq!(executor.breaker().metrics().failures_in_window, 1);
}

#[tokio::test(start_paused = true)]
async fn per_call_timeout_overrides_configured_one() {
    let executor = executor("override", 3);
    let cache = CachedFallback::seeded(String::from("stale"));

    let value = executor
        .execute_with_timeout(
            || async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, TestError>(String::from("fresh"))
            },
            &cache,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert_eq!(value, "fresh");
    assert_eq!(cache.fallback().unwrap(), "fresh");
}

#[tokio::test(start_paused = true)]
async fn repeated_timeouts_open_the_circuit() {
    let executor = executor("hanging", 2);
    let cache = CachedFallback::seeded(());

    for _ in 0..2 {
        executor
            .execute(
                || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, TestError>(())
                },
                &cache,
            )
            .await
            .unwrap();
    }

    assert_eq!(executor.breaker().state(), CircuitState::Open);

    let outcome = executor
        .execute_outcome(|| async { Ok::<_, TestError>(()) }, &cache)
        .await
        .unwrap();
    assert_eq!(outcome.reason(), Some(FallbackReason::Rejected));
}

#[tokio::test(start_paused = true)]
async fn zero_per_call_timeout_uses_configured_one() {
    let executor = executor("zero-override", 3);
    let cache = CachedFallback::seeded(String::from("stale"));

    let value = executor
        .execute_with_timeout(
            || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, TestError>(String::from("fresh"))
            },
            &cache,
            Duration::ZERO,
        )
        .await
        .unwrap();

    assert_eq!(value, "fresh");
    assert_eq!(executor.breaker().metrics().failures_in_window, 0);
}
