//! Protected executor stress tests

use super::ConcurrencyTracker;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tripwire_circuitbreaker::CircuitBreaker;
use tripwire_fallback::{CachedFallback, FallbackReason, ProtectedExecutor};

fn executor(max_concurrent: usize) -> ProtectedExecutor {
    let breaker = CircuitBreaker::builder()
        .name("stress")
        .failure_threshold(1_000_000)
        .build()
        .unwrap();
    ProtectedExecutor::builder()
        .call_timeout(Duration::from_millis(50))
        .max_concurrent_calls(max_concurrent)
        .build(breaker)
        .unwrap()
}

/// Test: 10k concurrent calls never exceed the worker pool
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_concurrent_calls_respect_worker_pool() {
    let executor = executor(64);
    let cache = Arc::new(CachedFallback::seeded(0u64));
    let tracker = ConcurrencyTracker::new();
    let saturated = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let tasks: Vec<_> = (0..10_000u64)
        .map(|i| {
            let executor = executor.clone();
            let cache = Arc::clone(&cache);
            let tracker = Arc::clone(&tracker);
            let saturated = Arc::clone(&saturated);
            tokio::spawn(async move {
                let outcome = executor
                    .execute_outcome(
                        move || async move {
                            tracker.enter();
                            tokio::time::sleep(Duration::from_millis(1)).await;
                            tracker.exit();
                            Ok::<_, std::io::Error>(i)
                        },
                        &cache,
                    )
                    .await
                    .unwrap();
                if outcome.reason() == Some(FallbackReason::Saturated) {
                    saturated.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    println!("10k calls completed in {:?}", start.elapsed());
    println!("Peak concurrency: {}", tracker.peak());
    println!("Saturated: {}", saturated.load(Ordering::Relaxed));

    assert!(tracker.peak() <= 64);
    assert_eq!(executor.available_workers(), 64);
}

/// Test: Timeouts under load always return their worker slots
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_timeouts_release_workers() {
    let executor = executor(32);
    let cache = Arc::new(CachedFallback::seeded(()));

    let tasks: Vec<_> = (0..2_000)
        .map(|_| {
            let executor = executor.clone();
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                executor
                    .execute(
                        || async {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok::<_, std::io::Error>(())
                        },
                        &cache,
                    )
                    .await
                    .unwrap();
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(executor.available_workers(), 32);
}
