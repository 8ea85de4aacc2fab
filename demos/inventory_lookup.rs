//! Inventory lookup guarded by a circuit breaker with a last-known-good cache
//!
//! A warehouse service answers stock queries. Part way through, the
//! warehouse goes down: calls fail, the circuit opens and callers are
//! answered from the cache without touching the warehouse. Once it comes
//! back, a probe closes the circuit again.
//!
//! Run with: cargo run --example inventory_lookup

use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tripwire::circuitbreaker::CircuitBreaker;
use tripwire::fallback::{
    spawn_health_reporter, CachedFallback, Dependency, FallbackEvent, HealthCheck,
    ProtectedClient, ProtectedExecutor, ServiceMonitor,
};

#[derive(Debug)]
struct WarehouseDown;

impl std::fmt::Display for WarehouseDown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "warehouse unreachable")
    }
}

impl std::error::Error for WarehouseDown {}

/// Simulated warehouse that can be switched off
#[derive(Clone)]
struct Warehouse {
    online: Arc<AtomicBool>,
    calls: Arc<AtomicU32>,
}

impl Dependency for Warehouse {
    type Output = u32;
    type Error = WarehouseDown;

    fn call(&self) -> BoxFuture<'static, Result<u32, WarehouseDown>> {
        let online = self.online.load(Ordering::SeqCst);
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move {
            sleep(Duration::from_millis(20)).await;
            if online {
                Ok(100 + call)
            } else {
                Err(WarehouseDown)
            }
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    println!("=== Inventory Lookup Example ===\n");

    let warehouse = Warehouse {
        online: Arc::new(AtomicBool::new(true)),
        calls: Arc::new(AtomicU32::new(0)),
    };

    let breaker = CircuitBreaker::builder()
        .name("warehouse")
        .failure_threshold(3)
        .reset_timeout(Duration::from_millis(500))
        .min_half_open_duration(Duration::ZERO)
        .build()
        .expect("valid breaker settings");

    let monitor = ServiceMonitor::new();
    let executor = ProtectedExecutor::builder()
        .call_timeout(Duration::from_millis(200))
        .monitor(monitor.clone())
        .on_event(|event| {
            if let FallbackEvent::FallbackApplied { reason, .. } = event {
                println!("  [Executor] served from cache ({reason})");
            }
        })
        .build(breaker)
        .expect("valid executor settings");

    let reporter = spawn_health_reporter(
        "warehouse",
        monitor.clone(),
        HealthCheck {
            period: Duration::from_millis(250),
            min_success_rate: 0.9,
            max_silence: Duration::from_secs(60),
        },
        |name, health| println!("  [Health] {name}: {health:?}"),
    );

    let client = ProtectedClient::new(executor, warehouse.clone(), CachedFallback::new());

    println!("--- Phase 1: warehouse online ---");
    lookup(&client, 3).await;

    println!("\n--- Phase 2: warehouse offline ---");
    warehouse.online.store(false, Ordering::SeqCst);
    lookup(&client, 6).await;
    println!(
        "Warehouse was called {} times in total",
        warehouse.calls.load(Ordering::SeqCst)
    );

    println!("\n--- Phase 3: warehouse recovers ---");
    warehouse.online.store(true, Ordering::SeqCst);
    sleep(Duration::from_millis(600)).await;
    lookup(&client, 3).await;

    reporter.abort();

    let snapshot = monitor.snapshot();
    println!("\n=== Summary ===");
    println!("Primary answers: {}", snapshot.successes);
    println!("Cached answers:  {}", snapshot.fallbacks);
    println!("Unanswered:      {}", snapshot.errors);
    if let Some(rate) = snapshot.success_rate {
        println!("Success rate:    {:.2}", rate);
    }
}

async fn lookup<D, F>(client: &ProtectedClient<D, F>, times: usize)
where
    D: Dependency<Output = u32>,
    F: tripwire::fallback::FallbackProvider<u32>,
{
    for i in 1..=times {
        match client.call_outcome().await {
            Ok(outcome) if outcome.is_fallback() => {
                println!("Lookup {i}: {} units (cached)", outcome.value());
            }
            Ok(outcome) => println!("Lookup {i}: {} units", outcome.value()),
            Err(err) => println!("Lookup {i}: {err}"),
        }
        println!("  circuit: {}", client.current_state());
    }
}
