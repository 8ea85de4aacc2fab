//! Circuit breaker as Tower middleware
//!
//! An upstream API starts answering 503. The breaker counts those responses
//! as failures even though they arrive as `Ok`, while a 404 is the caller's
//! problem and is ignored. The second half wraps the same kind of stack in a
//! `ProtectedCallLayer` so that callers get a canned answer instead of an
//! error.
//!
//! Run with: cargo run --example breaker_middleware

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service, ServiceBuilder, ServiceExt};
use tripwire::circuitbreaker::{CircuitBreaker, CircuitBreakerError};
use tripwire::fallback::{ProtectedCallLayer, ProtectedExecutor, StaticFallback};

#[derive(Debug, Clone)]
struct Response {
    status: u16,
    body: String,
}

#[derive(Debug)]
struct TransportError;

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "connection reset")
    }
}

impl std::error::Error for TransportError {}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    println!("=== Circuit Breaker Middleware Example ===\n");
    classified_breaker().await;
    println!();
    degraded_answers().await;
}

async fn classified_breaker() {
    println!("--- Status-aware circuit breaker ---");
    let calls = Arc::new(AtomicU32::new(0));

    let layer = CircuitBreaker::builder()
        .name("upstream-api")
        .failure_threshold(2)
        .reset_timeout(Duration::from_secs(30))
        .on_state_transition(|from, to| println!("  [Breaker] {from} -> {to}"))
        .on_call_rejected(|| println!("  [Breaker] call rejected"))
        .build_layer()
        .expect("valid breaker settings")
        .classify_with(|result: &Result<Response, TransportError>| match result {
            Ok(response) => response.status >= 500,
            Err(_) => true,
        });

    let mut service = ServiceBuilder::new()
        .layer(layer.clone())
        .service(tower::service_fn({
            let calls = Arc::clone(&calls);
            move |path: String| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    let status = match (path.as_str(), call) {
                        ("/missing", _) => 404,
                        (_, n) if n > 3 => 503,
                        _ => 200,
                    };
                    Ok::<_, TransportError>(Response {
                        status,
                        body: format!("{path} -> {status}"),
                    })
                }
            }
        }));

    for path in ["/items", "/missing", "/missing", "/items", "/items", "/items"] {
        let result = service
            .ready()
            .await
            .expect("breaker is always ready")
            .call(path.to_string())
            .await;
        match result {
            Ok(response) => println!("{path}: {}", response.body),
            Err(CircuitBreakerError::OpenCircuit) => println!("{path}: short-circuited"),
            Err(CircuitBreakerError::Inner(err)) => println!("{path}: {err}"),
        }
    }

    println!(
        "Upstream saw {} calls, circuit is {}",
        calls.load(Ordering::SeqCst),
        layer.breaker().state()
    );
}

async fn degraded_answers() {
    println!("--- Degrading to a canned answer ---");

    let breaker = CircuitBreaker::builder()
        .name("upstream-degraded")
        .failure_threshold(2)
        .build()
        .expect("valid breaker settings");
    let executor = ProtectedExecutor::builder()
        .call_timeout(Duration::from_millis(250))
        .build(breaker)
        .expect("valid executor settings");

    let canned = Response {
        status: 200,
        body: "served from canned answer".to_string(),
    };
    let protected = ProtectedCallLayer::new(executor.clone(), StaticFallback::new(canned));

    let failing = tower::service_fn(|_path: String| async {
        Err::<Response, TransportError>(TransportError)
    });
    let service = protected.layer(failing);

    for i in 1..=4 {
        let response = service
            .clone()
            .oneshot(format!("/items/{i}"))
            .await
            .expect("the canned answer never fails");
        println!(
            "call {i}: {} (circuit {})",
            response.body,
            executor.current_state()
        );
    }
}
