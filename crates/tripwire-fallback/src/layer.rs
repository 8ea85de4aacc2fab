use crate::error::{BoxError, ServiceUnavailable};
use crate::provider::FallbackProvider;
use crate::ProtectedExecutor;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

/// A Tower layer that runs the inner service as the primary of a
/// [`ProtectedExecutor`].
///
/// ```rust
/// use tower::{Layer, ServiceExt, service_fn};
/// use tripwire_circuitbreaker::CircuitBreaker;
/// use tripwire_fallback::{ProtectedCallLayer, ProtectedExecutor, StaticFallback};
///
/// # async fn example() {
/// let breaker = CircuitBreaker::builder().name("quotes").build().unwrap();
/// let executor = ProtectedExecutor::builder().build(breaker).unwrap();
/// let layer = ProtectedCallLayer::new(executor, StaticFallback::new("keep calm".to_string()));
///
/// let service = layer.layer(service_fn(|topic: String| async move {
///     Err::<String, std::io::Error>(std::io::Error::other(topic))
/// }));
/// let quote = service.oneshot("rust".to_string()).await.unwrap();
/// assert_eq!(quote, "keep calm");
/// # }
/// ```
pub struct ProtectedCallLayer<P> {
    executor: ProtectedExecutor,
    fallback: Arc<P>,
}

impl<P> ProtectedCallLayer<P> {
    /// Creates a layer sharing `executor` and `fallback` between every
    /// service it wraps.
    pub fn new(executor: ProtectedExecutor, fallback: P) -> Self {
        Self {
            executor,
            fallback: Arc::new(fallback),
        }
    }

    /// Returns the executor.
    pub fn executor(&self) -> &ProtectedExecutor {
        &self.executor
    }
}

impl<P> Clone for ProtectedCallLayer<P> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            fallback: Arc::clone(&self.fallback),
        }
    }
}

impl<S, P> Layer<S> for ProtectedCallLayer<P> {
    type Service = ProtectedCall<S, P>;

    fn layer(&self, service: S) -> Self::Service {
        ProtectedCall {
            inner: service,
            executor: self.executor.clone(),
            fallback: Arc::clone(&self.fallback),
        }
    }
}

/// A service whose calls never fail while the fallback holds up.
///
/// Readiness of the inner service is awaited inside the primary, so it
/// counts against the call timeout.
pub struct ProtectedCall<S, P> {
    inner: S,
    executor: ProtectedExecutor,
    fallback: Arc<P>,
}

impl<S, P> ProtectedCall<S, P> {
    /// Returns the executor.
    pub fn executor(&self) -> &ProtectedExecutor {
        &self.executor
    }
}

impl<S, P> Clone for ProtectedCall<S, P>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            executor: self.executor.clone(),
            fallback: Arc::clone(&self.fallback),
        }
    }
}

impl<S, P, Req> Service<Req> for ProtectedCall<S, P>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Into<BoxError> + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    P: FallbackProvider<S::Response> + 'static,
{
    type Response = S::Response;
    type Error = ServiceUnavailable;
    type Future = BoxFuture<'static, Result<S::Response, ServiceUnavailable>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let executor = self.executor.clone();
        let fallback = Arc::clone(&self.fallback);
        let inner = self.inner.clone();

        Box::pin(async move {
            executor
                .execute(move || inner.oneshot(req), fallback.as_ref())
                .await
        })
    }
}
