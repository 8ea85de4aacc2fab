use crate::classifier::FailureClassifier;
use crate::error::CircuitBreakerError;
use crate::{Admission, CircuitBreaker};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// A Tower service that consults a circuit breaker before every call.
///
/// Rejected calls fail with [`CircuitBreakerError::OpenCircuit`] without
/// touching the inner service. Results are reported through the call permit,
/// so a result that arrives after the breaker moved on is discarded.
pub struct CircuitBreakerService<S, C> {
    inner: S,
    breaker: CircuitBreaker,
    classifier: Arc<C>,
}

impl<S, C> CircuitBreakerService<S, C> {
    pub(crate) fn new(inner: S, breaker: CircuitBreaker, classifier: Arc<C>) -> Self {
        Self {
            inner,
            breaker,
            classifier,
        }
    }

    /// Returns the breaker guarding this service.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S, C> Clone for CircuitBreakerService<S, C>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: self.breaker.clone(),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<S, C, Req> Service<Req> for CircuitBreakerService<S, C>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    C: FailureClassifier<S::Response, S::Error> + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let permit = match self.breaker.try_acquire() {
            Admission::Permitted(permit) => permit,
            Admission::Rejected => return Box::pin(async { Err(CircuitBreakerError::OpenCircuit) }),
        };

        let classifier = Arc::clone(&self.classifier);
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let result = inner.call(req).await;

            if classifier.classify(&result) {
                permit.record_failure();
            } else if result.is_ok() {
                permit.record_success();
            }

            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
