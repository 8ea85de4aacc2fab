use crate::classifier::{DefaultClassifier, FnClassifier};
use crate::service::CircuitBreakerService;
use crate::CircuitBreaker;
use std::sync::Arc;
use tower::Layer;

/// A Tower layer that guards an inner service with a circuit breaker.
///
/// Every service produced by one layer shares the layer's breaker: the
/// breaker describes one logical dependency, not one service instance.
///
/// ```rust
/// use tower::{ServiceBuilder, service_fn};
/// use tripwire_circuitbreaker::CircuitBreaker;
///
/// let layer = CircuitBreaker::builder()
///     .name("inventory")
///     .failure_threshold(3)
///     .build_layer()
///     .unwrap();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|sku: String| async move { Ok::<_, std::io::Error>(sku) }));
/// ```
#[derive(Clone)]
pub struct CircuitBreakerLayer<C = DefaultClassifier> {
    breaker: CircuitBreaker,
    classifier: Arc<C>,
}

impl CircuitBreakerLayer<DefaultClassifier> {
    /// Creates a layer around an existing breaker, counting every error as
    /// a failure.
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self {
            breaker,
            classifier: Arc::new(DefaultClassifier),
        }
    }
}

impl<C> CircuitBreakerLayer<C> {
    /// Replaces the failure classifier.
    pub fn with_classifier<C2>(self, classifier: C2) -> CircuitBreakerLayer<C2> {
        CircuitBreakerLayer {
            breaker: self.breaker,
            classifier: Arc::new(classifier),
        }
    }

    /// Classifies results with a closure returning `true` for failures.
    pub fn classify_with<F, Res, Err>(self, f: F) -> CircuitBreakerLayer<FnClassifier<F>>
    where
        F: Fn(&Result<Res, Err>) -> bool + Send + Sync,
    {
        self.with_classifier(FnClassifier::new(f))
    }

    /// Returns the shared breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S, C> Layer<S> for CircuitBreakerLayer<C> {
    type Service = CircuitBreakerService<S, C>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreakerService::new(service, self.breaker.clone(), Arc::clone(&self.classifier))
    }
}
