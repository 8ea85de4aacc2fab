use crate::error::{BoxError, ServiceUnavailable};
use crate::outcome::Outcome;
use crate::provider::FallbackProvider;
use crate::ProtectedExecutor;
use futures::future::BoxFuture;
use std::sync::Arc;
use tripwire_circuitbreaker::CircuitState;

/// A remote dependency exposing a single call.
///
/// Implemented once per dependency and injected into a [`ProtectedClient`].
pub trait Dependency: Send + Sync + 'static {
    /// The value the dependency produces.
    type Output: Send + 'static;
    /// The dependency's error.
    type Error: Into<BoxError> + 'static;

    /// Performs the call.
    fn call(&self) -> BoxFuture<'static, Result<Self::Output, Self::Error>>;
}

/// A dependency bound to its executor and fallback.
///
/// ```rust
/// use futures::future::BoxFuture;
/// use tripwire_circuitbreaker::CircuitBreaker;
/// use tripwire_fallback::{CachedFallback, Dependency, ProtectedClient, ProtectedExecutor};
///
/// struct Weather;
///
/// impl Dependency for Weather {
///     type Output = String;
///     type Error = std::io::Error;
///
///     fn call(&self) -> BoxFuture<'static, Result<String, std::io::Error>> {
///         Box::pin(async { Ok("sunny".to_string()) })
///     }
/// }
///
/// # async fn example() {
/// let breaker = CircuitBreaker::builder().name("weather").build().unwrap();
/// let executor = ProtectedExecutor::builder().build(breaker).unwrap();
/// let client = ProtectedClient::new(executor, Weather, CachedFallback::new());
///
/// assert_eq!(client.call().await.unwrap(), "sunny");
/// # }
/// ```
pub struct ProtectedClient<D, F> {
    executor: ProtectedExecutor,
    dependency: Arc<D>,
    fallback: F,
}

impl<D, F> ProtectedClient<D, F>
where
    D: Dependency,
    F: FallbackProvider<D::Output>,
{
    /// Binds `dependency` and `fallback` to `executor`.
    pub fn new(executor: ProtectedExecutor, dependency: D, fallback: F) -> Self {
        Self {
            executor,
            dependency: Arc::new(dependency),
            fallback,
        }
    }

    /// Calls the dependency, answering from the fallback when it is
    /// unavailable.
    pub async fn call(&self) -> Result<D::Output, ServiceUnavailable> {
        self.call_outcome().await.map(Outcome::into_inner)
    }

    /// Like [`call`](Self::call), keeping the provenance of the answer.
    pub async fn call_outcome(&self) -> Result<Outcome<D::Output>, ServiceUnavailable> {
        let dependency = Arc::clone(&self.dependency);
        self.executor
            .execute_outcome(move || dependency.call(), &self.fallback)
            .await
    }

    /// Returns the breaker state after applying the reset timeout.
    pub fn current_state(&self) -> CircuitState {
        self.executor.current_state()
    }

    /// Returns the executor.
    pub fn executor(&self) -> &ProtectedExecutor {
        &self.executor
    }

    /// Returns the fallback provider.
    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}
