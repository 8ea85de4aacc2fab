//! Secondary data sources consulted when the primary is unavailable.

use crate::error::{BoxError, FallbackEmpty};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// A cheap, usually infallible source of a substitute value.
///
/// Providers are shared by every caller of one dependency, so they must be
/// safe to read concurrently.
pub trait FallbackProvider<T>: Send + Sync {
    /// Produces the fallback value.
    fn fallback(&self) -> Result<T, BoxError>;

    /// Offers a fresh primary result. Called after every primary success so
    /// that later fallbacks are not permanently stale.
    fn refresh(&self, _fresh: &T) {}
}

impl<T, P> FallbackProvider<T> for Arc<P>
where
    P: FallbackProvider<T> + ?Sized,
{
    fn fallback(&self) -> Result<T, BoxError> {
        (**self).fallback()
    }

    fn refresh(&self, fresh: &T) {
        (**self).refresh(fresh)
    }
}

/// Always answers with a clone of the same value.
#[derive(Debug, Clone)]
pub struct StaticFallback<T> {
    value: T,
}

impl<T> StaticFallback<T> {
    /// Creates a provider answering with `value`.
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> FallbackProvider<T> for StaticFallback<T>
where
    T: Clone + Send + Sync,
{
    fn fallback(&self) -> Result<T, BoxError> {
        Ok(self.value.clone())
    }
}

/// Computes the fallback with a closure.
#[derive(Clone)]
pub struct FnFallback<F> {
    f: F,
}

impl<F> FnFallback<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, T> FallbackProvider<T> for FnFallback<F>
where
    F: Fn() -> Result<T, BoxError> + Send + Sync,
{
    fn fallback(&self) -> Result<T, BoxError> {
        (self.f)()
    }
}

impl<F> fmt::Debug for FnFallback<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFallback")
            .field("f", &"<closure>")
            .finish()
    }
}

/// Serves the last good primary result.
///
/// Reads run concurrently; each refresh replaces the cached value, so the
/// last successful result wins. Until the first refresh the cache answers
/// with its seed, or fails with [`FallbackEmpty`] when it has none.
///
/// ```rust
/// use tripwire_fallback::{CachedFallback, FallbackProvider};
///
/// let cache = CachedFallback::seeded(vec!["default".to_string()]);
/// assert_eq!(cache.fallback().unwrap(), vec!["default"]);
///
/// cache.refresh(&vec!["fresh".to_string()]);
/// assert_eq!(cache.fallback().unwrap(), vec!["fresh"]);
/// ```
pub struct CachedFallback<T> {
    value: RwLock<Option<T>>,
}

impl<T> CachedFallback<T> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    /// Creates a cache answering with `seed` until the first refresh.
    pub fn seeded(seed: T) -> Self {
        Self {
            value: RwLock::new(Some(seed)),
        }
    }

    /// Returns true if a value is cached.
    pub fn is_populated(&self) -> bool {
        self.value.read().is_some()
    }

    /// Drops the cached value.
    pub fn clear(&self) {
        *self.value.write() = None;
    }
}

impl<T> Default for CachedFallback<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FallbackProvider<T> for CachedFallback<T>
where
    T: Clone + Send + Sync,
{
    fn fallback(&self) -> Result<T, BoxError> {
        self.value.read().clone().ok_or_else(|| FallbackEmpty.into())
    }

    fn refresh(&self, fresh: &T) {
        *self.value.write() = Some(fresh.clone());
    }
}

impl<T> fmt::Debug for CachedFallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFallback")
            .field("populated", &self.is_populated())
            .finish()
    }
}
