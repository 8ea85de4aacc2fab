//! Failure classification.
//!
//! A [`FailureClassifier`] decides whether a call result counts against the
//! breaker. Results that are not classified as failures are recorded as
//! successes when they are `Ok`; an `Err` the classifier forgives is recorded
//! as neither, so it can never close a half-open circuit.

use std::sync::Arc;

/// Decides whether a `Result<Res, Err>` counts as a failure.
pub trait FailureClassifier<Res, Err>: Send + Sync {
    /// Returns `true` if the result should be recorded as a failure.
    fn classify(&self, result: &Result<Res, Err>) -> bool;
}

/// Counts every `Err` as a failure and every `Ok` as a success.
///
/// Implemented for all `Res` and `Err`, so it can be picked before the
/// dependency's types are known.
///
/// ```rust
/// use tripwire_circuitbreaker::classifier::{DefaultClassifier, FailureClassifier};
///
/// let classifier = DefaultClassifier;
/// assert!(!FailureClassifier::<u32, String>::classify(&classifier, &Ok(1)));
/// assert!(FailureClassifier::<u32, String>::classify(&classifier, &Err("down".into())));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl<Res, Err> FailureClassifier<Res, Err> for DefaultClassifier {
    fn classify(&self, result: &Result<Res, Err>) -> bool {
        result.is_err()
    }
}

/// A classifier backed by a closure.
///
/// ```rust
/// use tripwire_circuitbreaker::classifier::{FailureClassifier, FnClassifier};
/// use std::io::{Error, ErrorKind};
///
/// // A missing record is the caller's problem, not the dependency's.
/// let classifier = FnClassifier::new(|result: &Result<String, Error>| {
///     matches!(result, Err(e) if e.kind() != ErrorKind::NotFound)
/// });
///
/// assert!(!classifier.classify(&Err(Error::new(ErrorKind::NotFound, "no such user"))));
/// assert!(classifier.classify(&Err(Error::new(ErrorKind::ConnectionReset, "reset"))));
/// ```
#[derive(Clone)]
pub struct FnClassifier<F> {
    f: Arc<F>,
}

impl<F> FnClassifier<F> {
    /// Wraps a closure returning `true` for failures.
    pub fn new(f: F) -> Self {
        Self { f: Arc::new(f) }
    }
}

impl<F, Res, Err> FailureClassifier<Res, Err> for FnClassifier<F>
where
    F: Fn(&Result<Res, Err>) -> bool + Send + Sync,
{
    fn classify(&self, result: &Result<Res, Err>) -> bool {
        (self.f)(result)
    }
}

impl<F> std::fmt::Debug for FnClassifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnClassifier")
            .field("f", &"<closure>")
            .finish()
    }
}
