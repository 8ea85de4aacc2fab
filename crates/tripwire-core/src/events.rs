//! Listener fan-out for breaker and executor events.
//!
//! Each pattern crate defines its own event enum and implements
//! [`ResilienceEvent`] for it. Hooks registered on a builder end up in an
//! [`EventListeners`] collection that the pattern calls after every decision,
//! outside of any lock.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a circuit breaker or a protected executor.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Stable snake_case name of the event kind, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// Name of the breaker or executor that emitted the event.
    fn pattern_name(&self) -> &str;
}

/// Receives events of one kind.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called once per emitted event.
    fn on_event(&self, event: &E);
}

/// The hooks registered on one breaker or executor.
///
/// Listeners run in registration order on the emitting thread. A listener
/// that panics is skipped; the ones after it still run.
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Registers a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Delivers `event` to every listener.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let call = std::panic::AssertUnwindSafe(|| listener.on_event(event));
            let _ = std::panic::catch_unwind(call);
        }
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns how many listeners are registered.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
///
/// This is what the `on_*` builder hooks wrap their closures in.
pub struct FnListener<E, F> {
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
