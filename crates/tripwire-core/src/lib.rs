//! Core infrastructure for tripwire.
//!
//! This crate provides shared functionality used by every tripwire crate:
//! - A [`Clock`] abstraction so time-driven state machines can be tested
//!   deterministically
//! - An event system for observability

pub mod clock;
pub mod events;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
