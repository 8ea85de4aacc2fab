//! Property tests, one module per component.

mod circuit_breaker;
