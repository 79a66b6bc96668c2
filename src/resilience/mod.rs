//! Resilience layer for calls to sibling services
//!
//! ```text
//! handler → ResilientClient::request(..).call(&ctx)
//!     → CircuitBreaker::try_acquire   (fail fast while open)
//!     → reqwest, timeout = ctx deadline
//!     → Permit::success / Permit::failure
//! ```

pub mod circuit_breaker;
pub mod client;

pub use circuit_breaker::{BreakerMode, BreakerSettings, BreakerStatus, CircuitBreaker, Permit};
pub use client::{CallBuilder, CallContext, CallError, CallOutcome, ResilientClient};
