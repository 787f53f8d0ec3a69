//! Retry + circuit breaker decision engine.
//!
//! This crate wraps an unreliable operation with two cooperating
//! protections:
//! - **Bounded retry** with a flat delay between attempts
//! - **Circuit breaker** that stops invoking a persistently failing
//!   operation and periodically probes for recovery
//!
//! Retry is the outer loop and the breaker is the inner gate on every
//! attempt, so a retry sequence becomes circuit-aware mid-flight: once
//! the breaker opens, remaining attempts fast-fail instead of sleeping
//! and hammering a known-bad dependency.
//!
//! The [`FaultGate`] facade composes both protections behind a single
//! `execute` entry point; the individual pieces ([`CircuitBreaker`],
//! [`RetryPolicy`], [`ResetScheduler`]) are exported for callers that
//! need finer control.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod breaker;
pub mod clock;
pub mod error;
pub mod gate;
pub mod retry;
pub mod scheduler;
pub mod window;

// Re-export commonly used types for convenience
// ------------------------
pub use breaker::{
    BreakerConfig, BreakerConfigBuilder, BreakerSnapshot, CircuitBreaker, CircuitState, Permit,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use error::{ConfigError, ConfigResult, FailureKind};
pub use gate::{FaultGate, GateConfig, GateConfigBuilder};
pub use retry::{RetryPolicy, RetryPolicyBuilder};
pub use scheduler::ResetScheduler;
pub use window::SlidingOutcomeWindow;
