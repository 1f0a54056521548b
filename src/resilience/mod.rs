//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded call:
//!     → executor.rs (admit or reject, time the call)
//!     → classifier.rs (does this error count?)
//!     → circuit_breaker.rs (update counters, open/close)
//!     → listener.rs (notify observers of transitions)
//! ```
//!
//! # Design Decisions
//! - Breakers are per logical operation, never global
//! - Fail fast while open; no waiting, no retries
//! - Lock-free counters; configuration swapped atomically
//! - Operation errors always reach the caller unchanged

pub mod breaker_config;
pub mod circuit_breaker;
pub mod classifier;
pub mod errors;
pub mod executor;
pub mod listener;

pub use breaker_config::BreakerConfig;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use classifier::FailureClassifier;
pub use errors::{
    BoxError, CircuitOpenError, ExecuteError, ForcedOpen, ListenerError, SlowOperation,
    ThresholdLowered, Transition,
};
pub use executor::Executor;
pub use listener::{BreakerListener, CompositeListener, NoopListener};
