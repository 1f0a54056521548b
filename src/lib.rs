//! In-process circuit breakers.
//!
//! Wrap calls to a flaky or slow dependency in an [`Executor`]. Once enough
//! consecutive failures land inside the failure window the breaker opens and
//! calls fail fast with [`CircuitOpenError`] until the cooldown elapses and a
//! probe call succeeds.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use circuit_guard::{BreakerConfig, CircuitBreaker, ExecuteError};
//!
//! let breaker = Arc::new(CircuitBreaker::new(
//!     "inventory",
//!     BreakerConfig::new()
//!         .max_failures(3)
//!         .open_duration(Duration::from_secs(10)),
//! ));
//! let executor = breaker.executor();
//!
//! match executor.execute(|| inventory_client.fetch(sku)) {
//!     Ok(item) => render(item),
//!     Err(ExecuteError::Open(_)) => render_cached(sku),
//!     Err(e) => return Err(e.into()),
//! }
//! ```

// Core
pub mod resilience;

// Surroundings
pub mod admin;
pub mod config;
pub mod observability;

pub use config::GuardConfig;
pub use resilience::{
    BreakerConfig, BreakerListener, CircuitBreaker, CircuitOpenError, CircuitState,
    CompositeListener, ExecuteError, Executor, FailureClassifier, ForcedOpen, ListenerError,
    NoopListener, SlowOperation, ThresholdLowered,
};
