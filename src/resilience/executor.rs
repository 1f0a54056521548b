//! Call wrapper.
//!
//! # Data Flow
//! ```text
//! execute(op)
//!     → count the call
//!     → breaker open? reject with CircuitOpenError, op never runs
//!     → run op, timing it
//!     → Ok: report elapsed time (slow calls count as failures)
//!     → Err: report the error (subject to classification), hand it back as is
//! ```
//!
//! # Control-Flow Escapes
//! `execute_flow` accepts operations returning `ControlFlow`. A `Break` is a
//! non-local exit, not a failure: it goes straight back to the caller and the
//! breaker never hears about it. Panics are not caught either.

use std::error::Error as StdError;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::observability::metrics;
use crate::resilience::breaker_config::BreakerConfig;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::errors::{CircuitOpenError, ExecuteError};

/// Runs operations under the protection of one breaker.
#[derive(Debug, Clone)]
pub struct Executor {
    breaker: Arc<CircuitBreaker>,
}

impl Executor {
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run `operation` unless the breaker is open.
    pub fn execute<T, E, F>(&self, operation: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: StdError + 'static,
    {
        let config = self.admit()?;
        let started = Instant::now();
        let outcome = operation();
        self.settle(&config, started.elapsed(), outcome)
    }

    /// Like [`Executor::execute`], but `Break` values pass through untouched
    /// and unrecorded.
    pub fn execute_flow<B, T, E, F>(&self, operation: F) -> Result<ControlFlow<B, T>, ExecuteError<E>>
    where
        F: FnOnce() -> ControlFlow<B, Result<T, E>>,
        E: StdError + 'static,
    {
        let config = self.admit()?;
        let started = Instant::now();
        match operation() {
            ControlFlow::Break(signal) => {
                tracing::trace!(breaker = %self.breaker.name(), "Control-flow escape, not recorded");
                Ok(ControlFlow::Break(signal))
            }
            ControlFlow::Continue(outcome) => self
                .settle(&config, started.elapsed(), outcome)
                .map(ControlFlow::Continue),
        }
    }

    /// Async variant of [`Executor::execute`]. The future is awaited to
    /// completion; no deadline is imposed.
    pub async fn execute_async<T, E, F, Fut>(&self, operation: F) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        let config = self.admit()?;
        let started = Instant::now();
        let outcome = operation().await;
        self.settle(&config, started.elapsed(), outcome)
    }

    fn admit(&self) -> Result<Arc<BreakerConfig>, CircuitOpenError> {
        let name = self.breaker.name();
        self.breaker.record_call();
        metrics::record_call(name);

        let config = self.breaker.config();
        if self.breaker.is_open_under(&config) {
            tracing::debug!(breaker = %name, "Call rejected, circuit open");
            metrics::record_rejection(name);
            return Err(CircuitOpenError::new(self.clone()));
        }
        Ok(config)
    }

    fn settle<T, E>(
        &self,
        config: &BreakerConfig,
        elapsed: Duration,
        outcome: Result<T, E>,
    ) -> Result<T, ExecuteError<E>>
    where
        E: StdError + 'static,
    {
        metrics::record_duration(self.breaker.name(), elapsed);
        match outcome {
            Ok(value) => match self.breaker.record_success_under(config, elapsed) {
                Ok(()) => Ok(value),
                Err(source) => Err(ExecuteError::Listener {
                    source,
                    operation: None,
                }),
            },
            Err(error) => match self.breaker.record_outcome_under(config, &error) {
                Ok(()) => Err(ExecuteError::Operation(error)),
                Err(source) => Err(ExecuteError::Listener {
                    source,
                    operation: Some(error),
                }),
            },
        }
    }
}

impl From<Arc<CircuitBreaker>> for Executor {
    fn from(breaker: Arc<CircuitBreaker>) -> Self {
        Self::new(breaker)
    }
}
