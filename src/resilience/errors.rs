//! Error taxonomy for the breaker and its executor.
//!
//! # Kinds
//! - `CircuitOpenError`: the executor rejected a call without running it
//! - `ForcedOpen`: synthetic cause of an administrative open
//! - `SlowOperation`: synthetic cause for a call that succeeded too slowly
//! - `ThresholdLowered`: synthetic cause when reconfiguration trips a live streak
//! - `ListenerError`: a listener failed after a transition was committed
//! - `ExecuteError`: what `Executor::execute` hands back to the caller

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::executor::Executor;

/// Boxed error returned by listeners.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Raised when a call is short-circuited by an open breaker.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker '{name}' is open")]
pub struct CircuitOpenError {
    name: String,
    executor: Executor,
}

impl CircuitOpenError {
    pub(crate) fn new(executor: Executor) -> Self {
        Self {
            name: executor.breaker().name().to_string(),
            executor,
        }
    }

    /// The executor that rejected the call.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// The breaker behind the rejecting executor.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.executor.breaker()
    }
}

/// Cause recorded when a breaker is opened by an operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("circuit breaker was forced open")]
pub struct ForcedOpen;

/// Cause recorded when a call returned normally but exceeded the latency ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation took {elapsed:?}, exceeding the {limit:?} limit")]
pub struct SlowOperation {
    /// Configured `max_operation_duration` at the time of the call.
    pub limit: Duration,
    /// Measured duration of the call.
    pub elapsed: Duration,
}

/// Cause recorded when a new configuration puts the current streak at or
/// above its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{failures} consecutive failures reached the lowered threshold of {max_failures}")]
pub struct ThresholdLowered {
    pub failures: u32,
    pub max_failures: u32,
}

/// Breaker transition that triggered a listener notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Open,
    Close,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Open => write!(f, "open"),
            Transition::Close => write!(f, "close"),
        }
    }
}

/// A listener failed while being notified of a transition.
///
/// The transition itself has already taken effect when this is returned.
#[derive(Debug, Error)]
#[error("listener failed on {transition} of circuit breaker '{breaker}'")]
pub struct ListenerError {
    breaker: String,
    transition: Transition,
    #[source]
    source: BoxError,
}

impl ListenerError {
    pub(crate) fn new(breaker: &str, transition: Transition, source: BoxError) -> Self {
        Self {
            breaker: breaker.to_string(),
            transition,
            source,
        }
    }

    /// Name of the breaker whose listener failed.
    pub fn breaker(&self) -> &str {
        &self.breaker
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    /// The error raised by the listener.
    pub fn listener_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// Outcome of a guarded call that did not produce a value.
#[derive(Debug, Error)]
pub enum ExecuteError<E> {
    /// The breaker was open; the operation never ran.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The operation's own error, untouched.
    #[error(transparent)]
    Operation(E),

    /// A transition triggered by this call could not be delivered to the listener.
    ///
    /// `operation` carries the operation's error when the call itself failed.
    #[error("{source}")]
    Listener {
        #[source]
        source: ListenerError,
        operation: Option<E>,
    },
}

impl<E> ExecuteError<E> {
    /// True if the call was short-circuited.
    pub fn is_open(&self) -> bool {
        matches!(self, ExecuteError::Open(_))
    }

    /// Recover the operation's error, if the operation ran and failed.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ExecuteError::Open(_) => None,
            ExecuteError::Operation(e) => Some(e),
            ExecuteError::Listener { operation, .. } => operation,
        }
    }

    pub fn as_operation_error(&self) -> Option<&E> {
        match self {
            ExecuteError::Open(_) => None,
            ExecuteError::Operation(e) => Some(e),
            ExecuteError::Listener { operation, .. } => operation.as_ref(),
        }
    }
}
