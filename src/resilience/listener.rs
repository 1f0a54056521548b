//! Transition listeners.
//!
//! A listener observes open/close transitions. It runs inline on the thread
//! that triggered the transition, after the breaker state has been updated.
//! An error it returns is wrapped into a `ListenerError` for the caller.

use std::error::Error as StdError;
use std::sync::Arc;

use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::errors::BoxError;

/// Receives breaker transitions.
pub trait BreakerListener: Send + Sync {
    /// The breaker opened because of `cause`.
    fn on_open(
        &self,
        breaker: &CircuitBreaker,
        cause: &(dyn StdError + 'static),
    ) -> Result<(), BoxError>;

    /// The breaker closed.
    fn on_close(&self, breaker: &CircuitBreaker) -> Result<(), BoxError>;
}

impl<L: BreakerListener + ?Sized> BreakerListener for Arc<L> {
    fn on_open(
        &self,
        breaker: &CircuitBreaker,
        cause: &(dyn StdError + 'static),
    ) -> Result<(), BoxError> {
        (**self).on_open(breaker, cause)
    }

    fn on_close(&self, breaker: &CircuitBreaker) -> Result<(), BoxError> {
        (**self).on_close(breaker)
    }
}

/// Listener that ignores every transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl BreakerListener for NoopListener {
    fn on_open(&self, _: &CircuitBreaker, _: &(dyn StdError + 'static)) -> Result<(), BoxError> {
        Ok(())
    }

    fn on_close(&self, _: &CircuitBreaker) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Fans a transition out to several listeners.
///
/// Every listener is notified even if an earlier one fails; the first error
/// is returned.
#[derive(Clone, Default)]
pub struct CompositeListener {
    listeners: Vec<Arc<dyn BreakerListener>>,
}

impl CompositeListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: impl BreakerListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn notify<F>(&self, mut f: F) -> Result<(), BoxError>
    where
        F: FnMut(&dyn BreakerListener) -> Result<(), BoxError>,
    {
        let mut first_error = None;
        for listener in &self.listeners {
            if let Err(e) = f(listener.as_ref()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl BreakerListener for CompositeListener {
    fn on_open(
        &self,
        breaker: &CircuitBreaker,
        cause: &(dyn StdError + 'static),
    ) -> Result<(), BoxError> {
        self.notify(|l| l.on_open(breaker, cause))
    }

    fn on_close(&self, breaker: &CircuitBreaker) -> Result<(), BoxError> {
        self.notify(|l| l.on_close(breaker))
    }
}
