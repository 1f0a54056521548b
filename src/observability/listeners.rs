//! Listeners that export transitions to the metrics and alerting pipelines.

use std::error::Error as StdError;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::errors::{BoxError, Transition};
use crate::resilience::listener::BreakerListener;

/// Records every transition as a counter and updates the open gauge.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsListener;

impl BreakerListener for MetricsListener {
    fn on_open(
        &self,
        breaker: &CircuitBreaker,
        _cause: &(dyn StdError + 'static),
    ) -> Result<(), BoxError> {
        metrics::record_transition(breaker.name(), Transition::Open);
        Ok(())
    }

    fn on_close(&self, breaker: &CircuitBreaker) -> Result<(), BoxError> {
        metrics::record_transition(breaker.name(), Transition::Close);
        Ok(())
    }
}

/// Emits an alert-level log event per transition, under the `alert` target.
///
/// Route that target to a pager or mail relay in the subscriber setup.
#[derive(Debug, Clone)]
pub struct AlertListener {
    subject: String,
}

impl AlertListener {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl Default for AlertListener {
    fn default() -> Self {
        Self::new("circuit breaker alert")
    }
}

impl BreakerListener for AlertListener {
    fn on_open(
        &self,
        breaker: &CircuitBreaker,
        cause: &(dyn StdError + 'static),
    ) -> Result<(), BoxError> {
        tracing::error!(
            target: "alert",
            subject = %self.subject,
            breaker = %breaker.name(),
            cause = %cause,
            times_opened = breaker.times_opened(),
            "Circuit breaker opened"
        );
        Ok(())
    }

    fn on_close(&self, breaker: &CircuitBreaker) -> Result<(), BoxError> {
        tracing::warn!(
            target: "alert",
            subject = %self.subject,
            breaker = %breaker.name(),
            "Circuit breaker recovered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::breaker_config::BreakerConfig;
    use crate::resilience::listener::CompositeListener;

    #[test]
    fn test_metrics_listener_never_fails() {
        let breaker = CircuitBreaker::with_listener(
            "metered",
            BreakerConfig::new().max_failures(1),
            MetricsListener,
        );
        assert!(breaker.open().is_ok());
        assert!(breaker.close().is_ok());
    }

    #[test]
    fn test_alert_and_metrics_sinks_together() {
        let sinks = CompositeListener::new()
            .with(MetricsListener)
            .with(AlertListener::new("[billing] breaker alert"));
        assert_eq!(sinks.len(), 2);

        let breaker =
            CircuitBreaker::with_listener("billing", BreakerConfig::new().max_failures(1), sinks);
        assert!(breaker.open().is_ok());
        assert!(breaker.is_open());
        assert!(breaker.close().is_ok());
        assert_eq!(AlertListener::default().subject(), "circuit breaker alert");
    }
}
