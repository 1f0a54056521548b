//! Breaker configuration snapshot.
//!
//! A `BreakerConfig` is never mutated once handed to a breaker; reconfiguring
//! swaps in a whole new snapshot.

use std::time::Duration;

use crate::resilience::classifier::FailureClassifier;

/// Thresholds and failure classification for one breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures within `failure_window` that open the circuit.
    pub max_failures: u32,
    /// Cooldown after opening before calls may probe again.
    pub open_duration: Duration,
    /// Span over which a failure streak accumulates.
    pub failure_window: Duration,
    /// Latency ceiling beyond which a successful call counts as a failure.
    pub max_operation_duration: Duration,
    /// Decides which errors count as failures.
    pub classifier: FailureClassifier,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            open_duration: Duration::from_secs(30),
            failure_window: Duration::from_secs(60),
            max_operation_duration: Duration::from_secs(60),
            classifier: FailureClassifier::default(),
        }
    }
}

impl BreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold. Values below 1 are raised to 1.
    pub fn max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    pub fn failure_window(mut self, window: Duration) -> Self {
        self.failure_window = window;
        self
    }

    pub fn max_operation_duration(mut self, duration: Duration) -> Self {
        self.max_operation_duration = duration;
        self
    }

    pub fn classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Effective threshold; a zero written straight into the field behaves as 1.
    pub(crate) fn threshold(&self) -> u32 {
        self.max_failures.max(1)
    }
}
