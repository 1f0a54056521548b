//! Breaker registry.
//!
//! # Responsibilities
//! - Hold every named breaker of the process under a composite key
//! - Produce serializable snapshots for the management API
//! - Apply reloaded configuration to live breakers
//!
//! # Design Decisions
//! - Breakers are never dropped from the registry on reload; a breaker that
//!   disappears from the file keeps its last configuration
//! - Reconfiguration keeps each breaker's classifier, which files cannot express

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::schema::GuardConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::resilience::classifier::FailureClassifier;
use crate::resilience::executor::Executor;
use crate::resilience::listener::{BreakerListener, NoopListener};

/// Domain prefix of composite registry keys.
pub const KEY_DOMAIN: &str = "circuit-guard";

/// Composite key a breaker is registered under.
pub fn composite_name(name: &str) -> String {
    format!("{KEY_DOMAIN}:type=CircuitBreaker,name={name}")
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("circuit breaker '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Point-in-time view of one breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub key: String,
    pub state: CircuitState,
    pub current_failures: u32,
    pub total_calls: u64,
    pub total_failures: u64,
    pub times_opened: u64,
    pub max_failures: u32,
    pub open_duration_ms: u64,
    pub failure_window_ms: u64,
    pub max_operation_duration_ms: u64,
}

impl BreakerSnapshot {
    pub fn capture(breaker: &CircuitBreaker) -> Self {
        let config = breaker.config();
        Self {
            name: breaker.name().to_string(),
            key: composite_name(breaker.name()),
            state: breaker.state(),
            current_failures: breaker.current_failures(),
            total_calls: breaker.total_calls(),
            total_failures: breaker.total_failures(),
            times_opened: breaker.times_opened(),
            max_failures: config.max_failures,
            open_duration_ms: millis(config.open_duration),
            failure_window_ms: millis(config.failure_window),
            max_operation_duration_ms: millis(config.max_operation_duration),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Process-wide set of breakers, cheap to clone.
#[derive(Clone)]
pub struct BreakerRegistry {
    inner: Arc<DashMap<String, Arc<CircuitBreaker>>>,
    /// Listener given to breakers created from configuration.
    listener: Arc<dyn BreakerListener>,
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(NoopListener)
    }
}

impl BreakerRegistry {
    pub fn new(listener: impl BreakerListener + 'static) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            listener: Arc::new(listener),
        }
    }

    /// Build a registry holding one breaker per configured entry.
    pub fn from_config(config: &GuardConfig, listener: impl BreakerListener + 'static) -> Self {
        let registry = Self::new(listener);
        registry.apply_config(config);
        registry
    }

    /// Register an externally built breaker.
    pub fn register(&self, breaker: Arc<CircuitBreaker>) -> Result<(), RegistryError> {
        let key = composite_name(breaker.name());
        match self.inner.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RegistryError::AlreadyRegistered(breaker.name().to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                tracing::info!(breaker = %breaker.name(), "Circuit breaker registered");
                slot.insert(breaker);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.inner
            .get(&composite_name(name))
            .map(|entry| entry.value().clone())
    }

    pub fn executor(&self, name: &str) -> Option<Executor> {
        self.get(name).map(Executor::new)
    }

    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.inner
            .remove(&composite_name(name))
            .map(|(_, breaker)| breaker)
    }

    /// Registered breaker names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .iter()
            .map(|entry| entry.value().name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshots of every breaker, sorted by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> = self
            .inner
            .iter()
            .map(|entry| BreakerSnapshot::capture(entry.value()))
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Create missing breakers and reconfigure existing ones.
    pub fn apply_config(&self, config: &GuardConfig) {
        for settings in &config.breakers {
            let key = composite_name(&settings.name);
            let existing = self.inner.get(&key).map(|entry| entry.value().clone());
            match existing {
                Some(breaker) => {
                    let classifier = breaker.config().classifier.clone();
                    if let Err(e) = breaker.reconfigure(settings.to_breaker_config(classifier)) {
                        tracing::warn!(breaker = %settings.name, error = %e, "Listener failed during reload");
                    }
                }
                None => {
                    let breaker = CircuitBreaker::with_shared_listener(
                        settings.name.clone(),
                        settings.to_breaker_config(FailureClassifier::default()),
                        self.listener.clone(),
                    );
                    self.inner.entry(key).or_insert_with(|| Arc::new(breaker));
                    tracing::info!(breaker = %settings.name, "Circuit breaker created from config");
                }
            }
        }
    }

    /// Apply configuration updates until the sender side closes.
    pub async fn apply_updates(&self, mut updates: mpsc::UnboundedReceiver<GuardConfig>) {
        while let Some(config) = updates.recv().await {
            tracing::info!(breakers = config.breakers.len(), "Applying reloaded configuration");
            self.apply_config(&config);
        }
        tracing::debug!("Configuration update channel closed");
    }
}

impl std::fmt::Debug for BreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerRegistry")
            .field("breakers", &self.names())
            .finish_non_exhaustive()
    }
}
