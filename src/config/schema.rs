//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::config::duration::ConfigDuration;
use crate::resilience::breaker_config::BreakerConfig;
use crate::resilience::classifier::FailureClassifier;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Management API settings.
    pub admin: AdminConfig,

    /// Breaker definitions.
    pub breakers: Vec<BreakerSettings>,
}

impl GuardConfig {
    pub fn breaker(&self, name: &str) -> Option<&BreakerSettings> {
        self.breakers.iter().find(|b| b.name == name)
    }
}

/// Thresholds for a single named breaker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BreakerSettings {
    /// Breaker name, unique within the file.
    pub name: String,

    /// Consecutive failures that open the circuit.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Cooldown before half-open probing.
    #[serde(default = "default_open_duration")]
    pub open_duration: ConfigDuration,

    /// Window in which failures accumulate.
    #[serde(default = "default_failure_window")]
    pub failure_window: ConfigDuration,

    /// Latency ceiling for successful calls.
    #[serde(default = "default_max_operation_duration")]
    pub max_operation_duration: ConfigDuration,
}

fn default_max_failures() -> u32 {
    5
}

fn default_open_duration() -> ConfigDuration {
    ConfigDuration::from_secs(30)
}

fn default_failure_window() -> ConfigDuration {
    ConfigDuration::from_secs(60)
}

fn default_max_operation_duration() -> ConfigDuration {
    ConfigDuration::from_secs(60)
}

impl BreakerSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_failures: default_max_failures(),
            open_duration: default_open_duration(),
            failure_window: default_failure_window(),
            max_operation_duration: default_max_operation_duration(),
        }
    }

    /// Build a breaker configuration carrying `classifier`.
    ///
    /// Classifiers hold type-level rules that cannot be written in a file, so
    /// the caller supplies the one to keep.
    pub fn to_breaker_config(&self, classifier: FailureClassifier) -> BreakerConfig {
        BreakerConfig::new()
            .max_failures(self.max_failures)
            .open_duration(self.open_duration.to_std())
            .failure_window(self.failure_window.to_std())
            .max_operation_duration(self.max_operation_duration.to_std())
            .classifier(classifier)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Management API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the management API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Management API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
