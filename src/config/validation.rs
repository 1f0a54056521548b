//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Breaker names present and unique
//! - Thresholds and durations non-zero
//! - Bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GuardConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("breaker #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("breaker '{0}' is defined more than once")]
    DuplicateName(String),

    #[error("breaker '{0}': max_failures must be at least 1")]
    ZeroThreshold(String),

    #[error("breaker '{breaker}': {field} must be greater than zero")]
    ZeroDuration { breaker: String, field: &'static str },

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },
}

/// Check `config` and return every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (index, breaker) in config.breakers.iter().enumerate() {
        if breaker.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName { index });
        } else if !seen.insert(breaker.name.as_str()) {
            errors.push(ValidationError::DuplicateName(breaker.name.clone()));
        }

        if breaker.max_failures == 0 {
            errors.push(ValidationError::ZeroThreshold(breaker.name.clone()));
        }

        let durations = [
            ("open_duration", &breaker.open_duration),
            ("failure_window", &breaker.failure_window),
            ("max_operation_duration", &breaker.max_operation_duration),
        ];
        for (field, duration) in durations {
            if duration.is_zero() {
                errors.push(ValidationError::ZeroDuration {
                    breaker: breaker.name.clone(),
                    field,
                });
            }
        }
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
