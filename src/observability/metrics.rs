//! Metrics collection and exposition.
//!
//! # Metrics
//! - `circuit_breaker_calls_total` (counter): calls attempted, by breaker
//! - `circuit_breaker_rejections_total` (counter): calls short-circuited
//! - `circuit_breaker_call_duration_seconds` (histogram): time spent in the operation
//! - `circuit_breaker_transitions_total` (counter): opens/closes, by breaker and target
//! - `circuit_breaker_open` (gauge): 1=open, 0=closed

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::ObservabilityConfig;
use crate::resilience::errors::Transition;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid metrics address '{0}'")]
    InvalidAddress(String),

    #[error(transparent)]
    Exporter(#[from] BuildError),
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Install the exporter if `config` enables it.
pub fn init_from_config(config: &ObservabilityConfig) -> Result<(), MetricsError> {
    if !config.metrics_enabled {
        tracing::debug!("Metrics exporter disabled");
        return Ok(());
    }

    let addr: SocketAddr = config
        .metrics_address
        .parse()
        .map_err(|_| MetricsError::InvalidAddress(config.metrics_address.clone()))?;
    init_metrics(addr)?;
    Ok(())
}

pub fn record_call(breaker: &str) {
    counter!("circuit_breaker_calls_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_rejection(breaker: &str) {
    counter!("circuit_breaker_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_duration(breaker: &str, elapsed: Duration) {
    histogram!("circuit_breaker_call_duration_seconds", "breaker" => breaker.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_transition(breaker: &str, transition: Transition) {
    counter!(
        "circuit_breaker_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => transition.to_string()
    )
    .increment(1);

    let open = match transition {
        Transition::Open => 1.0,
        Transition::Close => 0.0,
    };
    gauge!("circuit_breaker_open", "breaker" => breaker.to_string()).set(open);
}
