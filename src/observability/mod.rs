//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers and executors produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (call counters, durations, state gauges)
//!     → listeners.rs (transition hooks feeding metrics and alerts)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Without an installed recorder every metric update is a no-op
//! - Labels are the breaker name only; cardinality follows the number of breakers

pub mod listeners;
pub mod logging;
pub mod metrics;

pub use listeners::{AlertListener, MetricsListener};
