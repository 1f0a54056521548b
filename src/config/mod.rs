//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize; durations via duration.rs)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → BreakerRegistry::apply_updates reconfigures breakers (atomic swap)
//! ```
//!
//! # Design Decisions
//! - Invalid reloads are logged and dropped; the running config stays
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use duration::{ConfigDuration, DurationError, TimeUnit};
pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AdminConfig, BreakerSettings, GuardConfig, LogFormat, ObservabilityConfig};
