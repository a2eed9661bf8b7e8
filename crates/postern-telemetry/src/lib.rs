//! Logging infrastructure for Postern.
//!
//! This crate provides:
//! - Structured JSON (or pretty/compact) logging to stderr
//! - Standard event names and `log_*!` macros shared by the pipeline
//!
//! # Usage
//!
//! ```ignore
//! use postern_telemetry::{LogFormat, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_log_level("info")
//!     .with_log_format(LogFormat::Pretty);
//!
//! postern_telemetry::init(&config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::events;

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    /// The log level is not a valid filter directive.
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),
}

/// Initialize logging with the given configuration.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    logging::init_logging(config)
}
