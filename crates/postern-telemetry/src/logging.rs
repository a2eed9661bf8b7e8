//! Structured logging with JSON output.
//!
//! Logs always go to stderr; stdout is reserved for command output such as
//! the run report.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(&config.log_level)?;

    match config.log_format {
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Pretty => init_pretty_logging(filter, config.ansi),
        LogFormat::Compact => init_compact_logging(filter, config.ansi),
    }
}

/// Build the env filter from `RUST_LOG` or the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| TelemetryError::InvalidFilter(format!("{}: {}", level, e))),
    }
}

fn init_json_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let json_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_pretty_logging(filter: EnvFilter, ansi: bool) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .pretty()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_compact_logging(filter: EnvFilter, ansi: bool) -> Result<(), TelemetryError> {
    let compact_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(compact_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names.
pub mod events {
    /// A pipeline run is starting.
    pub const PIPELINE_STARTED: &str = "pipeline_started";

    /// The specification document has been read.
    pub const SPEC_LOADED: &str = "spec_loaded";

    /// The specification has been converted to the wire format.
    pub const SPEC_CONVERTED: &str = "spec_converted";

    /// The converted artifact is well-formed.
    pub const SPEC_VALIDATED: &str = "spec_validated";

    /// The transport payload has been produced.
    pub const PAYLOAD_ENCODED: &str = "payload_encoded";

    /// An intermediate artifact has been written to disk.
    pub const ARTIFACT_WRITTEN: &str = "artifact_written";

    /// The payload is being sent to the gateway.
    pub const IMPORT_SUBMITTED: &str = "import_submitted";

    /// The gateway accepted the import.
    pub const IMPORT_ACCEPTED: &str = "import_accepted";

    /// The gateway rejected the import.
    pub const IMPORT_REJECTED: &str = "import_rejected";

    /// A stage deployment has been created.
    pub const DEPLOYMENT_CREATED: &str = "deployment_created";

    /// A stage deployment failed.
    pub const DEPLOYMENT_FAILED: &str = "deployment_failed";

    /// The pipeline stopped before a gateway verdict.
    pub const PIPELINE_HALTED: &str = "pipeline_halted";
}

/// Helper macros for structured logging with standard fields.
///
/// These wrap the tracing macros to ensure consistent field naming.
#[macro_export]
macro_rules! log_pipeline_started {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::PIPELINE_STARTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_spec_loaded {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::SPEC_LOADED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_spec_converted {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::SPEC_CONVERTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_spec_validated {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::SPEC_VALIDATED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_payload_encoded {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::PAYLOAD_ENCODED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_artifact_written {
    ($($field:tt)*) => {
        tracing::debug!(
            event = $crate::logging::events::ARTIFACT_WRITTEN,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_import_submitted {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::IMPORT_SUBMITTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_import_accepted {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::IMPORT_ACCEPTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_import_rejected {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::IMPORT_REJECTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_deployment_created {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::DEPLOYMENT_CREATED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_deployment_failed {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::DEPLOYMENT_FAILED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_pipeline_halted {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::PIPELINE_HALTED,
            $($field)*
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    // Subscriber initialization is process-global, so only the
    // configuration logic is exercised here.

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("Compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("invalid"), None);
    }

    #[test]
    fn test_build_filter_accepts_directives() {
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("postern_pipeline=trace,info").is_ok());
    }
}
