use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that stop a pipeline run before a gateway verdict (E2001–E2050).
///
/// A gateway rejection is not an error: it is a regular
/// [`ImportResult::Rejected`](crate::gateway::ImportResult::Rejected).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// E2001: Spec file does not exist.
    #[error("E2001: spec file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// E2002: Spec file exists but cannot be read as UTF-8 text.
    #[error("E2002: failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// E2003: Spec file has no content.
    #[error("E2003: spec file is empty: {}", .0.display())]
    EmptySpec(PathBuf),

    /// E2004: An intermediate artifact could not be written.
    #[error("E2004: failed to write artifact {}: {source}", .path.display())]
    WriteArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// E2010: Authoring-format (YAML) input is not valid.
    #[error("E2010: conversion failed: {0}")]
    Conversion(String),

    /// E2020: Wire-format (JSON) artifact is not well-formed.
    #[error("E2020: validation failed: {0}")]
    Validation(String),

    /// E2030: Encoding invariant violated.
    #[error("E2030: encoding failed: {0}")]
    Encoding(String),

    /// E2040: Gateway call exceeded its deadline.
    #[error("E2040: gateway call timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// E2041: Gateway could not be reached or answered unreadably.
    #[error("E2041: gateway transport error: {0}")]
    Transport(String),

    /// E2042: Credential store could not supply credentials.
    #[error("E2042: credentials unavailable: {0}")]
    Credentials(String),

    /// E2050: Invalid configuration.
    #[error("E2050: configuration error: {0}")]
    Config(String),
}

/// Coarse failure classes, as reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Read,
    Conversion,
    Validation,
    Encoding,
    Timeout,
    Transport,
    Credentials,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Read => "read_error",
            ErrorKind::Conversion => "conversion_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Encoding => "encoding_error",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::Transport => "transport_error",
            ErrorKind::Credentials => "credentials_error",
            ErrorKind::Config => "config_error",
        }
    }
}

impl PipelineError {
    /// Stable error code, e.g. `E2010`.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::NotFound(_) => "E2001",
            PipelineError::Read { .. } => "E2002",
            PipelineError::EmptySpec(_) => "E2003",
            PipelineError::WriteArtifact { .. } => "E2004",
            PipelineError::Conversion(_) => "E2010",
            PipelineError::Validation(_) => "E2020",
            PipelineError::Encoding(_) => "E2030",
            PipelineError::Timeout(_) => "E2040",
            PipelineError::Transport(_) => "E2041",
            PipelineError::Credentials(_) => "E2042",
            PipelineError::Config(_) => "E2050",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NotFound(_)
            | PipelineError::Read { .. }
            | PipelineError::EmptySpec(_)
            | PipelineError::WriteArtifact { .. } => ErrorKind::Read,
            PipelineError::Conversion(_) => ErrorKind::Conversion,
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::Encoding(_) => ErrorKind::Encoding,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
            PipelineError::Transport(_) => ErrorKind::Transport,
            PipelineError::Credentials(_) => ErrorKind::Credentials,
            PipelineError::Config(_) => ErrorKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_starts_with_code() {
        let errors = [
            PipelineError::NotFound(PathBuf::from("api/openapi.yml")),
            PipelineError::EmptySpec(PathBuf::from("api/openapi.yml")),
            PipelineError::Conversion("bad indentation".into()),
            PipelineError::Validation("trailing characters".into()),
            PipelineError::Encoding("empty artifact".into()),
            PipelineError::Timeout(Duration::from_secs(30)),
            PipelineError::Transport("connection refused".into()),
            PipelineError::Credentials("AWS_ACCESS_KEY_ID is not set".into()),
            PipelineError::Config("timeout must be positive".into()),
        ];
        for err in errors {
            assert!(
                err.to_string().starts_with(err.code()),
                "{} does not start with {}",
                err,
                err.code()
            );
        }
    }

    #[test]
    fn timeout_message_includes_deadline() {
        let err = PipelineError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "E2040: gateway call timed out after 1.5s");
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
