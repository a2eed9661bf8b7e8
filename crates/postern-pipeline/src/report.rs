//! Outcome reporter: renders a [`RunReport`] and maps it to an exit code.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::PipelineError;
use crate::gateway::DeployResult;
use crate::pipeline::{write_artifact, Outcome, PipelineState, RunReport};

/// Accepted, and any stage deployment succeeded.
pub const EXIT_SUCCESS: u8 = 0;
/// The gateway rejected the import, or the stage deployment failed.
pub const EXIT_REJECTED: u8 = 1;
/// The run stopped before a gateway verdict. Also used for config errors.
pub const EXIT_HALTED: u8 = 3;

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl ReportFormat {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Process exit code for a finished run.
pub fn exit_code(report: &RunReport) -> u8 {
    match &report.outcome {
        Outcome::Halted { .. } => EXIT_HALTED,
        Outcome::Rejected(_) => EXIT_REJECTED,
        Outcome::Accepted(_) if report.is_success() => EXIT_SUCCESS,
        Outcome::Accepted(_) => EXIT_REJECTED,
    }
}

/// Renders run reports for the invoking process.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    pub fn render(&self, report: &RunReport) -> serde_json::Result<String> {
        match self.format {
            ReportFormat::Text => Ok(render_text(report)),
            ReportFormat::Json => serde_json::to_string_pretty(report),
        }
    }
}

/// Write the JSON report to `path`.
pub fn write_report(path: &Path, report: &RunReport) -> Result<(), PipelineError> {
    let mut json = serde_json::to_vec_pretty(report).map_err(|e| PipelineError::WriteArtifact {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    json.push(b'\n');
    write_artifact(path, &json)
}

fn render_text(report: &RunReport) -> String {
    let spec = report.spec.display();
    let mut out = String::new();

    // Writing to a String cannot fail.
    match &report.outcome {
        Outcome::Accepted(accepted) => {
            let _ = write!(out, "✓ {} imported as REST API {}", spec, accepted.id);
            if let Some(name) = &accepted.name {
                let _ = write!(out, " ({})", name);
            }
            out.push('\n');
            for warning in &accepted.warnings {
                let _ = writeln!(out, "  warning: {}", warning);
            }
        }
        Outcome::Rejected(rejection) => {
            let _ = writeln!(out, "✗ gateway rejected {}: {}", spec, rejection.diagnostic);
            let detail: Vec<String> = rejection
                .error_type
                .iter()
                .cloned()
                .chain(rejection.http_status.map(|s| format!("HTTP {}", s)))
                .collect();
            if !detail.is_empty() {
                let _ = writeln!(out, "  {}", detail.join(", "));
            }
        }
        Outcome::Halted { stage, error } => {
            let _ = writeln!(out, "✗ {} halted at {}: {}", spec, stage, error);
        }
    }

    match &report.deployment {
        Some(DeployResult::Deployed {
            stage,
            deployment_id,
        }) => {
            let _ = writeln!(out, "✓ deployed to stage {} ({})", stage, deployment_id);
        }
        Some(DeployResult::Failed { stage, diagnostic }) => {
            let _ = writeln!(out, "✗ deployment to stage {} failed: {}", stage, diagnostic);
        }
        None => {}
    }

    if let Some(summary) = &report.summary {
        let _ = writeln!(
            out,
            "  {} path(s), {} operation(s), {} gateway extension(s)",
            summary.paths,
            summary.operations,
            summary.gateway_extensions.len()
        );
    }

    let states: Vec<&str> = report.states.iter().map(state_name).collect();
    let _ = writeln!(
        out,
        "  target: {}; states: {}; {} ms",
        report.target,
        states.join(" → "),
        report.duration_ms()
    );
    out
}

fn state_name(state: &PipelineState) -> &'static str {
    match state {
        PipelineState::Loaded => "loaded",
        PipelineState::Converted => "converted",
        PipelineState::Validated => "validated",
        PipelineState::Encoded => "encoded",
        PipelineState::Accepted => "accepted",
        PipelineState::Rejected => "rejected",
        PipelineState::Halted => "halted",
    }
}
