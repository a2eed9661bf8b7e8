//! Deployment orchestration.
//!
//! `Loaded → Converted → Validated → Encoded → {Accepted | Rejected}`.
//! Any failure short of a gateway verdict ends the run in `Halted` and the
//! gateway is never called afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::config::{DeployConfig, RejectionPolicy};
use crate::convert::Converter;
use crate::encode::{encode, EncodedPayload};
use crate::error::PipelineError;
use crate::gateway::{
    DeployRequest, DeployResult, GatewayClient, ImportAccepted, ImportRequest, ImportResult,
    ImportTarget, Rejection,
};
use crate::loader::load_spec;
use crate::validate::{validate, SpecSummary};

/// Pipeline step, used to attribute a halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Convert,
    Validate,
    Encode,
    Import,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Convert => "convert",
            Stage::Validate => "validate",
            Stage::Encode => "encode",
            Stage::Import => "import",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States visited by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Loaded,
    Converted,
    Validated,
    Encoded,
    Accepted,
    Rejected,
    Halted,
}

/// Terminal result of a run.
#[derive(Debug)]
pub enum Outcome {
    Accepted(ImportAccepted),
    Rejected(Rejection),
    /// No gateway verdict was obtained.
    Halted { stage: Stage, error: PipelineError },
}

impl Outcome {
    pub fn state(&self) -> PipelineState {
        match self {
            Outcome::Accepted(_) => PipelineState::Accepted,
            Outcome::Rejected(_) => PipelineState::Rejected,
            Outcome::Halted { .. } => PipelineState::Halted,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum OutcomeView<'a> {
    Accepted(&'a ImportAccepted),
    Rejected(&'a Rejection),
    Halted {
        stage: Stage,
        code: &'static str,
        kind: &'static str,
        message: String,
    },
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let view = match self {
            Outcome::Accepted(accepted) => OutcomeView::Accepted(accepted),
            Outcome::Rejected(rejection) => OutcomeView::Rejected(rejection),
            Outcome::Halted { stage, error } => OutcomeView::Halted {
                stage: *stage,
                code: error.code(),
                kind: error.kind().as_str(),
                message: error.to_string(),
            },
        };
        view.serialize(serializer)
    }
}

/// Artifacts written during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactsWritten {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoded: Option<PathBuf>,
}

/// Everything known about a finished run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub spec: PathBuf,
    pub target: String,
    pub states: Vec<PipelineState>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SpecSummary>,
    pub artifacts: ArtifactsWritten,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<DeployResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Accepted, and the stage deployment (if any) succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_accepted()
            && self
                .deployment
                .as_ref()
                .map_or(true, DeployResult::is_deployed)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

struct Halt {
    stage: Stage,
    error: PipelineError,
}

fn at(stage: Stage) -> impl Fn(PipelineError) -> Halt {
    move |error| Halt { stage, error }
}

#[derive(Default)]
struct Progress {
    states: Vec<PipelineState>,
    artifacts: ArtifactsWritten,
    summary: Option<SpecSummary>,
}

/// Runs the deployment for one configuration.
pub struct Pipeline<C, G> {
    config: DeployConfig,
    converter: C,
    gateway: G,
}

impl<C: Converter, G: GatewayClient> Pipeline<C, G> {
    pub fn new(config: DeployConfig, converter: C, gateway: G) -> Self {
        Self {
            config,
            converter,
            gateway,
        }
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    /// Execute the run. Never panics and never retries; every failure is
    /// captured in the returned report.
    pub fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let target = self.config.gateway.import_target();

        postern_telemetry::log_pipeline_started!(
            spec = %self.config.spec.display(),
            target = %target
        );

        let mut progress = Progress::default();
        let outcome = match self.submit(&target, &mut progress) {
            Ok(ImportResult::Accepted(accepted)) => {
                postern_telemetry::log_import_accepted!(
                    rest_api_id = %accepted.id,
                    warnings = accepted.warnings.len()
                );
                Outcome::Accepted(accepted)
            }
            Ok(ImportResult::Rejected(rejection)) => {
                postern_telemetry::log_import_rejected!(
                    diagnostic = %rejection.diagnostic,
                    http_status = rejection.http_status.unwrap_or_default(),
                    error_type = rejection.error_type.as_deref().unwrap_or("")
                );
                Outcome::Rejected(rejection)
            }
            Err(Halt { stage, error }) => {
                postern_telemetry::log_pipeline_halted!(
                    stage = %stage,
                    code = error.code(),
                    error = %error
                );
                self.discard_stale_artifacts(&progress.artifacts);
                Outcome::Halted { stage, error }
            }
        };
        progress.states.push(outcome.state());

        let deployment = self.deploy_stage(&outcome, &target);

        RunReport {
            spec: self.config.spec.clone(),
            target: target.to_string(),
            states: progress.states,
            outcome,
            summary: progress.summary,
            artifacts: progress.artifacts,
            deployment,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn submit(
        &self,
        target: &ImportTarget,
        progress: &mut Progress,
    ) -> Result<ImportResult, Halt> {
        let document = load_spec(&self.config.spec).map_err(at(Stage::Load))?;
        progress.states.push(PipelineState::Loaded);

        let converted = self
            .converter
            .convert(&document)
            .map_err(at(Stage::Convert))?;
        let json_path = self.config.json_path();
        write_artifact(&json_path, converted.as_bytes()).map_err(at(Stage::Convert))?;
        progress.artifacts.json = Some(json_path);
        progress.states.push(PipelineState::Converted);

        let validated = validate(&converted).map_err(at(Stage::Validate))?;
        progress.summary = Some(validated.summary().clone());
        progress.states.push(PipelineState::Validated);

        let payload = encode(&validated).map_err(at(Stage::Encode))?;
        let encoded_path = self.config.encoded_path();
        write_payload(&encoded_path, &payload).map_err(at(Stage::Encode))?;
        progress.artifacts.encoded = Some(encoded_path);
        progress.states.push(PipelineState::Encoded);

        self.gateway
            .import(&ImportRequest {
                payload: &payload,
                target,
                fail_on_warnings: self.config.gateway.fail_on_warnings,
                endpoint_type: self.config.gateway.endpoint_type,
            })
            .map_err(at(Stage::Import))
    }

    /// Remove intermediates left by an earlier run that this run did not
    /// get far enough to rewrite.
    fn discard_stale_artifacts(&self, written: &ArtifactsWritten) {
        let stale = [
            (written.json.is_none(), self.config.json_path()),
            (written.encoded.is_none(), self.config.encoded_path()),
        ];
        for (_, path) in stale.iter().filter(|(unwritten, _)| *unwritten) {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed stale artifact"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove stale artifact"
                ),
            }
        }
    }

    fn deploy_stage(&self, outcome: &Outcome, target: &ImportTarget) -> Option<DeployResult> {
        let stage = self.config.gateway.stage.as_deref()?;
        let rest_api_id = match outcome {
            Outcome::Accepted(accepted) => accepted.id.as_str(),
            Outcome::Rejected(_) if self.config.on_rejection == RejectionPolicy::Continue => {
                target.rest_api_id()?
            }
            _ => return None,
        };

        let request = DeployRequest {
            rest_api_id,
            stage,
            description: self.config.gateway.stage_description.as_deref(),
        };
        let result = self
            .gateway
            .deploy(&request)
            .unwrap_or_else(|e| DeployResult::Failed {
                stage: stage.to_string(),
                diagnostic: e.to_string(),
            });

        match &result {
            DeployResult::Deployed {
                stage,
                deployment_id,
            } => {
                postern_telemetry::log_deployment_created!(
                    rest_api_id,
                    stage = %stage,
                    deployment_id = %deployment_id
                );
            }
            DeployResult::Failed { stage, diagnostic } => {
                postern_telemetry::log_deployment_failed!(
                    rest_api_id,
                    stage = %stage,
                    diagnostic = %diagnostic
                );
            }
        }
        Some(result)
    }
}

/// Write an artifact, creating parent directories as needed.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let write_err = |source| PipelineError::WriteArtifact {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, bytes).map_err(write_err)?;

    postern_telemetry::log_artifact_written!(path = %path.display(), bytes = bytes.len());
    Ok(())
}

/// Write the base64 payload as a single line.
pub fn write_payload(path: &Path, payload: &EncodedPayload) -> Result<(), PipelineError> {
    let mut text = String::with_capacity(payload.len() + 1);
    text.push_str(payload.as_str());
    text.push('\n');
    write_artifact(path, text.as_bytes())
}
