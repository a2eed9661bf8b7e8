//! Deployment configuration (`postern.yaml`).
//!
//! Every path and gateway setting the pipeline needs is carried here and
//! handed to [`crate::pipeline::Pipeline`] at construction time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::gateway::{EndpointType, ImportMode, ImportTarget};

/// Default location of the specification document.
pub const DEFAULT_SPEC_PATH: &str = "api/openapi.yml";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "postern.yaml";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Top-level deployment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Specification document to deploy.
    #[serde(default = "default_spec")]
    pub spec: PathBuf,

    /// Locations of the intermediate artifacts.
    #[serde(default)]
    pub artifacts: ArtifactPaths,

    /// Gateway connection and import settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// What still runs after the gateway rejects an import.
    #[serde(default)]
    pub on_rejection: RejectionPolicy,
}

/// Intermediate artifact paths. Unset paths are derived from the spec path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactPaths {
    #[serde(default)]
    pub json: Option<PathBuf>,
    #[serde(default)]
    pub encoded: Option<PathBuf>,
    /// JSON run report. Not written unless set.
    #[serde(default)]
    pub report: Option<PathBuf>,
}

/// Gateway settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// AWS region. Falls back to the credential store's region.
    #[serde(default)]
    pub region: Option<String>,

    /// Endpoint override (LocalStack, mocks).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Existing REST API to update. A new API is created when unset.
    #[serde(default)]
    pub rest_api_id: Option<String>,

    /// Import mode for an existing API (default: overwrite).
    #[serde(default)]
    pub mode: Option<ImportMode>,

    #[serde(default)]
    pub fail_on_warnings: bool,

    #[serde(default)]
    pub endpoint_type: EndpointType,

    /// Stage to deploy to after a successful import.
    #[serde(default)]
    pub stage: Option<String>,

    #[serde(default)]
    pub stage_description: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            rest_api_id: None,
            mode: None,
            fail_on_warnings: false,
            endpoint_type: EndpointType::default(),
            stage: None,
            stage_description: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn import_target(&self) -> ImportTarget {
        match &self.rest_api_id {
            Some(id) => ImportTarget::Existing {
                rest_api_id: id.clone(),
                mode: self.mode.unwrap_or_default(),
            },
            None => ImportTarget::New,
        }
    }
}

/// Behavior after a gateway rejection. The run fails either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPolicy {
    /// Report the rejection and stop.
    #[default]
    Report,
    /// Report, then still run the stage deployment for an existing API.
    Continue,
}

impl RejectionPolicy {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "report" => Some(Self::Report),
            "continue" => Some(Self::Continue),
            _ => None,
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            spec: default_spec(),
            artifacts: ArtifactPaths::default(),
            gateway: GatewayConfig::default(),
            on_rejection: RejectionPolicy::default(),
        }
    }
}

impl DeployConfig {
    /// Configuration for `spec` with every other setting defaulted.
    pub fn for_spec(spec: impl Into<PathBuf>) -> Self {
        Self {
            spec: spec.into(),
            ..Self::default()
        }
    }

    /// Load a configuration file. Relative paths inside it are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::parse(&content, path)?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    /// Parse configuration from YAML content.
    pub fn parse(content: &str, path: &Path) -> Result<Self, PipelineError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| {
            PipelineError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.spec);
        for path in [
            &mut self.artifacts.json,
            &mut self.artifacts.encoded,
            &mut self.artifacts.report,
        ]
        .into_iter()
        .flatten()
        {
            join(path);
        }
    }

    /// Where the wire-format artifact is written.
    ///
    /// Defaults to the spec's sibling with a `.json` extension, or
    /// `.wire.json` when the spec itself is JSON.
    pub fn json_path(&self) -> PathBuf {
        if let Some(path) = &self.artifacts.json {
            return path.clone();
        }
        let derived = self.spec.with_extension("json");
        if derived == self.spec {
            self.spec.with_extension("wire.json")
        } else {
            derived
        }
    }

    /// Where the base64 payload is written: `<json artifact>.b64`.
    pub fn encoded_path(&self) -> PathBuf {
        if let Some(path) = &self.artifacts.encoded {
            return path.clone();
        }
        let json = self.json_path();
        let mut name = json.as_os_str().to_os_string();
        name.push(".b64");
        PathBuf::from(name)
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.artifacts.report.as_deref()
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.spec.as_os_str().is_empty() {
            return Err(PipelineError::Config("spec path is empty".into()));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "gateway.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.gateway.connect_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "gateway.connect_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.gateway.mode.is_some() && self.gateway.rest_api_id.is_none() {
            return Err(PipelineError::Config(
                "gateway.mode applies to an existing API and requires gateway.rest_api_id".into(),
            ));
        }
        if let Some(id) = &self.gateway.rest_api_id {
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(PipelineError::Config(format!(
                    "gateway.rest_api_id {:?} is not a REST API identifier (expected [A-Za-z0-9]+)",
                    id
                )));
            }
        }
        if matches!(&self.gateway.stage, Some(stage) if stage.trim().is_empty()) {
            return Err(PipelineError::Config("gateway.stage is empty".into()));
        }

        let json = self.json_path();
        let encoded = self.encoded_path();
        let mut artifacts = vec![("json", json.as_path()), ("encoded", encoded.as_path())];
        if let Some(report) = self.report_path() {
            artifacts.push(("report", report));
        }
        for (i, (name, artifact)) in artifacts.iter().enumerate() {
            if *artifact == self.spec {
                return Err(PipelineError::Config(format!(
                    "artifacts.{} would overwrite the spec {}",
                    name,
                    self.spec.display()
                )));
            }
            if let Some((other, _)) = artifacts[..i].iter().find(|(_, p)| p == artifact) {
                return Err(PipelineError::Config(format!(
                    "artifacts.{} and artifacts.{} must differ",
                    other, name
                )));
            }
        }
        Ok(())
    }
}

fn default_spec() -> PathBuf {
    PathBuf::from(DEFAULT_SPEC_PATH)
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}
