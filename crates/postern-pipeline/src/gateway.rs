//! Gateway importer boundary.
//!
//! [`GatewayClient`] is the seam between the pipeline and the API
//! management service. [`crate::aws::AwsGatewayClient`] talks to AWS API
//! Gateway; tests plug in fakes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encode::EncodedPayload;
use crate::error::PipelineError;

/// How an import into an existing API treats the current definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Merge the new definition into the existing one.
    Merge,
    /// Replace the existing definition.
    #[default]
    Overwrite,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Merge => "merge",
            ImportMode::Overwrite => "overwrite",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "merge" => Some(Self::Merge),
            "overwrite" => Some(Self::Overwrite),
            _ => None,
        }
    }
}

/// Endpoint configuration for a newly imported API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointType {
    #[default]
    Regional,
    Edge,
    Private,
}

impl EndpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointType::Regional => "REGIONAL",
            EndpointType::Edge => "EDGE",
            EndpointType::Private => "PRIVATE",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "REGIONAL" => Some(Self::Regional),
            "EDGE" => Some(Self::Edge),
            "PRIVATE" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Where the payload is imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// Create a new REST API from the definition.
    New,
    /// Update an existing REST API in place.
    Existing {
        rest_api_id: String,
        mode: ImportMode,
    },
}

impl ImportTarget {
    pub fn rest_api_id(&self) -> Option<&str> {
        match self {
            ImportTarget::New => None,
            ImportTarget::Existing { rest_api_id, .. } => Some(rest_api_id),
        }
    }
}

impl fmt::Display for ImportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportTarget::New => write!(f, "new REST API"),
            ImportTarget::Existing { rest_api_id, mode } => {
                write!(f, "REST API {} ({})", rest_api_id, mode.as_str())
            }
        }
    }
}

/// A single import submission.
#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    pub payload: &'a EncodedPayload,
    pub target: &'a ImportTarget,
    /// Ask the gateway to roll back on warnings instead of ignoring them.
    pub fail_on_warnings: bool,
    /// Only used when creating a new API.
    pub endpoint_type: EndpointType,
}

/// The gateway accepted the definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportAccepted {
    /// Identifier of the created or updated REST API.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// The gateway refused the definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Gateway-provided explanation.
    pub diagnostic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

/// Terminal result of an import. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportResult {
    Accepted(ImportAccepted),
    Rejected(Rejection),
}

/// Request to publish the current definition of an API to a stage.
#[derive(Debug, Clone)]
pub struct DeployRequest<'a> {
    pub rest_api_id: &'a str,
    pub stage: &'a str,
    pub description: Option<&'a str>,
}

/// Outcome of a stage deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeployResult {
    Deployed { stage: String, deployment_id: String },
    Failed { stage: String, diagnostic: String },
}

impl DeployResult {
    pub fn is_deployed(&self) -> bool {
        matches!(self, DeployResult::Deployed { .. })
    }
}

/// The external API management service.
pub trait GatewayClient {
    /// Submit a definition. `Err` means no verdict was obtained
    /// (timeout, transport failure, missing credentials).
    fn import(&self, request: &ImportRequest) -> Result<ImportResult, PipelineError>;

    /// Deploy the current definition of an API to a stage.
    fn deploy(&self, request: &DeployRequest) -> Result<DeployResult, PipelineError>;
}

impl<T: GatewayClient + ?Sized> GatewayClient for &T {
    fn import(&self, request: &ImportRequest) -> Result<ImportResult, PipelineError> {
        (**self).import(request)
    }

    fn deploy(&self, request: &DeployRequest) -> Result<DeployResult, PipelineError> {
        (**self).deploy(request)
    }
}
