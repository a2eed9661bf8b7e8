//! Deploys OpenAPI specs to AWS API Gateway.
//!
//! Loads the YAML authoring document, converts it to the JSON wire format,
//! checks it is well-formed, base64-encodes it and submits it to the
//! gateway, reporting exactly one outcome per run.

pub mod aws;
pub mod config;
pub mod convert;
pub mod credentials;
pub mod encode;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod validate;

pub use aws::{AwsClientConfig, AwsGatewayClient};
pub use config::{ArtifactPaths, DeployConfig, GatewayConfig, RejectionPolicy};
pub use convert::{to_authoring, ConvertedArtifact, Converter, YamlToJson};
pub use credentials::{CredentialStore, Credentials, EnvCredentialStore, StaticCredentials};
pub use encode::{encode, EncodedPayload};
pub use error::{ErrorKind, PipelineError};
pub use gateway::{
    DeployRequest, DeployResult, EndpointType, GatewayClient, ImportAccepted, ImportMode,
    ImportRequest, ImportResult, ImportTarget, Rejection,
};
pub use loader::{load_spec, SpecDocument};
pub use pipeline::{
    write_artifact, write_payload, ArtifactsWritten, Outcome, Pipeline, PipelineState, RunReport,
    Stage,
};
pub use report::{exit_code, write_report, ReportFormat, Reporter};
pub use validate::{validate, SpecSummary, ValidatedArtifact};
