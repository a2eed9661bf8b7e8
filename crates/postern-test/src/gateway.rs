//! MockGateway: an API Gateway stand-in on a local port.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use postern_pipeline::{AwsClientConfig, AwsGatewayClient, Credentials, StaticCredentials};

/// Errors from MockGateway operations.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] postern_pipeline::PipelineError),
}

/// Region the mock pretends to serve.
pub const TEST_REGION: &str = "us-east-1";
/// Access key handed to clients of the mock.
pub const TEST_ACCESS_KEY_ID: &str = "AKIDEXAMPLE";
pub const TEST_SECRET_ACCESS_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

/// Wiremock server driven from synchronous code.
///
/// The server lives on its own runtime, so blocking clients (and the
/// `postern` binary) can call it from plain `#[test]` functions.
pub struct MockGateway {
    runtime: Runtime,
    server: MockServer,
}

impl MockGateway {
    pub fn start() -> Result<Self, TestError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        let server = runtime.block_on(MockServer::start());
        Ok(Self { runtime, server })
    }

    /// Base URL, suitable for `--endpoint`.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    /// ImportRestApi and PutRestApi both succeed with `id`.
    pub fn accept_import(&self, id: &str, name: &str) {
        let body = json!({ "id": id, "name": name, "warnings": [] });
        self.mount(
            Mock::given(method("POST"))
                .and(path("/restapis"))
                .respond_with(ResponseTemplate::new(201).set_body_json(body.clone())),
        );
        self.mount(
            Mock::given(method("PUT"))
                .and(path(format!("/restapis/{}", id)))
                .respond_with(ResponseTemplate::new(200).set_body_json(body)),
        );
    }

    /// Every import is refused with `message`.
    pub fn reject_import(&self, status: u16, error_type: &str, message: &str) {
        self.mount(
            Mock::given(path_regex(r"^/restapis(/[^/]+)?$")).respond_with(
                ResponseTemplate::new(status)
                    .insert_header("x-amzn-ErrorType", error_type)
                    .set_body_json(json!({ "message": message })),
            ),
        );
    }

    /// Imports succeed, but only after `delay`.
    pub fn stall_import(&self, delay: Duration) {
        self.mount(
            Mock::given(method("POST"))
                .and(path("/restapis"))
                .respond_with(
                    ResponseTemplate::new(201)
                        .set_body_json(json!({ "id": "late" }))
                        .set_delay(delay),
                ),
        );
    }

    /// CreateDeployment on `rest_api_id` succeeds with `deployment_id`.
    pub fn accept_deployment(&self, rest_api_id: &str, deployment_id: &str) {
        self.mount(
            Mock::given(method("POST"))
                .and(path(format!("/restapis/{}/deployments", rest_api_id)))
                .respond_with(
                    ResponseTemplate::new(201).set_body_json(json!({ "id": deployment_id })),
                ),
        );
    }

    /// Requests received so far.
    pub fn received(&self) -> Vec<Request> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }

    /// Static credentials matching [`TEST_ACCESS_KEY_ID`].
    pub fn credentials() -> StaticCredentials {
        StaticCredentials {
            credentials: Credentials {
                access_key_id: TEST_ACCESS_KEY_ID.into(),
                secret_access_key: TEST_SECRET_ACCESS_KEY.into(),
                session_token: None,
            },
            region: Some(TEST_REGION.into()),
        }
    }

    /// An AWS client pointed at this mock.
    pub fn client(
        &self,
        timeout: Duration,
    ) -> Result<AwsGatewayClient<StaticCredentials>, TestError> {
        let config = AwsClientConfig {
            region: TEST_REGION.into(),
            endpoint: Some(self.uri()),
            timeout,
            connect_timeout: Duration::from_secs(5),
        };
        Ok(AwsGatewayClient::new(config, Self::credentials())?)
    }
}

/// Absolute path to the shared test fixtures directory.
pub fn fixtures() -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/postern-test
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
}
