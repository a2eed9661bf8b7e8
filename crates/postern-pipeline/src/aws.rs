//! AWS API Gateway importer.
//!
//! Wraps the `ImportRestApi`, `PutRestApi` and `CreateDeployment` REST
//! calls, signed with SigV4. One request per call, no retries.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{Method, Url};
use serde::Deserialize;

use postern_sigv4::{Scope, SigningRequest};

use crate::config::GatewayConfig;
use crate::credentials::CredentialStore;
use crate::error::PipelineError;
use crate::gateway::{
    DeployRequest, DeployResult, GatewayClient, ImportAccepted, ImportRequest, ImportResult,
    ImportTarget, Rejection,
};

/// SigV4 service name for API Gateway.
pub const SERVICE: &str = "apigateway";

const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Connection settings for [`AwsGatewayClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsClientConfig {
    pub region: String,
    /// Base URL override. Defaults to `https://apigateway.{region}.amazonaws.com`.
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl AwsClientConfig {
    /// Build from gateway settings. The region falls back to the one
    /// advertised by `store`.
    pub fn resolve(
        gateway: &GatewayConfig,
        store: &dyn CredentialStore,
    ) -> Result<Self, PipelineError> {
        let region = gateway
            .region
            .clone()
            .filter(|r| !r.trim().is_empty())
            .or_else(|| store.region())
            .ok_or_else(|| {
                PipelineError::Config(
                    "no AWS region: set gateway.region or AWS_REGION".into(),
                )
            })?;

        Ok(Self {
            region,
            endpoint: gateway.endpoint.clone(),
            timeout: gateway.timeout(),
            connect_timeout: gateway.connect_timeout(),
        })
    }

    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://apigateway.{}.amazonaws.com", self.region),
        }
    }
}

/// Raw gateway response.
#[derive(Debug)]
struct GatewayResponse {
    status: u16,
    error_type: Option<String>,
    body: String,
}

impl GatewayResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn diagnostic(&self) -> String {
        diagnostic_from_body(&self.body).unwrap_or_else(|| format!("HTTP {}", self.status))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RestApiBody {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentBody {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// [`GatewayClient`] for AWS API Gateway.
pub struct AwsGatewayClient<S> {
    http: Client,
    base_url: Url,
    config: AwsClientConfig,
    store: S,
}

impl<S: CredentialStore> AwsGatewayClient<S> {
    pub fn new(config: AwsClientConfig, store: S) -> Result<Self, PipelineError> {
        let base = config.base_url();
        let base_url = Url::parse(&base).map_err(|e| {
            PipelineError::Config(format!("invalid gateway endpoint {}: {}", base, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
            return Err(PipelineError::Config(format!(
                "invalid gateway endpoint {}: expected an http(s) URL",
                base
            )));
        }

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| PipelineError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            config,
            store,
        })
    }

    pub fn config(&self) -> &AwsClientConfig {
        &self.config
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<GatewayResponse, PipelineError> {
        let creds = self.store.credentials()?;

        let full_path = format!("{}{}", self.base_url.path().trim_end_matches('/'), path);
        let mut url = self.base_url.clone();
        url.set_path(&full_path);
        url.set_query(None);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter());
        }

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), host_header(&url));
        headers.insert("content-type".to_string(), content_type.to_string());
        headers.insert("accept".to_string(), "application/json".to_string());

        // Sign the path exactly as it goes on the wire.
        let signed = postern_sigv4::sign(
            &SigningRequest {
                method: method.as_str(),
                path: url.path(),
                query: &query,
                headers: &headers,
                body: &body,
            },
            &creds,
            Scope {
                region: &self.config.region,
                service: SERVICE,
            },
            now_secs(),
        );

        // reqwest derives Host from the URL.
        let mut builder = self.http.request(method, url);
        for (name, value) in headers.iter().filter(|(name, _)| name.as_str() != "host") {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (name, value) in signed.pairs() {
            builder = builder.header(name, value);
        }

        let response = builder.body(body).send().map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let error_type = response
            .headers()
            .get(ERROR_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(normalize_error_type);
        let body = response.text().map_err(|e| self.classify(e))?;

        tracing::debug!(status, path = %full_path, "gateway responded");

        Ok(GatewayResponse {
            status,
            error_type,
            body,
        })
    }

    fn classify(&self, error: reqwest::Error) -> PipelineError {
        if error.is_timeout() {
            PipelineError::Timeout(self.config.timeout)
        } else if error.is_connect() {
            PipelineError::Transport(format!("connection failed: {}", error))
        } else {
            PipelineError::Transport(error.to_string())
        }
    }
}

impl<S: CredentialStore> GatewayClient for AwsGatewayClient<S> {
    fn import(&self, request: &ImportRequest) -> Result<ImportResult, PipelineError> {
        let body = request.payload.decode()?;
        let fail_on_warnings = request.fail_on_warnings.to_string();

        let (method, path, query) = match request.target {
            ImportTarget::New => (
                Method::POST,
                "/restapis".to_string(),
                vec![
                    pair("mode", "import"),
                    pair("failonwarnings", &fail_on_warnings),
                    pair(
                        "endpointConfigurationTypes",
                        request.endpoint_type.as_str(),
                    ),
                ],
            ),
            ImportTarget::Existing { rest_api_id, mode } => (
                Method::PUT,
                format!("/restapis/{}", rest_api_id),
                vec![
                    pair("mode", mode.as_str()),
                    pair("failonwarnings", &fail_on_warnings),
                ],
            ),
        };

        postern_telemetry::log_import_submitted!(
            target = %request.target,
            bytes = body.len(),
            region = %self.config.region
        );

        let response = self.send(method, &path, query, "application/json", body)?;

        if !response.is_success() {
            return Ok(ImportResult::Rejected(Rejection {
                diagnostic: response.diagnostic(),
                http_status: Some(response.status),
                error_type: response.error_type,
            }));
        }

        let parsed: RestApiBody = serde_json::from_str(&response.body).unwrap_or_default();
        let id = parsed
            .id
            .or_else(|| request.target.rest_api_id().map(str::to_string))
            .ok_or_else(|| {
                PipelineError::Transport(format!(
                    "gateway accepted the import (HTTP {}) but returned no API id",
                    response.status
                ))
            })?;

        Ok(ImportResult::Accepted(ImportAccepted {
            id,
            name: parsed.name,
            warnings: parsed.warnings,
        }))
    }

    fn deploy(&self, request: &DeployRequest) -> Result<DeployResult, PipelineError> {
        let mut body = serde_json::Map::new();
        body.insert("stageName".into(), request.stage.into());
        if let Some(description) = request.description {
            body.insert("description".into(), description.into());
        }
        let body = serde_json::to_vec(&body)
            .map_err(|e| PipelineError::Transport(format!("failed to encode request: {}", e)))?;

        let path = format!("/restapis/{}/deployments", request.rest_api_id);
        let response = self.send(Method::POST, &path, Vec::new(), "application/json", body)?;

        if !response.is_success() {
            return Ok(DeployResult::Failed {
                stage: request.stage.to_string(),
                diagnostic: response.diagnostic(),
            });
        }

        let parsed: DeploymentBody = serde_json::from_str(&response.body).unwrap_or_default();
        Ok(DeployResult::Deployed {
            stage: request.stage.to_string(),
            deployment_id: parsed.id.unwrap_or_default(),
        })
    }
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn now_secs() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// `BadRequestException:http://internal.amazon.com/...` -> `BadRequestException`.
fn normalize_error_type(raw: &str) -> String {
    raw.split(':').next().unwrap_or(raw).trim().to_string()
}

/// Gateway error message, or the trimmed raw body when it isn't the
/// usual `{"message": ...}` shape.
fn diagnostic_from_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<ErrorBody>(trimmed) {
        Ok(ErrorBody {
            message: Some(message),
        }) if !message.trim().is_empty() => Some(message),
        _ => Some(trimmed.to_string()),
    }
}
