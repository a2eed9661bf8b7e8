//! AwsGatewayClient against a mock API Gateway.

use std::collections::BTreeMap;
use std::time::Duration;

use postern_pipeline::{
    AwsClientConfig, AwsGatewayClient, DeployRequest, DeployResult, EncodedPayload, EndpointType,
    GatewayClient, ImportMode, ImportRequest, ImportResult, ImportTarget, PipelineError,
};
use postern_sigv4::{Scope, SigningRequest};

use crate::gateway::{MockGateway, TEST_REGION};

const TIMEOUT: Duration = Duration::from_secs(5);

fn payload() -> EncodedPayload {
    // {"openapi": "3.0.1", "paths": {}}
    EncodedPayload::from_text("eyJvcGVuYXBpIjogIjMuMC4xIiwgInBhdGhzIjoge319").unwrap()
}

fn import(
    mock: &MockGateway,
    target: &ImportTarget,
    timeout: Duration,
) -> Result<ImportResult, PipelineError> {
    let payload = payload();
    mock.client(timeout).unwrap().import(&ImportRequest {
        payload: &payload,
        target,
        fail_on_warnings: true,
        endpoint_type: EndpointType::Edge,
    })
}

#[test]
fn import_new_api_is_accepted() {
    let mock = MockGateway::start().unwrap();
    mock.accept_import("a1b2c3d4e5", "Pet Store");

    let result = import(&mock, &ImportTarget::New, TIMEOUT).unwrap();
    match result {
        ImportResult::Accepted(accepted) => {
            assert_eq!(accepted.id, "a1b2c3d4e5");
            assert_eq!(accepted.name.as_deref(), Some("Pet Store"));
        }
        other => panic!("expected accepted, got {:?}", other),
    }

    let requests = mock.received();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method.as_str(), "POST");

    let query: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();
    assert!(query.contains(&("mode".into(), "import".into())));
    assert!(query.contains(&("failonwarnings".into(), "true".into())));
    assert!(query.contains(&("endpointConfigurationTypes".into(), "EDGE".into())));

    // The blob travels as raw JSON bytes, not as base64 text.
    assert_eq!(request.body, br#"{"openapi": "3.0.1", "paths": {}}"#);

    let authorization = request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert!(
        authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"),
        "{}",
        authorization
    );
    assert!(
        authorization.contains("/us-east-1/apigateway/aws4_request"),
        "{}",
        authorization
    );
    assert!(request.headers.get("x-amz-date").is_some());
}

#[test]
fn import_existing_api_uses_put_and_falls_back_to_target_id() {
    let mock = MockGateway::start().unwrap();
    mock.mount(
        wiremock::Mock::given(wiremock::matchers::method("PUT"))
            .and(wiremock::matchers::path("/restapis/a1b2c3d4e5"))
            .and(wiremock::matchers::query_param("mode", "merge"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("{}")),
    );

    let target = ImportTarget::Existing {
        rest_api_id: "a1b2c3d4e5".into(),
        mode: ImportMode::Merge,
    };
    match import(&mock, &target, TIMEOUT).unwrap() {
        ImportResult::Accepted(accepted) => assert_eq!(accepted.id, "a1b2c3d4e5"),
        other => panic!("expected accepted, got {:?}", other),
    }
}

#[test]
fn import_rejection_carries_diagnostic() {
    let mock = MockGateway::start().unwrap();
    mock.reject_import(
        400,
        "BadRequestException:http://internal.amazon.com/coral/com.amazonaws.backplane.controlplane/",
        "Invalid OpenAPI input.",
    );

    match import(&mock, &ImportTarget::New, TIMEOUT).unwrap() {
        ImportResult::Rejected(rejection) => {
            assert_eq!(rejection.diagnostic, "Invalid OpenAPI input.");
            assert_eq!(rejection.http_status, Some(400));
            assert_eq!(rejection.error_type.as_deref(), Some("BadRequestException"));
        }
        other => panic!("expected rejected, got {:?}", other),
    }
    // No retry.
    assert_eq!(mock.received().len(), 1);
}

#[test]
fn server_error_is_rejection_not_retry() {
    let mock = MockGateway::start().unwrap();
    mock.reject_import(429, "TooManyRequestsException", "Too Many Requests");

    let result = import(&mock, &ImportTarget::New, TIMEOUT).unwrap();
    assert!(matches!(result, ImportResult::Rejected(_)));
    assert_eq!(mock.received().len(), 1);
}

#[test]
fn slow_gateway_times_out() {
    let mock = MockGateway::start().unwrap();
    mock.stall_import(Duration::from_secs(3));

    let timeout = Duration::from_millis(500);
    let err = import(&mock, &ImportTarget::New, timeout).unwrap_err();
    assert!(
        matches!(err, PipelineError::Timeout(d) if d == timeout),
        "{:?}",
        err
    );
}

#[test]
fn deployment_is_created() {
    let mock = MockGateway::start().unwrap();
    mock.accept_deployment("a1b2c3d4e5", "dep123");

    let result = mock
        .client(TIMEOUT)
        .unwrap()
        .deploy(&DeployRequest {
            rest_api_id: "a1b2c3d4e5",
            stage: "prod",
            description: Some("release 42"),
        })
        .unwrap();
    assert_eq!(
        result,
        DeployResult::Deployed {
            stage: "prod".into(),
            deployment_id: "dep123".into(),
        }
    );

    let requests = mock.received();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"stageName": "prod", "description": "release 42"})
    );
}

#[test]
fn deployment_failure_is_reported() {
    // Nothing mounted: wiremock answers 404.
    let mock = MockGateway::start().unwrap();

    let result = mock
        .client(TIMEOUT)
        .unwrap()
        .deploy(&DeployRequest {
            rest_api_id: "missing",
            stage: "prod",
            description: None,
        })
        .unwrap();
    assert_eq!(
        result,
        DeployResult::Failed {
            stage: "prod".into(),
            diagnostic: "HTTP 404".into(),
        }
    );
}

#[test]
fn signature_covers_escaped_endpoint_path() {
    let mock = MockGateway::start().unwrap();
    mock.mount(
        wiremock::Mock::given(wiremock::matchers::method("POST")).respond_with(
            wiremock::ResponseTemplate::new(201)
                .set_body_json(serde_json::json!({ "id": "a1b2c3d4e5" })),
        ),
    );

    let client = AwsGatewayClient::new(
        AwsClientConfig {
            region: TEST_REGION.into(),
            endpoint: Some(format!("{}/local%20stack", mock.uri())),
            timeout: TIMEOUT,
            connect_timeout: TIMEOUT,
        },
        MockGateway::credentials(),
    )
    .unwrap();
    let payload = payload();
    let result = client
        .import(&ImportRequest {
            payload: &payload,
            target: &ImportTarget::New,
            fail_on_warnings: false,
            endpoint_type: EndpointType::Regional,
        })
        .unwrap();
    assert!(matches!(result, ImportResult::Accepted(_)));

    let requests = mock.received();
    let request = &requests[0];
    assert_eq!(request.url.path(), "/local%20stack/restapis");

    // Re-sign what the server saw and compare.
    let header = |name: &str| {
        request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string()
    };
    let signed_at = chrono::NaiveDateTime::parse_from_str(&header("x-amz-date"), "%Y%m%dT%H%M%SZ")
        .unwrap()
        .and_utc()
        .timestamp() as u64;
    let mut headers = BTreeMap::new();
    for name in ["host", "content-type", "accept"] {
        headers.insert(name.to_string(), header(name));
    }
    let query: Vec<(String, String)> = request.url.query_pairs().into_owned().collect();

    let expected = postern_sigv4::sign(
        &SigningRequest {
            method: "POST",
            path: request.url.path(),
            query: &query,
            headers: &headers,
            body: &request.body,
        },
        &MockGateway::credentials().credentials,
        Scope {
            region: TEST_REGION,
            service: "apigateway",
        },
        signed_at,
    );
    assert_eq!(header("authorization"), expected.authorization);
}
