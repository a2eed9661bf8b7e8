//! CLI regression tests for the `postern` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in flag
//! names, exit codes, and output formats.
//!
//! Run with: `cargo test -p postern-test`
//! Requires the `postern` binary to be built first (`cargo build -p postern`).

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

use crate::gateway::{fixtures, MockGateway, TEST_ACCESS_KEY_ID, TEST_SECRET_ACCESS_KEY};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ENV_VARS: &[&str] = &[
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_REGION",
    "AWS_DEFAULT_REGION",
    "POSTERN_CONFIG",
    "POSTERN_SPEC",
    "POSTERN_REGION",
    "POSTERN_ENDPOINT",
    "POSTERN_REST_API_ID",
    "POSTERN_STAGE",
    "RUST_LOG",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
];

/// Returns an assert_cmd Command wrapping the `postern` binary, with a
/// clean environment and quiet logs.
fn postern() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("postern")
        .expect("postern binary not found, run `cargo build -p postern` first");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.env("POSTERN_LOG_LEVEL", "error");
    cmd
}

/// `postern` with test credentials exported.
fn postern_with_credentials() -> Command {
    let mut cmd = postern();
    cmd.env("AWS_ACCESS_KEY_ID", TEST_ACCESS_KEY_ID)
        .env("AWS_SECRET_ACCESS_KEY", TEST_SECRET_ACCESS_KEY);
    cmd
}

/// Copy a fixture into `dir/api/openapi.yml`, the default spec location.
fn project_with(fixture: &str) -> (TempDir, PathBuf) {
    let temp = TempDir::new().expect("temp dir");
    let spec = temp.path().join("api/openapi.yml");
    std::fs::create_dir_all(spec.parent().expect("api/")).expect("mkdir api");
    std::fs::copy(fixtures().join(fixture), &spec).expect("copy fixture");
    (temp, spec)
}

fn deploy_against(mock: &MockGateway, dir: &Path) -> Command {
    let mut cmd = postern_with_credentials();
    cmd.current_dir(dir)
        .args(["deploy", "--region", "us-east-1", "--endpoint"])
        .arg(mock.uri());
    cmd
}

// ---------------------------------------------------------------------------
// postern --help
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    postern()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("deploy"))
        .stdout(contains("validate"))
        .stdout(contains("convert"))
        .stdout(contains("encode"))
        .stdout(contains("decode"));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    postern().arg("publish").assert().failure().code(2);
}

// ---------------------------------------------------------------------------
// postern validate
// ---------------------------------------------------------------------------

#[test]
fn validate_valid_spec_exits_zero() {
    postern()
        .args(["validate", "--spec"])
        .arg(fixtures().join("openapi.yml"))
        .assert()
        .success()
        .stdout(contains("is valid (2 path(s), 3 operation(s)"));
}

#[test]
fn validate_json_format_reports_summary() {
    let output = postern()
        .args(["validate", "--format", "json", "--spec"])
        .arg(fixtures().join("openapi.yml"))
        .output()
        .expect("run postern");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(json["valid"], true);
    assert_eq!(json["summary"]["title"], "Pet Store");
    assert_eq!(json["summary"]["paths"], 2);
    assert_eq!(json["summary"]["operations"], 3);
    assert!(json["summary"]["gateway_extensions"]
        .as_array()
        .expect("array")
        .contains(&serde_json::json!("x-amazon-apigateway-integration")));
}

#[test]
fn validate_empty_paths_is_valid() {
    postern()
        .args(["validate", "--spec"])
        .arg(fixtures().join("empty-paths.yml"))
        .assert()
        .success()
        .stdout(contains("0 path(s)"));
}

#[test]
fn validate_malformed_yaml_exits_one() {
    postern()
        .args(["validate", "--spec"])
        .arg(fixtures().join("invalid-indentation.yml"))
        .assert()
        .failure()
        .code(1)
        .stdout(contains("E2010"));
}

#[test]
fn validate_non_object_root_exits_one() {
    postern()
        .args(["validate", "--spec"])
        .arg(fixtures().join("list-root.yml"))
        .assert()
        .failure()
        .code(1)
        .stdout(contains("E2020"));
}

#[test]
fn validate_missing_file_exits_three() {
    postern()
        .args(["validate", "--spec", "this-file-does-not-exist.yml"])
        .assert()
        .failure()
        .code(3)
        .stdout(contains("E2001"));
}

#[test]
fn validate_writes_no_artifacts() {
    let (temp, _spec) = project_with("openapi.yml");
    postern()
        .current_dir(temp.path())
        .arg("validate")
        .assert()
        .success();
    assert!(!temp.path().join("api/openapi.json").exists());
}

// ---------------------------------------------------------------------------
// postern convert / encode / decode
// ---------------------------------------------------------------------------

#[test]
fn convert_writes_sibling_json() {
    let (temp, _spec) = project_with("openapi.yml");
    postern()
        .current_dir(temp.path())
        .arg("convert")
        .assert()
        .success()
        .stderr(contains("api/openapi.json"));

    let json: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(temp.path().join("api/openapi.json")).expect("artifact"),
    )
    .expect("valid json");
    assert_eq!(json["openapi"], "3.0.1");
    assert_eq!(json["info"]["version"], "1.0");
    assert_eq!(
        json["paths"]["/pets"]["get"]["x-amazon-apigateway-integration"]["type"],
        "http_proxy"
    );
}

#[test]
fn convert_malformed_yaml_writes_nothing() {
    let (temp, _spec) = project_with("invalid-indentation.yml");
    postern()
        .current_dir(temp.path())
        .arg("convert")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2010"));
    assert!(!temp.path().join("api/openapi.json").exists());
}

#[test]
fn encode_then_decode_round_trips() {
    let (temp, _spec) = project_with("openapi.yml");
    postern()
        .current_dir(temp.path())
        .arg("encode")
        .assert()
        .success();

    let encoded = temp.path().join("api/openapi.json.b64");
    assert!(encoded.exists());

    let output = postern()
        .arg("decode")
        .arg(&encoded)
        .output()
        .expect("run postern");
    assert!(output.status.success());
    let original = std::fs::read(temp.path().join("api/openapi.json")).expect("artifact");
    assert_eq!(output.stdout, original);

    postern()
        .arg("decode")
        .arg(&encoded)
        .arg("--yaml")
        .assert()
        .success()
        .stdout(contains("title: Pet Store"))
        .stdout(contains("operationId: listPets"));
}

#[test]
fn decode_invalid_base64_fails() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("payload.b64");
    std::fs::write(&path, "not base64!").expect("write");
    postern()
        .arg("decode")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2030"));
}

// ---------------------------------------------------------------------------
// postern deploy
// ---------------------------------------------------------------------------

#[test]
fn deploy_accepted_surfaces_identifier() {
    let mock = MockGateway::start().expect("mock gateway");
    mock.accept_import("a1b2c3d4e5", "Pet Store");
    let (temp, _spec) = project_with("openapi.yml");

    deploy_against(&mock, temp.path())
        .assert()
        .success()
        .stdout(contains("REST API a1b2c3d4e5"));

    assert!(temp.path().join("api/openapi.json").exists());
    assert!(temp.path().join("api/openapi.json.b64").exists());
    assert_eq!(mock.received().len(), 1);
}

#[test]
fn deploy_rejected_exits_one_with_diagnostic() {
    let mock = MockGateway::start().expect("mock gateway");
    mock.reject_import(400, "BadRequestException", "Invalid OpenAPI input.");
    let (temp, _spec) = project_with("openapi.yml");

    deploy_against(&mock, temp.path())
        .assert()
        .failure()
        .code(1)
        .stdout(contains("Invalid OpenAPI input."));
}

#[test]
fn deploy_invalid_spec_never_calls_gateway() {
    let mock = MockGateway::start().expect("mock gateway");
    mock.accept_import("a1b2c3d4e5", "Pet Store");
    let (temp, _spec) = project_with("list-root.yml");

    deploy_against(&mock, temp.path())
        .assert()
        .failure()
        .code(3)
        .stdout(contains("halted at validate"));
    assert!(mock.received().is_empty());
}

#[test]
fn deploy_without_credentials_halts() {
    let mock = MockGateway::start().expect("mock gateway");
    mock.accept_import("a1b2c3d4e5", "Pet Store");
    let (temp, _spec) = project_with("openapi.yml");

    postern()
        .current_dir(temp.path())
        .args(["deploy", "--region", "us-east-1", "--endpoint"])
        .arg(mock.uri())
        .assert()
        .failure()
        .code(3)
        .stdout(contains("E2042"));
    assert!(mock.received().is_empty());
}

#[test]
fn deploy_without_region_is_config_error() {
    let (temp, _spec) = project_with("openapi.yml");
    postern_with_credentials()
        .current_dir(temp.path())
        .arg("deploy")
        .assert()
        .failure()
        .code(3)
        .stderr(contains("E2050"));
}

#[test]
fn deploy_invalid_mode_is_config_error() {
    let (temp, _spec) = project_with("openapi.yml");
    postern_with_credentials()
        .current_dir(temp.path())
        .args([
            "deploy",
            "--region",
            "us-east-1",
            "--rest-api-id",
            "a1b2c3d4e5",
            "--mode",
            "replace",
        ])
        .assert()
        .failure()
        .code(3)
        .stderr(contains("invalid mode"));
}

#[test]
fn deploy_json_report_and_stage() {
    let mock = MockGateway::start().expect("mock gateway");
    mock.accept_import("a1b2c3d4e5", "Pet Store");
    mock.accept_deployment("a1b2c3d4e5", "dep123");
    let (temp, _spec) = project_with("openapi.yml");
    let report = temp.path().join("build/report.json");

    let output = deploy_against(&mock, temp.path())
        .args(["--stage", "prod", "--format", "json", "--report"])
        .arg(&report)
        .output()
        .expect("run postern");
    assert!(output.status.success());

    let stdout: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(stdout["outcome"]["status"], "accepted");
    assert_eq!(stdout["outcome"]["id"], "a1b2c3d4e5");
    assert_eq!(stdout["deployment"]["status"], "deployed");
    assert_eq!(stdout["deployment"]["deployment_id"], "dep123");
    assert_eq!(
        stdout["states"],
        serde_json::json!(["loaded", "converted", "validated", "encoded", "accepted"])
    );

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).expect("report")).expect("json");
    assert_eq!(written["outcome"]["id"], "a1b2c3d4e5");
}

#[test]
fn deploy_reads_config_file() {
    let mock = MockGateway::start().expect("mock gateway");
    mock.accept_import("a1b2c3d4e5", "Pet Store");
    let (temp, _spec) = project_with("openapi.yml");
    std::fs::write(
        temp.path().join("postern.yaml"),
        format!(
            "spec: api/openapi.yml\nartifacts:\n  json: build/wire.json\ngateway:\n  region: us-east-1\n  endpoint: {}\n",
            mock.uri()
        ),
    )
    .expect("write config");

    postern_with_credentials()
        .current_dir(temp.path())
        .arg("deploy")
        .assert()
        .success();
    assert!(temp.path().join("build/wire.json").exists());
    assert!(temp.path().join("build/wire.json.b64").exists());
}

#[test]
fn deploy_rejects_unknown_config_field() {
    let (temp, _spec) = project_with("openapi.yml");
    std::fs::write(temp.path().join("postern.yaml"), "gateway:\n  regoin: us-east-1\n")
        .expect("write config");

    postern_with_credentials()
        .current_dir(temp.path())
        .arg("deploy")
        .assert()
        .failure()
        .code(3)
        .stderr(contains("E2050"));
}

#[test]
fn deploy_flags_complete_config_file() {
    let mock = MockGateway::start().expect("mock gateway");
    mock.accept_import("a1b2c3d4e5", "Pet Store");
    let (temp, _spec) = project_with("openapi.yml");
    // Only valid once the flags below are applied.
    std::fs::write(
        temp.path().join("postern.yaml"),
        "gateway:\n  mode: merge\n  timeout_secs: 0\n",
    )
    .expect("write config");

    deploy_against(&mock, temp.path())
        .args(["--rest-api-id", "a1b2c3d4e5", "--timeout", "5"])
        .assert()
        .success()
        .stdout(contains("REST API a1b2c3d4e5"));

    let requests = mock.received();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method.as_str(), "PUT");
    assert_eq!(requests[0].url.path(), "/restapis/a1b2c3d4e5");
    assert!(requests[0]
        .url
        .query_pairs()
        .any(|(k, v)| k == "mode" && v == "merge"));
}

#[test]
fn deploy_report_over_spec_is_config_error() {
    let mock = MockGateway::start().expect("mock gateway");
    mock.accept_import("a1b2c3d4e5", "Pet Store");
    let (temp, spec) = project_with("openapi.yml");
    let original = std::fs::read(&spec).expect("read spec");

    deploy_against(&mock, temp.path())
        .args(["--report", "api/openapi.yml"])
        .assert()
        .failure()
        .code(3)
        .stderr(contains("artifacts.report"));

    assert_eq!(std::fs::read(&spec).expect("read spec"), original);
    assert!(mock.received().is_empty());
}

#[test]
fn deploy_rejects_malformed_rest_api_id() {
    let mock = MockGateway::start().expect("mock gateway");
    let (temp, _spec) = project_with("openapi.yml");

    deploy_against(&mock, temp.path())
        .args(["--rest-api-id", "../a1b2"])
        .assert()
        .failure()
        .code(3)
        .stderr(contains("E2050"));
    assert!(mock.received().is_empty());
}
