//! Postern CLI.
//!
//! Converts an OpenAPI spec from YAML to JSON, validates and encodes it,
//! then imports it into AWS API Gateway.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use postern_pipeline::config::DEFAULT_CONFIG_FILE;
use postern_pipeline::report::{EXIT_HALTED, EXIT_REJECTED};
use postern_pipeline::{
    encode, exit_code, load_spec, to_authoring, validate, write_artifact, write_payload,
    write_report, AwsClientConfig, AwsGatewayClient, Converter, DeployConfig, EncodedPayload,
    EndpointType, EnvCredentialStore, ErrorKind, ImportMode, Pipeline, PipelineError,
    RejectionPolicy, ReportFormat, Reporter, YamlToJson,
};
use postern_telemetry::{LogFormat, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(
    name = "postern",
    about = "Deploy OpenAPI specs to AWS API Gateway",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "POSTERN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (json, pretty, compact).
    #[arg(long, global = true, env = "POSTERN_LOG_FORMAT", default_value = "json")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert, validate, encode and import the spec into API Gateway.
    Deploy(DeployArgs),

    /// Convert and validate the spec without contacting the gateway.
    ///
    /// Writes no artifacts.
    Validate {
        #[command(flatten)]
        spec: SpecArgs,

        /// Output format (text or json).
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Convert the spec to its JSON wire format.
    Convert {
        #[command(flatten)]
        spec: SpecArgs,
    },

    /// Convert, validate and base64-encode the spec.
    Encode {
        #[command(flatten)]
        spec: SpecArgs,
    },

    /// Decode a base64 payload back to JSON (or YAML with --yaml).
    Decode {
        /// Base64 payload file.
        input: PathBuf,

        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Render in the YAML authoring format.
        #[arg(long)]
        yaml: bool,
    },
}

#[derive(Args, Debug)]
struct SpecArgs {
    /// Configuration file (default: ./postern.yaml when present).
    #[arg(short, long, env = "POSTERN_CONFIG")]
    config: Option<PathBuf>,

    /// Spec file (default: api/openapi.yml).
    #[arg(short, long, env = "POSTERN_SPEC")]
    spec: Option<PathBuf>,

    /// Path of the JSON artifact.
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// Path of the base64 artifact.
    #[arg(long)]
    encoded_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DeployArgs {
    #[command(flatten)]
    spec: SpecArgs,

    /// AWS region (default: AWS_REGION, then AWS_DEFAULT_REGION).
    #[arg(long, env = "POSTERN_REGION")]
    region: Option<String>,

    /// Gateway endpoint override, e.g. a LocalStack URL.
    #[arg(long, env = "POSTERN_ENDPOINT")]
    endpoint: Option<String>,

    /// Existing REST API to update instead of creating a new one.
    #[arg(long, env = "POSTERN_REST_API_ID")]
    rest_api_id: Option<String>,

    /// Import mode for an existing API (merge or overwrite).
    #[arg(long)]
    mode: Option<String>,

    /// Roll back the import when the gateway reports warnings.
    #[arg(long)]
    fail_on_warnings: bool,

    /// Endpoint type for a new API (REGIONAL, EDGE or PRIVATE).
    #[arg(long)]
    endpoint_type: Option<String>,

    /// Stage to deploy after a successful import.
    #[arg(long, env = "POSTERN_STAGE")]
    stage: Option<String>,

    /// Description of the stage deployment.
    #[arg(long)]
    stage_description: Option<String>,

    /// Gateway request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// What to do after a rejection (report or continue).
    #[arg(long)]
    on_rejection: Option<String>,

    /// Write the JSON run report to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Output format (text or json).
    #[arg(long, default_value = "text")]
    format: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level, &cli.log_format) {
        eprintln!("error: {}", e);
        return ExitCode::from(EXIT_HALTED);
    }

    match cli.command {
        Commands::Deploy(args) => run_deploy(&args),
        Commands::Validate { spec, format } => run_validate(&spec, &format),
        Commands::Convert { spec } => run_convert(&spec),
        Commands::Encode { spec } => run_encode(&spec),
        Commands::Decode {
            input,
            output,
            yaml,
        } => run_decode(&input, output.as_deref(), yaml),
    }
}

fn init_logging(level: &str, format: &str) -> Result<(), String> {
    let format =
        LogFormat::parse(format).ok_or_else(|| format!("invalid log format: {}", format))?;
    let config = TelemetryConfig::new()
        .with_log_level(level)
        .with_log_format(format)
        .with_ansi(std::io::stderr().is_terminal());
    postern_telemetry::init(&config).map_err(|e| e.to_string())
}

fn run_deploy(args: &DeployArgs) -> ExitCode {
    let Some(format) = ReportFormat::parse(&args.format) else {
        eprintln!("error: invalid format: {} (expected text or json)", args.format);
        return ExitCode::from(EXIT_HALTED);
    };

    let config = match deploy_config(args) {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };

    let store = EnvCredentialStore::new();
    let gateway = match AwsClientConfig::resolve(&config.gateway, &store)
        .and_then(|client_config| AwsGatewayClient::new(client_config, store))
    {
        Ok(gateway) => gateway,
        Err(e) => return fail(&e),
    };

    let report = Pipeline::new(config.clone(), YamlToJson, gateway).run();

    if let Some(path) = config.report_path() {
        if let Err(e) = write_report(path, &report) {
            eprintln!("error: {}", e);
        }
    }

    match Reporter::new(format).render(&report) {
        Ok(rendered) => println!("{}", rendered.trim_end()),
        Err(e) => eprintln!("error: failed to render report: {}", e),
    }

    ExitCode::from(exit_code(&report))
}

fn run_validate(args: &SpecArgs, format: &str) -> ExitCode {
    let Some(format) = ReportFormat::parse(format) else {
        eprintln!("error: invalid format: {} (expected text or json)", format);
        return ExitCode::from(EXIT_HALTED);
    };

    let config = match spec_config(args) {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };

    let result = load_spec(&config.spec)
        .and_then(|doc| YamlToJson.convert(&doc))
        .and_then(|converted| validate(&converted));

    match format {
        ReportFormat::Json => {
            let output = match &result {
                Ok(validated) => serde_json::json!({
                    "spec": config.spec,
                    "valid": true,
                    "summary": validated.summary(),
                }),
                Err(e) => serde_json::json!({
                    "spec": config.spec,
                    "valid": false,
                    "error": {
                        "code": e.code(),
                        "kind": e.kind().as_str(),
                        "message": e.to_string(),
                    },
                }),
            };
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("error: failed to render output: {}", e),
            }
        }
        ReportFormat::Text => match &result {
            Ok(validated) => {
                let summary = validated.summary();
                println!(
                    "✓ {} is valid ({} path(s), {} operation(s), {} gateway extension(s))",
                    config.spec.display(),
                    summary.paths,
                    summary.operations,
                    summary.gateway_extensions.len()
                );
            }
            Err(e) => println!("✗ {}: {}", config.spec.display(), e),
        },
    }

    match &result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(offline_exit_code(e)),
    }
}

fn run_convert(args: &SpecArgs) -> ExitCode {
    let result = spec_config(args).and_then(|config| {
        let doc = load_spec(&config.spec)?;
        let converted = YamlToJson.convert(&doc)?;
        let json_path = config.json_path();
        write_artifact(&json_path, converted.as_bytes())?;
        Ok((config.spec, json_path, converted.len()))
    });

    match result {
        Ok((spec, json_path, bytes)) => {
            eprintln!(
                "converted {} to {} ({} bytes)",
                spec.display(),
                json_path.display(),
                bytes
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_encode(args: &SpecArgs) -> ExitCode {
    let result = spec_config(args).and_then(|config| {
        let doc = load_spec(&config.spec)?;
        let converted = YamlToJson.convert(&doc)?;
        let json_path = config.json_path();
        write_artifact(&json_path, converted.as_bytes())?;
        let payload = encode(&validate(&converted)?)?;
        let encoded_path = config.encoded_path();
        write_payload(&encoded_path, &payload)?;
        Ok((config.spec, encoded_path, payload.len()))
    });

    match result {
        Ok((spec, encoded_path, chars)) => {
            eprintln!(
                "encoded {} to {} ({} chars)",
                spec.display(),
                encoded_path.display(),
                chars
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_decode(input: &Path, output: Option<&Path>, yaml: bool) -> ExitCode {
    let result = std::fs::read_to_string(input)
        .map_err(|e| PipelineError::Read {
            path: input.to_path_buf(),
            source: e,
        })
        .and_then(|text| EncodedPayload::from_text(&text))
        .and_then(|payload| payload.decode())
        .and_then(|bytes| {
            if yaml {
                to_authoring(&bytes).map(String::into_bytes)
            } else {
                Ok(bytes)
            }
        });

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => return fail(&e),
    };

    match output {
        Some(path) => match write_artifact(path, &bytes) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(&e),
        },
        None => {
            print!("{}", String::from_utf8_lossy(&bytes));
            ExitCode::SUCCESS
        }
    }
}

/// Configuration for the offline commands, validated.
fn spec_config(args: &SpecArgs) -> Result<DeployConfig, PipelineError> {
    let config = load_config(args)?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration file (if any) and apply spec/artifact flags.
/// Validation is left to the caller, once every override is in.
fn load_config(args: &SpecArgs) -> Result<DeployConfig, PipelineError> {
    let mut config = match &args.config {
        Some(path) => DeployConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            DeployConfig::load(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => DeployConfig::default(),
    };

    if let Some(spec) = &args.spec {
        config.spec = spec.clone();
    }
    if let Some(path) = &args.json_out {
        config.artifacts.json = Some(path.clone());
    }
    if let Some(path) = &args.encoded_out {
        config.artifacts.encoded = Some(path.clone());
    }
    Ok(config)
}

fn deploy_config(args: &DeployArgs) -> Result<DeployConfig, PipelineError> {
    let mut config = load_config(&args.spec)?;
    let gateway = &mut config.gateway;

    if let Some(region) = &args.region {
        gateway.region = Some(region.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        gateway.endpoint = Some(endpoint.clone());
    }
    if let Some(id) = &args.rest_api_id {
        gateway.rest_api_id = Some(id.clone());
    }
    if let Some(mode) = &args.mode {
        gateway.mode = Some(ImportMode::parse(mode).ok_or_else(|| {
            PipelineError::Config(format!("invalid mode: {} (expected merge or overwrite)", mode))
        })?);
    }
    if args.fail_on_warnings {
        gateway.fail_on_warnings = true;
    }
    if let Some(endpoint_type) = &args.endpoint_type {
        gateway.endpoint_type = EndpointType::parse(endpoint_type).ok_or_else(|| {
            PipelineError::Config(format!(
                "invalid endpoint type: {} (expected REGIONAL, EDGE or PRIVATE)",
                endpoint_type
            ))
        })?;
    }
    if let Some(stage) = &args.stage {
        gateway.stage = Some(stage.clone());
    }
    if let Some(description) = &args.stage_description {
        gateway.stage_description = Some(description.clone());
    }
    if let Some(timeout) = args.timeout {
        gateway.timeout_secs = timeout;
    }
    if let Some(policy) = &args.on_rejection {
        config.on_rejection = RejectionPolicy::parse(policy).ok_or_else(|| {
            PipelineError::Config(format!(
                "invalid on_rejection: {} (expected report or continue)",
                policy
            ))
        })?;
    }
    if let Some(report) = &args.report {
        config.artifacts.report = Some(report.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Invalid input documents exit 1; anything that kept the command from
/// judging the document exits 3.
fn offline_exit_code(error: &PipelineError) -> u8 {
    match error.kind() {
        ErrorKind::Conversion | ErrorKind::Validation | ErrorKind::Encoding => EXIT_REJECTED,
        _ => EXIT_HALTED,
    }
}

fn fail(error: &PipelineError) -> ExitCode {
    tracing::debug!(code = error.code(), "command failed");
    eprintln!("error: {}", error);
    ExitCode::from(offline_exit_code(error))
}
