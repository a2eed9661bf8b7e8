//! Structural validator for the converted artifact.
//!
//! Only well-formedness is checked here. Whether the document is a valid
//! OpenAPI description is the linter's job at authoring time.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::convert::ConvertedArtifact;
use crate::error::PipelineError;

/// HTTP methods recognized under a path item.
const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// API Gateway catch-all operation key.
const ANY_METHOD: &str = "x-amazon-apigateway-any-method";

/// Prefix of the API Gateway vendor extensions.
const GATEWAY_EXTENSION_PREFIX: &str = "x-amazon-apigateway-";

/// Audit summary of a validated document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpecSummary {
    /// Value of `openapi` (or `swagger` for 2.0 documents).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub paths: usize,
    pub operations: usize,
    /// Distinct `x-amazon-apigateway-*` keys found anywhere in the document.
    pub gateway_extensions: Vec<String>,
}

/// A well-formed wire-format artifact, ready for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedArtifact {
    bytes: Vec<u8>,
    summary: SpecSummary,
}

impl ValidatedArtifact {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn summary(&self) -> &SpecSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Confirm the artifact is a well-formed JSON object.
pub fn validate(artifact: &ConvertedArtifact) -> Result<ValidatedArtifact, PipelineError> {
    if artifact.is_empty() {
        return Err(PipelineError::Validation("artifact is empty".into()));
    }

    let root: Value = serde_json::from_slice(artifact.as_bytes())
        .map_err(|e| PipelineError::Validation(e.to_string()))?;

    let obj = root.as_object().ok_or_else(|| {
        PipelineError::Validation(format!(
            "document root must be an object, found {}",
            type_name(&root)
        ))
    })?;

    let summary = summarize(obj);

    postern_telemetry::log_spec_validated!(
        spec_version = summary.spec_version.as_deref().unwrap_or("unknown"),
        title = summary.title.as_deref().unwrap_or(""),
        paths = summary.paths,
        operations = summary.operations,
        gateway_extensions = summary.gateway_extensions.len()
    );

    Ok(ValidatedArtifact {
        bytes: artifact.as_bytes().to_vec(),
        summary,
    })
}

fn summarize(root: &Map<String, Value>) -> SpecSummary {
    let spec_version = root
        .get("openapi")
        .or_else(|| root.get("swagger"))
        .map(scalar_to_string);

    let info = root.get("info").and_then(Value::as_object);
    let title = info
        .and_then(|i| i.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let api_version = info.and_then(|i| i.get("version")).map(scalar_to_string);

    let (paths, operations) = match root.get("paths").and_then(Value::as_object) {
        Some(paths) => {
            let operations = paths
                .values()
                .filter_map(Value::as_object)
                .map(|item| {
                    item.keys()
                        .filter(|k| HTTP_METHODS.contains(&k.as_str()) || k.as_str() == ANY_METHOD)
                        .count()
                })
                .sum();
            (paths.len(), operations)
        }
        None => (0, 0),
    };

    let mut extensions = BTreeSet::new();
    collect_gateway_extensions(root, &mut extensions);

    SpecSummary {
        spec_version,
        title,
        api_version,
        paths,
        operations,
        gateway_extensions: extensions.into_iter().collect(),
    }
}

fn collect_gateway_extensions(obj: &Map<String, Value>, found: &mut BTreeSet<String>) {
    for (key, value) in obj {
        if key.starts_with(GATEWAY_EXTENSION_PREFIX) {
            found.insert(key.clone());
        }
        collect_in_value(value, found);
    }
}

fn collect_in_value(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(obj) => collect_gateway_extensions(obj, found),
        Value::Array(items) => items.iter().for_each(|v| collect_in_value(v, found)),
        _ => {}
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
