//! Format converter: authoring format (YAML) to wire format (JSON).
//!
//! The conversion is lossless for everything JSON can represent. Values that
//! JSON cannot carry (YAML tags, non-finite floats, null or composite
//! mapping keys) fail the conversion instead of being silently dropped.

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::error::PipelineError;
use crate::loader::SpecDocument;

/// Converts a loaded spec into its wire-format rendering.
pub trait Converter {
    fn convert(&self, doc: &SpecDocument) -> Result<ConvertedArtifact, PipelineError>;
}

/// Wire-format bytes derived from exactly one [`SpecDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedArtifact {
    bytes: Vec<u8>,
}

impl ConvertedArtifact {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The default converter: YAML (or JSON, which is valid YAML) in,
/// pretty-printed JSON out.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlToJson;

impl Converter for YamlToJson {
    fn convert(&self, doc: &SpecDocument) -> Result<ConvertedArtifact, PipelineError> {
        let mut yaml: YamlValue = serde_yaml::from_str(doc.content())
            .map_err(|e| PipelineError::Conversion(e.to_string()))?;
        yaml.apply_merge()
            .map_err(|e| PipelineError::Conversion(format!("merge key: {}", e)))?;

        let json = yaml_to_json(&yaml, "$")?;

        let mut bytes = serde_json::to_vec_pretty(&json)
            .map_err(|e| PipelineError::Conversion(e.to_string()))?;
        bytes.push(b'\n');

        postern_telemetry::log_spec_converted!(
            path = %doc.path().display(),
            input_bytes = doc.len(),
            output_bytes = bytes.len()
        );
        Ok(ConvertedArtifact { bytes })
    }
}

/// Render a wire-format document back into the authoring format.
pub fn to_authoring(bytes: &[u8]) -> Result<String, PipelineError> {
    let json: JsonValue = serde_json::from_slice(bytes)
        .map_err(|e| PipelineError::Conversion(format!("wire document: {}", e)))?;
    serde_yaml::to_string(&json).map_err(|e| PipelineError::Conversion(e.to_string()))
}

fn yaml_to_json(value: &YamlValue, location: &str) -> Result<JsonValue, PipelineError> {
    let json = match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(*b),
        YamlValue::Number(n) => number_to_json(n, location)?,
        YamlValue::String(s) => JsonValue::String(s.clone()),
        YamlValue::Sequence(seq) => JsonValue::Array(
            seq.iter()
                .enumerate()
                .map(|(i, item)| yaml_to_json(item, &format!("{}[{}]", location, i)))
                .collect::<Result<_, _>>()?,
        ),
        YamlValue::Mapping(map) => {
            let mut obj = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                let key = mapping_key(key, location)?;
                let converted = yaml_to_json(item, &format!("{}.{}", location, key))?;
                // `200:` and `"200":` collapse to the same JSON key.
                if obj.insert(key.clone(), converted).is_some() {
                    return Err(PipelineError::Conversion(format!(
                        "{}: key '{}' appears more than once after keys are rendered as strings",
                        location, key
                    )));
                }
            }
            JsonValue::Object(obj)
        }
        YamlValue::Tagged(tagged) => {
            return Err(PipelineError::Conversion(format!(
                "{}: YAML tag {} has no JSON representation",
                location, tagged.tag
            )));
        }
    };
    Ok(json)
}

fn number_to_json(n: &serde_yaml::Number, location: &str) -> Result<JsonValue, PipelineError> {
    if let Some(i) = n.as_i64() {
        return Ok(JsonValue::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(JsonValue::from(u));
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .ok_or_else(|| {
            PipelineError::Conversion(format!(
                "{}: number {} has no JSON representation",
                location, n
            ))
        })
}

fn mapping_key(key: &YamlValue, location: &str) -> Result<String, PipelineError> {
    match key {
        YamlValue::String(s) => Ok(s.clone()),
        YamlValue::Bool(b) => Ok(b.to_string()),
        YamlValue::Number(n) if n.as_f64().is_some_and(|f| !f.is_finite()) => {
            Err(PipelineError::Conversion(format!(
                "{}: mapping key {} has no JSON representation",
                location, n
            )))
        }
        YamlValue::Number(n) => Ok(n.to_string()),
        YamlValue::Null => Err(PipelineError::Conversion(format!(
            "{}: null mapping key has no JSON representation",
            location
        ))),
        _ => Err(PipelineError::Conversion(format!(
            "{}: composite mapping keys have no JSON representation",
            location
        ))),
    }
}
