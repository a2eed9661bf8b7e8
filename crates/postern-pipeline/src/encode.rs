//! Transport encoder: standard base64 (RFC 4648, padded).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::PipelineError;
use crate::validate::ValidatedArtifact;

/// Base64 text of a validated artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    text: String,
}

impl EncodedPayload {
    /// Wrap base64 text read back from disk. The text is checked.
    pub fn from_text(text: &str) -> Result<Self, PipelineError> {
        let text = text.trim();
        decode_str(text)?;
        Ok(Self {
            text: text.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Recover the wire-format bytes.
    pub fn decode(&self) -> Result<Vec<u8>, PipelineError> {
        decode_str(&self.text)
    }
}

/// Encode a validated artifact. Deterministic.
pub fn encode(artifact: &ValidatedArtifact) -> Result<EncodedPayload, PipelineError> {
    // A validated artifact always holds at least `{}`.
    if artifact.is_empty() {
        return Err(PipelineError::Encoding(
            "validated artifact is empty".into(),
        ));
    }

    let text = STANDARD.encode(artifact.as_bytes());

    postern_telemetry::log_payload_encoded!(
        input_bytes = artifact.len(),
        output_bytes = text.len()
    );
    Ok(EncodedPayload { text })
}

fn decode_str(text: &str) -> Result<Vec<u8>, PipelineError> {
    STANDARD
        .decode(text)
        .map_err(|e| PipelineError::Encoding(format!("invalid base64 payload: {}", e)))
}
