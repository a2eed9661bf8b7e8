//! Spec loader: reads the authoring-format document from disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;

/// A specification document as read from disk. Never mutated; later
/// stages only derive new artifacts from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDocument {
    path: PathBuf,
    content: String,
}

impl SpecDocument {
    /// Build a document from in-memory text, e.g. for tests or stdin.
    pub fn from_text(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Read the spec at `path`.
///
/// Empty or whitespace-only files are rejected rather than producing an
/// empty deployment.
pub fn load_spec(path: &Path) -> Result<SpecDocument, PipelineError> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PipelineError::NotFound(path.to_path_buf()),
        _ => PipelineError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let doc = SpecDocument {
        path: path.to_path_buf(),
        content,
    };
    if doc.is_empty() {
        return Err(PipelineError::EmptySpec(path.to_path_buf()));
    }

    postern_telemetry::log_spec_loaded!(path = %path.display(), bytes = doc.len());
    Ok(doc)
}
