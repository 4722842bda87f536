use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy of the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The node's type has no registered exporter. Callers warn and skip the node.
    #[error("no exporter registered for node {node} (type {type_name})")]
    NoExporterForNode { node: String, type_name: String },

    /// The user asked to cancel; unwinds the current export.
    #[error("export aborted by user request")]
    AbortRequested,

    #[error("fatal export error: {0}")]
    Fatal(String),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ExportError::Fatal(_) | ExportError::Io { .. })
    }
}

pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Outcome reported by the outermost session entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Success,
    Aborted,
    Failed(String),
}

impl From<ExportError> for ExportStatus {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::AbortRequested => ExportStatus::Aborted,
            other => ExportStatus::Failed(other.to_string()),
        }
    }
}
