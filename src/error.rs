//! Error taxonomy for the analysis pipeline.
//!
//! Only systemic failures live here: errors that force a job to FAILED.
//! Per-item failures (a file that does not parse, an inference call that
//! times out) are converted to warnings at the item boundary and never
//! surface as these types.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal ingestion failure. Without a source tree no extraction is possible,
/// so this always fails the job.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("source root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("failed to read source tree: {0}")]
    Io(#[from] std::io::Error),

    #[error("ingestion failed: {0}")]
    Other(String),
}

/// A graph store write that failed. Retried by the projector; fatal only
/// once the projection retry budget is exhausted.
#[derive(Debug, Clone, Error)]
#[error("graph write failed: {message}")]
pub struct GraphWriteError {
    pub message: String,
}

impl GraphWriteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Unrecoverable pipeline failures. Anything not representable here is a
/// warning, not an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error("no source files found under the source root")]
    NoSourceFiles,

    #[error(transparent)]
    Graph(#[from] GraphWriteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_write_error_display() {
        let err = GraphWriteError::new("connection refused");
        assert_eq!(err.to_string(), "graph write failed: connection refused");
    }

    #[test]
    fn test_pipeline_error_from_ingestion() {
        let err: PipelineError =
            IngestionError::RootNotFound(PathBuf::from("/missing")).into();
        assert!(err.to_string().contains("/missing"));
    }

    #[test]
    fn test_no_source_files_message() {
        let err = PipelineError::NoSourceFiles;
        assert!(err.to_string().contains("no source files"));
    }
}
