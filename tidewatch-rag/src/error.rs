//! Retrieval errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or querying the retrieval index
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid artifact {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Empty embedding response")]
    EmptyResponse,

    #[error("Vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}
