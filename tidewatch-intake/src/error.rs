//! Intake errors

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading, recognizing or pushing a report
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} is not valid UTF-8 text")]
    NotUtf8(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("OCR timed out after {0} seconds")]
    OcrTimeout(u64),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Server { status: u16, body: String },
}
