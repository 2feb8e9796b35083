//! Request-level errors and their HTTP mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use tidewatch_intake::IntakeError;
use tidewatch_store::StoreError;

/// Errors that fail a whole report or request
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Missing multipart field `file`")]
    MissingFile,

    #[error("Invalid upload: {0}")]
    BadUpload(String),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestError::MissingFile
            | IngestError::BadUpload(_)
            | IngestError::Intake(IntakeError::NotUtf8(_)) => StatusCode::BAD_REQUEST,
            IngestError::Intake(_) | IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{status: "error", message}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }
        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
