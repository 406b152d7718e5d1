//! Error types for the merge server
//!
//! Every handler returns `Result<_, ApiError>`; this is the only place where
//! failures are turned into the `{ "error": ... }` wire format.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfmerge_core::{PipelineError, Stage, StorageError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Upload(PipelineError),

    #[error("{0}")]
    Merge(PipelineError),

    #[error("File not found")]
    NotFound,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload exceeds the maximum size of {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<Stage>,
}

impl ApiError {
    /// Map a multipart read failure, keeping axum's body-limit status
    pub fn from_multipart(err: MultipartError, limit: usize) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(limit)
        } else {
            ApiError::InvalidRequest(err.body_text())
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Merge(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Merge(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        let stage = match &self {
            ApiError::Merge(e) => Some(e.stage()),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.to_string(),
            stage,
        };

        (status, Json(body)).into_response()
    }
}
