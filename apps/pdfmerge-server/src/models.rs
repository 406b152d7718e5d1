//! Request and response bodies for the merge API

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// Response from a successful upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<String>,
    pub count: usize,
}

/// Response from a successful merge
#[derive(Debug, Serialize, Deserialize)]
pub struct MergeResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
}

/// Response from clearing the upload directory
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
    pub removed: usize,
    pub failed: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Merge form fields
///
/// Accepted both URL-encoded and as `multipart/form-data`, which is what a
/// browser `FormData` submission produces.
#[derive(Debug, Default, Deserialize)]
pub struct MergeForm {
    #[serde(rename = "fileOrder")]
    pub file_order: Option<String>,
    #[serde(rename = "outputName")]
    pub output_name: Option<String>,
}

#[async_trait]
impl FromRequest<Arc<AppState>> for MergeForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(form) = Form::<MergeForm>::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
            return Ok(form);
        }

        let limit = state.config.max_upload_bytes;
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

        let mut form = MergeForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::from_multipart(e, limit))?
        {
            let name = field.name().unwrap_or("").to_string();
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::from_multipart(e, limit))?;
            match name.as_str() {
                "fileOrder" => form.file_order = Some(value),
                "outputName" => form.output_name = Some(value),
                _ => {}
            }
        }

        Ok(form)
    }
}
