//! HTTP handlers for the merge server

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use std::path::PathBuf;
use std::sync::Arc;

use pdfmerge_core::config::OUTPUT_EXTENSION;
use pdfmerge_core::{merge_uploads, upload_batch, validation, MergeRequest, PipelineError, UploadPart};

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;
use crate::template;

/// Multipart field carrying the uploaded PDFs
const FILES_FIELD: &str = "files";

/// Handler: GET /
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    template::render_index(&state.storage.output_dir().display().to_string())
}

/// Handler: GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfmerge-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Handler: POST /upload
///
/// Stores every `files` part of the submission, or none of them.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|_| ApiError::Upload(PipelineError::NoFiles))?;
    let limit = state.config.max_upload_bytes;

    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::from_multipart(e, limit))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::from_multipart(e, limit))?
            .to_vec();
        parts.push(UploadPart { file_name, data });
    }

    let saved = upload_batch(&state.storage, &state.config, parts)
        .await
        .map_err(ApiError::Upload)?;

    let files: Vec<String> = saved.into_iter().map(|f| f.stored_name).collect();
    let count = files.len();

    Ok(Json(UploadResponse {
        success: true,
        files,
        count,
    }))
}

/// Handler: POST /merge
pub async fn merge(
    State(state): State<Arc<AppState>>,
    form: MergeForm,
) -> Result<Json<MergeResponse>, ApiError> {
    let request = MergeRequest::parse(
        form.file_order.as_deref().unwrap_or("[]"),
        form.output_name.as_deref(),
    )
    .map_err(ApiError::Merge)?;

    tracing::debug!(
        "Merge request: {} file(s) into {}",
        request.files.len(),
        request.output_name
    );

    let output = merge_uploads(&state.storage, state.engine.clone(), &request)
        .await
        .map_err(ApiError::Merge)?;

    Ok(Json(MergeResponse {
        success: true,
        message: format!(
            "PDF merged successfully and saved to {}",
            state.storage.output_dir().display()
        ),
        filename: output.filename,
    }))
}

/// Handler: GET /download/:filename
///
/// Looks in the output directory first, then in the upload directory.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let path = locate_download(&state, &filename)
        .await
        .ok_or(ApiError::NotFound)?;
    let data = state.storage.read_file(&path).await?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = if validation::is_allowed_extension(&name, &[OUTPUT_EXTENSION]) {
        "application/pdf"
    } else {
        "application/octet-stream"
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        data,
    ))
}

/// Find a download target, retrying with `.pdf` for bare names
async fn locate_download(state: &AppState, filename: &str) -> Option<PathBuf> {
    let safe = validation::sanitize(filename);
    if safe.is_empty() {
        return None;
    }

    let mut candidates = vec![safe.clone()];
    if validation::extension(&safe).is_none() {
        candidates.push(format!("{}.{}", safe, OUTPUT_EXTENSION));
    }

    let storage = &state.storage;
    for candidate in &candidates {
        for dir in [storage.output_dir(), storage.upload_dir()] {
            if let Some(path) = storage.resolve(candidate, dir) {
                if validation::file_len(&path).await.is_some() {
                    return Some(path);
                }
            }
        }
    }

    None
}

/// Handler: POST /clear
///
/// Best-effort: files that cannot be deleted are counted, not reported as an error.
pub async fn clear(State(state): State<Arc<AppState>>) -> Result<Json<ClearResponse>, ApiError> {
    let report = state.storage.clear_uploads().await?;

    tracing::info!(
        "Cleared upload directory: {} removed, {} failed",
        report.removed,
        report.failed.len()
    );

    Ok(Json(ClearResponse {
        success: true,
        message: "All files cleared".to_string(),
        removed: report.removed,
        failed: report.failed.len(),
    }))
}

/// Handler: GET /files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UploadResponse>, ApiError> {
    let files = state.storage.list_uploads().await?;
    let count = files.len();

    Ok(Json(UploadResponse {
        success: true,
        files,
        count,
    }))
}
