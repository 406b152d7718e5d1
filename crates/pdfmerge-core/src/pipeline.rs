//! Upload and merge pipelines
//!
//! Both are all-or-nothing: an upload batch is either stored completely or
//! not at all, and a merge either produces its output file or leaves the
//! output directory alone.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{MergeConfig, MIN_MERGE_FILES, OUTPUT_EXTENSION};
use crate::error::PipelineError;
use crate::merge::MergeEngine;
use crate::storage::{Storage, UploadedFile};
use crate::validation;

/// Output base name used when the client sends none
pub const DEFAULT_OUTPUT_NAME: &str = "merged";

/// One file part of an upload submission
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// Ordered list of stored uploads plus the desired output name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub files: Vec<String>,
    pub output_name: String,
}

/// A persisted merge result
#[derive(Debug, Clone, Serialize)]
pub struct MergedOutput {
    pub filename: String,
    pub path: PathBuf,
    pub size: usize,
    pub file_count: usize,
}

impl MergeRequest {
    /// Build a request from the raw `fileOrder` JSON and `outputName` fields
    pub fn parse(file_order: &str, output_name: Option<&str>) -> Result<Self, PipelineError> {
        let files: Vec<String> =
            serde_json::from_str(file_order).map_err(PipelineError::InvalidFileOrder)?;

        Ok(Self {
            files,
            output_name: normalize_output_name(output_name.unwrap_or_default()),
        })
    }
}

/// Append the output extension if absent, then sanitize
///
/// Falls back to `merged.pdf` when nothing usable survives.
pub fn normalize_output_name(requested: &str) -> String {
    let requested = requested.trim();
    let requested = if requested.is_empty() {
        DEFAULT_OUTPUT_NAME
    } else {
        requested
    };

    let suffix = format!(".{}", OUTPUT_EXTENSION);
    let with_ext = if requested.ends_with(&suffix) {
        requested.to_string()
    } else {
        format!("{}{}", requested, suffix)
    };

    let safe = validation::sanitize(&with_ext);
    if safe.len() > suffix.len() && safe.ends_with(&suffix) {
        safe
    } else {
        format!("{}{}", DEFAULT_OUTPUT_NAME, suffix)
    }
}

/// Validate and store every part of one upload submission
///
/// Every part is checked before anything is written; if a write fails
/// midway, files already saved from this batch are removed again.
pub async fn upload_batch(
    storage: &Storage,
    config: &MergeConfig,
    parts: Vec<UploadPart>,
) -> Result<Vec<UploadedFile>, PipelineError> {
    if parts.is_empty() {
        return Err(PipelineError::NoFiles);
    }

    for part in &parts {
        match part.file_name.as_deref() {
            Some(name)
                if !name.is_empty()
                    && validation::is_allowed_extension(name, &config.allowed_extensions) => {}
            other => {
                return Err(PipelineError::InvalidFile(
                    other.unwrap_or_default().to_string(),
                ))
            }
        }
    }

    let mut saved: Vec<UploadedFile> = Vec::with_capacity(parts.len());
    for part in parts {
        let name = part.file_name.unwrap_or_default();
        match storage.save_upload(&name, &part.data).await {
            Ok(file) => saved.push(file),
            Err(source) => {
                rollback(storage, &saved).await;
                return Err(PipelineError::SaveFailed { name, source });
            }
        }
    }

    info!("Stored {} uploaded file(s)", saved.len());
    Ok(saved)
}

async fn rollback(storage: &Storage, saved: &[UploadedFile]) {
    for file in saved {
        if let Err(e) = storage.remove_upload(&file.stored_name).await {
            warn!("Rollback could not remove {}: {}", file.stored_name, e);
        }
    }
}

/// Merge previously uploaded files, in request order, into the output directory
///
/// Fails fast on the first missing or empty input; the engine is only called
/// once every input has been checked.
pub async fn merge_uploads(
    storage: &Storage,
    engine: Arc<dyn MergeEngine>,
    request: &MergeRequest,
) -> Result<MergedOutput, PipelineError> {
    if request.files.len() < MIN_MERGE_FILES {
        return Err(PipelineError::TooFewFiles(MIN_MERGE_FILES));
    }

    let mut paths = Vec::with_capacity(request.files.len());
    for name in &request.files {
        let path = storage
            .resolve_upload(name)
            .ok_or_else(|| PipelineError::FileNotFound(name.clone()))?;
        match validation::file_len(&path).await {
            None => return Err(PipelineError::FileNotFound(name.clone())),
            Some(0) => return Err(PipelineError::FileEmpty(name.clone())),
            Some(_) => paths.push((name, path)),
        }
    }

    let mut documents = Vec::with_capacity(paths.len());
    for (name, path) in &paths {
        let bytes = storage
            .read_file(path)
            .await
            .map_err(|source| PipelineError::ReadFailed {
                name: (*name).clone(),
                source,
            })?;
        documents.push(bytes);
    }

    let merged = tokio::task::spawn_blocking(move || engine.merge(documents)).await??;
    if merged.is_empty() {
        return Err(PipelineError::EmptyOutput);
    }

    let path = storage
        .write_output(&request.output_name, &merged)
        .await
        .map_err(PipelineError::Persist)?;

    info!(
        "Merged {} file(s) into {} ({} bytes)",
        request.files.len(),
        path.display(),
        merged.len()
    );

    Ok(MergedOutput {
        filename: request.output_name.clone(),
        path,
        size: merged.len(),
        file_count: request.files.len(),
    })
}
