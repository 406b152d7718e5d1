use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors raised by the merge engine
#[derive(Error, Debug)]
pub enum PdfMergeError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}

/// Errors raised by the upload and output directories
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File is empty after write: {0}")]
    EmptyAfterWrite(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to list directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
}

/// Pipeline stage a merge failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Parse,
    Validation,
    MergeEngine,
    /// Storage I/O on either directory
    Persist,
}

/// Everything the upload and merge pipelines can report
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No files provided")]
    NoFiles,

    #[error("Invalid file: {0}. Only PDF files allowed.")]
    InvalidFile(String),

    #[error("Failed to save file: {name}")]
    SaveFailed {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("Invalid file order")]
    InvalidFileOrder(#[source] serde_json::Error),

    #[error("Please select at least {0} files to merge")]
    TooFewFiles(usize),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File is empty: {0}")]
    FileEmpty(String),

    #[error("Could not read {name}: {source}")]
    ReadFailed {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("Error processing PDF: {0}")]
    Engine(#[from] PdfMergeError),

    #[error("Merged file is empty")]
    EmptyOutput,

    #[error("Could not save to output folder: {0}")]
    Persist(#[source] StorageError),

    #[error("Merge task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PipelineError {
    /// Which stage of the merge pipeline produced this error
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidFileOrder(_) => Stage::Parse,
            PipelineError::NoFiles
            | PipelineError::InvalidFile(_)
            | PipelineError::SaveFailed { .. }
            | PipelineError::TooFewFiles(_)
            | PipelineError::FileNotFound(_)
            | PipelineError::FileEmpty(_) => Stage::Validation,
            PipelineError::Engine(_) | PipelineError::EmptyOutput | PipelineError::Join(_) => {
                Stage::MergeEngine
            }
            PipelineError::ReadFailed { .. } | PipelineError::Persist(_) => Stage::Persist,
        }
    }

    /// True when the failure was caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            PipelineError::EmptyOutput
                | PipelineError::Persist(_)
                | PipelineError::Join(_)
                | PipelineError::ReadFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_serializes_kebab_case() {
        let json = serde_json::to_string(&Stage::MergeEngine).unwrap();
        assert_eq!(json, "\"merge-engine\"");
    }

    #[test]
    fn test_engine_errors_are_client_errors() {
        let err = PipelineError::from(PdfMergeError::ParseError("bad xref".into()));
        assert_eq!(err.stage(), Stage::MergeEngine);
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Error processing PDF: Failed to parse PDF: bad xref");
    }

    #[test]
    fn test_empty_output_is_server_error() {
        let err = PipelineError::EmptyOutput;
        assert_eq!(err.stage(), Stage::MergeEngine);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_server_errors_are_never_tagged_as_validation() {
        let read = PipelineError::ReadFailed {
            name: "a_1.pdf".into(),
            source: StorageError::Read {
                path: PathBuf::from("uploads/a_1.pdf"),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            },
        };
        assert_eq!(read.stage(), Stage::Persist);
        assert!(!read.is_client_error());

        for err in [
            read,
            PipelineError::EmptyOutput,
            PipelineError::Persist(StorageError::InvalidName("x".into())),
        ] {
            assert!(!err.is_client_error());
            assert_ne!(err.stage(), Stage::Validation, "{}", err);
            assert_ne!(err.stage(), Stage::Parse, "{}", err);
        }
    }

    #[test]
    fn test_too_few_files_message() {
        assert_eq!(
            PipelineError::TooFewFiles(2).to_string(),
            "Please select at least 2 files to merge"
        );
    }
}
