//! Upload, validate, merge and persist PDFs
//!
//! The storage and pipeline pieces behind the merge web service:
//! - `validation`: filename sanitization and allow-listing
//! - `storage`: the upload scratch directory and the output directory
//! - `merge`: the page-order-preserving merge engine (lopdf)
//! - `pipeline`: all-or-nothing upload batches and fail-fast merges

pub mod config;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod storage;
pub mod validation;

pub use config::MergeConfig;
pub use error::{PdfMergeError, PipelineError, Stage, StorageError};
pub use merge::{merge_documents, page_count, LopdfMerger, MergeEngine};
pub use pipeline::{merge_uploads, upload_batch, MergeRequest, MergedOutput, UploadPart};
pub use storage::{ClearReport, Storage, UploadedFile};
