//! Upload and output directories
//!
//! The storage layer owns every file in the upload directory: it is the only
//! component that creates or deletes them. Names handed in from outside are
//! always re-sanitized before they touch the filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::{MergeConfig, OUTPUT_EXTENSION};
use crate::error::StorageError;
use crate::validation;

/// How many disambiguators to try before giving up on a clashing name
const MAX_NAME_ATTEMPTS: usize = 16;

/// A file persisted in the upload directory
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub stored_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub original_name: String,
}

/// Outcome of a best-effort clear of the upload directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClearReport {
    /// Number of files deleted
    pub removed: usize,
    /// Files that could not be deleted, with the reason
    pub failed: Vec<(String, String)>,
}

/// Millisecond timestamps that never repeat within one process
#[derive(Debug, Default)]
struct Disambiguator {
    last: AtomicI64,
}

impl Disambiguator {
    fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// File storage for uploads and merge results
#[derive(Debug)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    stamps: Disambiguator,
}

impl Storage {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            output_dir: config.output_dir.clone(),
            stamps: Disambiguator::default(),
        }
    }

    /// Create both directories if they are missing
    pub async fn init(&self) -> Result<(), StorageError> {
        ensure_directory(&self.upload_dir).await?;
        ensure_directory(&self.output_dir).await
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Persist an upload under a fresh, unique name
    ///
    /// The file is created with create-new semantics and checked on disk
    /// afterwards; a zero-length result is removed and reported as an error.
    pub async fn save_upload(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<UploadedFile, StorageError> {
        ensure_directory(&self.upload_dir).await?;
        let (stem, ext) = split_stored_name(original_name);

        for _ in 0..MAX_NAME_ATTEMPTS {
            let stored_name = format!("{}_{}.{}", stem, self.stamps.next(), ext);
            let path = self.upload_dir.join(&stored_name);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(StorageError::Write { path, source }),
            };

            if let Err(source) = write_all(&mut file, bytes).await {
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(StorageError::Write { path, source });
            }
            drop(file);

            let size = match validation::file_len(&path).await {
                Some(size) if size > 0 => size,
                _ => {
                    let _ = fs::remove_file(&path).await;
                    return Err(StorageError::EmptyAfterWrite(path));
                }
            };

            debug!("Saved upload {} as {} ({} bytes)", original_name, stored_name, size);

            return Ok(UploadedFile {
                stored_name,
                path,
                size,
                original_name: original_name.to_string(),
            });
        }

        Err(StorageError::Write {
            path: self.upload_dir.join(format!("{}_*.{}", stem, ext)),
            source: ErrorKind::AlreadyExists.into(),
        })
    }

    /// Remove a stored upload, used to roll back a rejected batch
    pub async fn remove_upload(&self, stored_name: &str) -> Result<(), StorageError> {
        let path = self
            .resolve_upload(stored_name)
            .ok_or_else(|| StorageError::InvalidName(stored_name.to_string()))?;
        fs::remove_file(&path)
            .await
            .map_err(|source| StorageError::Write { path, source })
    }

    /// Join a re-sanitized name onto `directory`
    pub fn resolve(&self, stored_name: &str, directory: &Path) -> Option<PathBuf> {
        let safe = validation::sanitize(stored_name);
        if safe.is_empty() {
            None
        } else {
            Some(directory.join(safe))
        }
    }

    pub fn resolve_upload(&self, stored_name: &str) -> Option<PathBuf> {
        self.resolve(stored_name, &self.upload_dir)
    }

    pub fn resolve_output(&self, name: &str) -> Option<PathBuf> {
        self.resolve(name, &self.output_dir)
    }

    /// Names of the regular files in the upload directory, sorted
    pub async fn list_uploads(&self) -> Result<Vec<String>, StorageError> {
        let mut names: Vec<String> = self
            .upload_entries()
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Delete every regular file in the upload directory
    ///
    /// Individual failures are logged and collected; the sweep continues.
    pub async fn clear_uploads(&self) -> Result<ClearReport, StorageError> {
        let mut report = ClearReport::default();

        for (name, path) in self.upload_entries().await? {
            match fs::remove_file(&path).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!("Could not delete {}: {}", path.display(), e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Write a merge result to the output directory, replacing any previous one
    ///
    /// Bytes go to a hidden temporary file first and are renamed into place.
    pub async fn write_output(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self
            .resolve_output(name)
            .ok_or_else(|| StorageError::InvalidName(name.to_string()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = self
            .output_dir
            .join(format!(".{}.{}.partial", file_name, self.stamps.next()));

        if let Err(source) = fs::write(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::Write { path, source });
        }
        if let Err(source) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::Write { path, source });
        }

        Ok(path)
    }

    /// Read a whole file into memory
    pub async fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path).await.map_err(|source| StorageError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn upload_entries(&self) -> Result<Vec<(String, PathBuf)>, StorageError> {
        let list_err = |source| StorageError::ListDir {
            path: self.upload_dir.clone(),
            source,
        };

        let mut entries = fs::read_dir(&self.upload_dir).await.map_err(list_err)?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
            // file_type() does not follow symlinks, so links are left alone
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                files.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
            }
        }

        Ok(files)
    }
}

/// Idempotent create-if-absent
pub async fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(path)
        .await
        .map_err(|source| StorageError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_all(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Split a client filename into a sanitized stem and extension
///
/// The extension comes from the sanitized name when it has one, otherwise from
/// the raw name, otherwise the output extension. An empty stem becomes `file`.
///
/// The stem never starts with `_`: the stamp already keeps device names like
/// `con` from standing alone, and stored names must survive re-sanitizing.
fn split_stored_name(original_name: &str) -> (String, String) {
    let safe = validation::sanitize(original_name);

    let (stem, ext) = match safe.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem.to_string(), ext.to_string()),
        _ => {
            let ext = validation::extension(original_name)
                .map(validation::sanitize)
                .filter(|ext| !ext.is_empty())
                .unwrap_or_else(|| OUTPUT_EXTENSION.to_string());
            let stem = if safe.eq_ignore_ascii_case(&ext) {
                String::new()
            } else {
                safe
            };
            (stem, ext)
        }
    };

    let stem = stem.trim_matches(['.', '_']).to_string();
    if stem.is_empty() {
        ("file".to_string(), ext)
    } else {
        (stem, ext)
    }
}
