//! Service configuration
//!
//! Folder locations and upload limits, passed explicitly to the storage
//! layer and the HTTP handlers at construction time.

use std::path::PathBuf;

/// Default scratch directory for uploads, relative to the working directory
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default request body ceiling (50 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Extensions accepted by default
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["pdf"];

/// Extension appended to merge output names
pub const OUTPUT_EXTENSION: &str = "pdf";

/// Minimum number of uploads a merge request must reference
pub const MIN_MERGE_FILES: usize = 2;

/// Configuration for the merge service
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Transient directory holding uploaded files
    pub upload_dir: PathBuf,
    /// User-facing directory where merged files are written
    pub output_dir: PathBuf,
    /// Maximum size of a single upload request body in bytes
    pub max_upload_bytes: usize,
    /// Lowercase file extensions accepted on upload
    pub allowed_extensions: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            output_dir: default_output_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl MergeConfig {
    /// Create a configuration with explicit directories and default limits
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Override the request body ceiling
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Override the accepted extensions
    pub fn with_allowed_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }
}

/// The invoking user's downloads folder
///
/// Falls back to `$HOME/Downloads`, then to the working directory.
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = MergeConfig::default();
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.allowed_extensions, vec!["pdf".to_string()]);
    }

    #[test]
    fn test_new_keeps_default_limits() {
        let config = MergeConfig::new("/tmp/in", "/tmp/out");
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/in"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_allowed_extensions_are_normalized() {
        let config = MergeConfig::default().with_allowed_extensions([".PDF", "Txt"]);
        assert_eq!(config.allowed_extensions, vec!["pdf", "txt"]);
    }
}
