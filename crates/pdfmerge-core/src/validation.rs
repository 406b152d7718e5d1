//! Filename and file checks
//!
//! Nothing here returns an error: failures come back as `false`, `None` or an
//! empty string and callers decide how to report them.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    /// Anything outside the portable filename alphabet
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9_.\-]").unwrap();
}

/// Device names Windows refuses to open as regular files
const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Extension of `name`, i.e. the text after the last `.`
pub fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

/// Case-insensitive match of the extension against the allow-set
pub fn is_allowed_extension<S: AsRef<str>>(name: &str, allowed: &[S]) -> bool {
    match extension(name) {
        Some(ext) => allowed
            .iter()
            .any(|candidate| candidate.as_ref().eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Reduce a client-supplied filename to something safe to join onto a directory
///
/// The result only contains `[A-Za-z0-9_.-]`, never starts or ends with `.`
/// and may be empty when nothing usable is left. Windows device names get a
/// leading `_`.
pub fn sanitize(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = UNSAFE_CHARS.replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or_default();
    if WINDOWS_DEVICE_NAMES
        .iter()
        .any(|device| device.eq_ignore_ascii_case(stem))
    {
        return format!("_{}", trimmed);
    }

    trimmed.to_string()
}

/// Size of a regular file, `None` if it is missing or not a file
pub async fn file_len(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        _ => None,
    }
}

/// True if `path` is a regular file with at least one byte
pub async fn is_non_empty_file(path: &Path) -> bool {
    matches!(file_len(path).await, Some(len) if len > 0)
}
