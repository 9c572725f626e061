//! File-backed storage for research sessions
//!
//! Sessions are stored as one JSON document per session under
//! `{data_dir}/sessions/{chat_id}.json`, written atomically.

pub mod sessions;

pub use sessions::{SessionPage, SessionStore};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Result type for low-level file operations
pub type FileResult<T> = Result<T, String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Research session not found")]
    NotFound,

    #[error("Problem statement must be at least {min} words. Current word count: {actual}")]
    Validation { min: usize, actual: usize },

    #[error(
        "Session {chat_id} was modified concurrently (expected version {expected}, found {found})"
    )]
    Conflict {
        chat_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Storage error: {0}")]
    Io(String),
}

/// Ensure a directory exists, creating it and its parents if needed
pub fn ensure_dir(path: &Path) -> FileResult<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| format!("Failed to create directory {}: {}", path.display(), e))?;
    }
    Ok(())
}

/// Write content to a file atomically (write to temp file, then rename)
pub fn atomic_write(path: &Path, content: &str) -> FileResult<()> {
    let tmp_path = path.with_extension("tmp");

    fs::write(&tmp_path, content)
        .map_err(|e| format!("Failed to write {}: {}", tmp_path.display(), e))?;

    fs::rename(&tmp_path, path)
        .map_err(|e| format!("Failed to rename {} into place: {}", tmp_path.display(), e))?;

    Ok(())
}

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> FileResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    serde_json::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

/// Serialize and write a JSON file atomically
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> FileResult<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| format!("Failed to serialize {}: {}", path.display(), e))?;

    atomic_write(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("value.json");

        write_json(&path, &serde_json::json!({"a": 1})).unwrap();
        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value["a"], 1);

        // No stray temp file left behind
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_read_missing_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.json");
        let result: FileResult<serde_json::Value> = read_json(&path);
        assert!(result.is_err());
    }
}
