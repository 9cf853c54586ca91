//! Atomic file operations for JSON documents.
//!
//! Writes go through a hidden temp file in the destination directory:
//! 1. Write the serialized document to `.tmp-*` next to the target
//! 2. `sync_all` so the bytes reach disk before they become visible
//! 3. Rename over the target (same filesystem, so readers see old or new)
//!
//! A temp file that never gets renamed is removed when it is dropped.

use crate::config::StoreConfig;
use crate::error::{MapleError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Create a hidden temp file inside `dir`.
pub(crate) fn temp_file_in(dir: &Path) -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(StoreConfig::TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| MapleError::Io {
            message: format!("Failed to create temp file in {}", dir.display()),
            path: Some(dir.to_path_buf()),
            source: Some(e),
        })
}

/// Write `bytes` to `path` atomically, creating parent directories.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        MapleError::Other(format!("{} has no parent directory", path.display()))
    })?;
    fs::create_dir_all(parent).map_err(|e| MapleError::Io {
        message: format!("Failed to create directory {}", parent.display()),
        path: Some(parent.to_path_buf()),
        source: Some(e),
    })?;

    let mut temp = temp_file_in(parent)?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| MapleError::Io {
            message: format!("Failed to write temp file {}", temp.path().display()),
            path: Some(temp.path().to_path_buf()),
            source: Some(e),
        })?;

    temp.persist(path).map_err(|e| MapleError::Io {
        message: format!("Failed to rename temp file to {}", path.display()),
        path: Some(path.to_path_buf()),
        source: Some(e.error),
    })?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Serialize `data` as pretty JSON and write it atomically.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(data)
        .map_err(|e| MapleError::Other(format!("Failed to serialize {}: {}", path.display(), e)))?;
    atomic_write(path, &serialized)
}

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist and `Corrupt` if it exists but
/// does not parse as `T`.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MapleError::io_with_path(e, path)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| MapleError::corrupt(path, format!("Failed to parse JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc");

        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        atomic_write_json(&path, &data).unwrap();
        let read_data: Option<TestData> = atomic_read_json(&path).unwrap();
        assert_eq!(read_data, Some(data));
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc");

        for value in 0..3 {
            let data = TestData {
                name: "v".to_string(),
                value,
            };
            atomic_write_json(&path, &data).unwrap();
        }

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("doc")]);

        let current: Option<TestData> = atomic_read_json(&path).unwrap();
        assert_eq!(current.unwrap().value, 2);
    }

    #[test]
    fn test_atomic_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent");

        let result: Option<TestData> = atomic_read_json(&path).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_atomic_read_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken");
        fs::write(&path, b"{ not json").unwrap();

        let err = atomic_read_json::<TestData>(&path).unwrap_err();
        assert!(matches!(err, MapleError::Corrupt { .. }));
    }

    #[test]
    fn test_atomic_write_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("doc");

        atomic_write(&path, b"{}").unwrap();
        assert!(path.exists());
    }
}
