//! Filesystem operations on resolved paths
//!
//! Writes report failures; cleanup helpers only log them.

use std::path::Path;

use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Create the parent directory of `path`, recursively, if missing
pub async fn ensure_parent(path: &Path) -> StorageResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e)),
        _ => Ok(()),
    }
}

/// Whether `path` names an existing regular file
pub async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Copy a file byte-for-byte
pub async fn copy_file(from: &Path, to: &Path) -> StorageResult<()> {
    if !is_file(from).await {
        return Err(StorageError::NotFound(from.display().to_string()));
    }
    fs::copy(from, to)
        .await
        .map_err(|e| StorageError::io(to, e))?;
    debug!(from = ?from, to = ?to, "File copied");
    Ok(())
}

/// Remove a file, logging instead of failing.
///
/// Empty paths and missing files are ignored. Returns whether a file was
/// removed.
pub async fn remove_quietly(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(path, "File deleted");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path, error = %e, "File delete failed");
            false
        }
    }
}

/// Whether the file at `path` is a vector image that must not be rasterized
pub fn is_vector_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str() == "image/svg+xml")
        .unwrap_or(false)
}
