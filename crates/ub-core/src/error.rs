//! Core error types for upload-behavior
//!
//! Errors raised by record hosts. Attachment-level failures live in
//! `ub-attachments` and wrap these.

use thiserror::Error;

/// Error reported by a host record store
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{model} not found: {key}")]
    NotFound { model: String, key: String },

    /// Failure inside the host's persistence layer
    #[error("Record store error: {0}")]
    Backend(String),
}

/// Standard Result type for host record operations
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn not_found(model: impl Into<String>, key: &[String]) -> Self {
        CoreError::NotFound {
            model: model.into(),
            key: key.join(","),
        }
    }
}
