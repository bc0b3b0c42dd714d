//! Attachment errors

use thiserror::Error;
use ub_core::{CoreError, UploadFailure};

use crate::storage::StorageError;

/// Errors surfaced by attachment lifecycle operations.
///
/// Cleanup failures never appear here; they are logged and dropped.
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Missing behavior for attribute {0:?}")]
    MissingBehavior(String),
    #[error("Attribute {0:?} has no thumbnail configuration")]
    ThumbnailsNotConfigured(String),
    #[error("File saving error: {0}")]
    Upload(#[from] UploadFailure),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Record lookup failed: {0}")]
    Record(#[from] CoreError),
    #[error("Thumbnail task failed: {0}")]
    Task(String),
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

impl AttachmentError {
    /// Programmer errors in how behaviors were wired up
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            AttachmentError::MissingBehavior(_) | AttachmentError::ThumbnailsNotConfigured(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = AttachmentError::MissingBehavior("avatar".to_string());
        assert_eq!(err.to_string(), "Missing behavior for attribute \"avatar\"");
        assert!(err.is_configuration_error());

        let err = AttachmentError::from(UploadFailure::from_code(4));
        assert_eq!(
            err.to_string(),
            "File saving error: No file was uploaded. Error code is 4"
        );
        assert!(!err.is_configuration_error());
    }
}
