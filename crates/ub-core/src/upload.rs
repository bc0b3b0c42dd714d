//! Incoming file uploads
//!
//! A [`PendingUpload`] is the handle the upload transport hands over after
//! parsing a request. It lives from validation until the post-save write.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Transport-level status of an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadErrorCode {
    Ok,
    ExceedsServerLimit,
    ExceedsFormLimit,
    Partial,
    NoFile,
    NoTempDir,
    CantWrite,
    Extension,
}

impl UploadErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::ExceedsServerLimit => 1,
            Self::ExceedsFormLimit => 2,
            Self::Partial => 3,
            Self::NoFile => 4,
            Self::NoTempDir => 6,
            Self::CantWrite => 7,
            Self::Extension => 8,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::ExceedsServerLimit),
            2 => Some(Self::ExceedsFormLimit),
            3 => Some(Self::Partial),
            4 => Some(Self::NoFile),
            6 => Some(Self::NoTempDir),
            7 => Some(Self::CantWrite),
            8 => Some(Self::Extension),
            _ => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ok => "There is no error, the file uploaded with success.",
            Self::ExceedsServerLimit => {
                "The uploaded file exceeds the maximum upload size configured on the server."
            }
            Self::ExceedsFormLimit => {
                "The uploaded file exceeds the maximum size that was specified in the HTML form."
            }
            Self::Partial => "The uploaded file was only partially uploaded.",
            Self::NoFile => "No file was uploaded.",
            Self::NoTempDir => "Missing a temporary folder.",
            Self::CantWrite => "Failed to write file to disk.",
            Self::Extension => "A server extension stopped the file upload.",
        }
    }
}

const UNKNOWN_UPLOAD_ERROR: &str = "Unknown error occurred.";

/// A failed upload, carrying the transport code and its description
#[derive(Debug, Error)]
#[error("{message}")]
pub struct UploadFailure {
    pub code: i32,
    pub message: String,
    #[source]
    pub source: Option<std::io::Error>,
}

impl UploadFailure {
    pub fn from_code(code: i32) -> Self {
        let description = UploadErrorCode::from_code(code)
            .map(|c| c.description())
            .unwrap_or(UNKNOWN_UPLOAD_ERROR);
        Self {
            code,
            message: format!("{} Error code is {}", description, code),
            source: None,
        }
    }

    pub fn write_failed(source: std::io::Error) -> Self {
        Self {
            source: Some(source),
            ..Self::from_code(UploadErrorCode::CantWrite.code())
        }
    }
}

/// Split a file name into `(filename, extension)`.
///
/// Only the last path segment is considered and the extension is whatever
/// follows its last dot. `None` means there was no dot at all.
pub fn path_info(value: &str) -> (&str, Option<&str>) {
    let base = value.rsplit('/').next().unwrap_or(value);
    match base.rfind('.') {
        Some(pos) => (&base[..pos], Some(&base[pos + 1..])),
        None => (base, None),
    }
}

/// A just-received, not yet persisted file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    temp_path: PathBuf,
    name: String,
    size: u64,
    error: i32,
}

impl PendingUpload {
    pub fn new(temp_path: impl Into<PathBuf>, name: impl Into<String>, size: u64) -> Self {
        Self {
            temp_path: temp_path.into(),
            name: name.into(),
            size,
            error: UploadErrorCode::Ok.code(),
        }
    }

    pub fn with_error(mut self, code: UploadErrorCode) -> Self {
        self.error = code.code();
        self
    }

    pub fn with_error_code(mut self, code: i32) -> Self {
        self.error = code;
        self
    }

    /// Original file name as sent by the client
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Original name without its extension
    pub fn base_name(&self) -> &str {
        path_info(&self.name).0
    }

    /// Lower-cased extension of the original name
    pub fn extension(&self) -> String {
        path_info(&self.name)
            .1
            .map(|e| e.to_lowercase())
            .unwrap_or_default()
    }

    /// Name stored on the record once the upload is attached
    pub fn stored_name(&self) -> String {
        let extension = self.extension();
        if extension.is_empty() {
            self.base_name().to_string()
        } else {
            format!("{}.{}", self.base_name(), extension)
        }
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn error_code(&self) -> i32 {
        self.error
    }

    pub fn has_error(&self) -> bool {
        self.error != UploadErrorCode::Ok.code()
    }

    /// Move the temporary file to `path`.
    ///
    /// Falls back to copy + remove when a rename is not possible (e.g. the
    /// temporary directory is on another device). The parent directory must
    /// already exist.
    pub async fn save_as(&self, path: impl AsRef<Path>) -> Result<(), UploadFailure> {
        let path = path.as_ref();
        if self.has_error() {
            return Err(UploadFailure::from_code(self.error));
        }

        if fs::rename(&self.temp_path, path).await.is_ok() {
            debug!(from = ?self.temp_path, to = ?path, "Upload moved into place");
            return Ok(());
        }

        fs::copy(&self.temp_path, path)
            .await
            .map_err(UploadFailure::write_failed)?;
        if let Err(e) = fs::remove_file(&self.temp_path).await {
            debug!(path = ?self.temp_path, error = %e, "Temporary upload not removed");
        }
        debug!(from = ?self.temp_path, to = ?path, "Upload copied into place");
        Ok(())
    }
}

impl fmt::Display for PendingUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Upload transport: locates files posted with the current request
pub trait UploadSource: Send + Sync {
    /// File posted under the form-scoped field name `Model[attribute]`
    fn instance(&self, model: &str, attribute: &str) -> Option<PendingUpload>;

    /// File posted under a plain field name
    fn instance_by_name(&self, name: &str) -> Option<PendingUpload>;
}

/// Request without any uploaded files
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUploads;

impl UploadSource for NoUploads {
    fn instance(&self, _model: &str, _attribute: &str) -> Option<PendingUpload> {
        None
    }

    fn instance_by_name(&self, _name: &str) -> Option<PendingUpload> {
        None
    }
}

/// In-memory upload transport, keyed by posted field name
#[derive(Debug, Default, Clone)]
pub struct MemoryUploads {
    files: HashMap<String, PendingUpload>,
}

impl MemoryUploads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, upload: PendingUpload) {
        self.files.insert(field.into(), upload);
    }

    pub fn with(mut self, field: impl Into<String>, upload: PendingUpload) -> Self {
        self.insert(field, upload);
        self
    }

    /// Form-scoped field name for a model attribute
    pub fn form_field(model: &str, attribute: &str) -> String {
        format!("{}[{}]", model, attribute)
    }
}

impl UploadSource for MemoryUploads {
    fn instance(&self, model: &str, attribute: &str) -> Option<PendingUpload> {
        self.files.get(&Self::form_field(model, attribute)).cloned()
    }

    fn instance_by_name(&self, name: &str) -> Option<PendingUpload> {
        self.files.get(name).cloned()
    }
}
