//! # ub-attachments
//!
//! Record-bound file attachments for upload-behavior.
//!
//! ## Features
//!
//! - `[[placeholder]]` path and URL templates resolved from record state
//! - Upload capture, storage and cleanup driven by record lifecycle events
//! - Thumbnail profiles for image attachments (crop, fit, inset, EXIF rotation)
//! - Layered configuration of roots and attachment attributes
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ub_attachments::{
//!     AttachmentBehavior, AttachmentPolicy, Attachments, HookEnv, LifecycleEvent, PathRoots,
//! };
//!
//! let roots = Arc::new(PathRoots::new("/srv/app", "/srv/app/web", ""));
//! let mut attachments = Attachments::new()
//!     .with(AttachmentBehavior::new(AttachmentPolicy::new("document"), roots));
//!
//! let env = HookEnv { uploads: &uploads, store: &store };
//! attachments.dispatch(LifecycleEvent::BeforeValidate, &mut record, &env).await?;
//! attachments.dispatch(LifecycleEvent::BeforeInsert, &mut record, &env).await?;
//! store.save(&mut record).await;
//! attachments.dispatch(LifecycleEvent::AfterInsert, &mut record, &env).await?;
//!
//! let url = attachments.uploaded_file_url(&record, "document", None)?;
//! ```

pub mod behavior;
pub mod error;
pub mod imaging;
pub mod model;
pub mod resolver;
pub mod settings;
pub mod storage;
pub mod thumbnail;

pub use behavior::{AttachmentBehavior, AttachmentHook, Attachments, HookEnv, LifecycleEvent};
pub use error::{AttachmentError, AttachmentResult};
pub use model::{AttachmentPolicy, ThumbnailPolicy, ThumbnailProcessor, ThumbnailProfile};
pub use resolver::{resolve, ResolveContext};
pub use settings::{AppConfig, AttachmentConfig};
pub use storage::{StorageError, StorageResult};
pub use thumbnail::{ThumbnailGenerator, ThumbnailReport};
pub use ub_core::{
    MemoryUploads, NoUploads, PathRoots, PendingUpload, UploadErrorCode, UploadFailure,
    UploadSource,
};
