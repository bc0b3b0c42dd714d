//! # ub-core
//!
//! Core types, traits, and utilities for upload-behavior.
//!
//! This crate provides the building blocks the attachment layer depends on:
//! - Record capability traits (`Record`, `RecordStore`)
//! - Attribute values and pending uploads
//! - Common error types
//! - Path roots and configuration loading
//! - An in-memory record host

pub mod config;
pub mod error;
pub mod memory;
pub mod traits;
pub mod upload;
pub mod value;

pub use config::{ConfigError, PathRoots};
pub use error::*;
pub use memory::{MemoryRecord, MemoryRecordStore};
pub use traits::*;
pub use upload::{
    path_info, MemoryUploads, NoUploads, PendingUpload, UploadErrorCode, UploadFailure,
    UploadSource,
};
pub use value::AttributeValue;
