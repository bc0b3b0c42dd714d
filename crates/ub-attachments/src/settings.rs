//! Application configuration
//!
//! A configuration document lists the path roots and every attachment
//! attribute of a record type:
//!
//! ```yaml
//! roots:
//!   web_root: /var/www/app/web
//!   base_url: https://static.example.com
//! attachments:
//!   - attribute: photo
//!     file_path: "@webroot/images/[[id_path]]/[[basename]]"
//!     file_url: "@web/images/[[id_path]]/[[basename]]"
//!     thumbnails:
//!       profiles:
//!         - { name: small, width: 120, height: 120 }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use ub_core::config::load_layered;
use ub_core::{ConfigError, PathRoots};

use crate::behavior::{AttachmentBehavior, Attachments};
use crate::model::{AttachmentPolicy, ThumbnailPolicy};

/// One configured attachment attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentConfig {
    #[serde(flatten)]
    pub policy: AttachmentPolicy,
    /// Present for image attachments
    #[serde(default)]
    pub thumbnails: Option<ThumbnailPolicy>,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub roots: PathRoots,
    #[serde(default)]
    pub attachments: Vec<AttachmentConfig>,
}

impl AppConfig {
    /// Roots from `UPLOAD_APP_ROOT`, `UPLOAD_WEB_ROOT` and `UPLOAD_BASE_URL`;
    /// no attachments.
    pub fn from_env() -> Self {
        Self {
            roots: PathRoots::from_env(),
            attachments: Vec::new(),
        }
    }

    /// Load from an optional file overlaid with `UPLOAD__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = load_layered(path)?;
        debug!(attachments = config.attachments.len(), "Configuration loaded");
        Ok(config)
    }

    /// Build the behavior registry for the configured attachments
    pub fn attachments(&self) -> Attachments {
        let roots = Arc::new(self.roots.clone());
        let mut attachments = Attachments::new();
        for entry in &self.attachments {
            let mut behavior = AttachmentBehavior::new(entry.policy.clone(), roots.clone());
            if let Some(thumbnails) = &entry.thumbnails {
                behavior = behavior.with_thumbnails(thumbnails.clone());
            }
            attachments.push(behavior);
        }
        attachments
    }
}
