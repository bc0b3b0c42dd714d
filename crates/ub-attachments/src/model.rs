//! Attachment and thumbnail policies
//!
//! Policies are static configuration: built once per record type and shared
//! between every record instance through `Arc`.

use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, ImageResult};
use serde::{Deserialize, Serialize};

/// Binding of one record attribute to a stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPolicy {
    /// Record attribute holding the stored file name
    #[serde(default = "default_attribute")]
    pub attribute: String,
    /// Filesystem path template for the stored file
    #[serde(default = "default_file_path")]
    pub file_path: String,
    /// Public URL template for the stored file
    #[serde(default = "default_file_url")]
    pub file_url: String,
    /// Attribute referencing the parent record, exposed as `[[parent_id]]`
    #[serde(default)]
    pub parent_relation_attribute: Option<String>,
}

fn default_attribute() -> String {
    "upload".to_string()
}

fn default_file_path() -> String {
    "@webroot/uploads/[[pk]].[[extension]]".to_string()
}

fn default_file_url() -> String {
    "/uploads/[[pk]].[[extension]]".to_string()
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            attribute: default_attribute(),
            file_path: default_file_path(),
            file_url: default_file_url(),
            parent_relation_attribute: None,
        }
    }
}

impl AttachmentPolicy {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ..Self::default()
        }
    }

    /// Policy with the image defaults (`@webroot/images/...`)
    pub fn image(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            file_path: "@webroot/images/[[pk]].[[extension]]".to_string(),
            file_url: "/images/[[pk]].[[extension]]".to_string(),
            parent_relation_attribute: None,
        }
    }

    pub fn file_path(mut self, template: impl Into<String>) -> Self {
        self.file_path = template.into();
        self
    }

    pub fn file_url(mut self, template: impl Into<String>) -> Self {
        self.file_url = template.into();
        self
    }

    pub fn parent_relation(mut self, attribute: impl Into<String>) -> Self {
        self.parent_relation_attribute = Some(attribute.into());
        self
    }
}

/// Custom thumbnail rendering, replacing the built-in crop/contain resize
pub trait ThumbnailProcessor: Send + Sync + fmt::Debug {
    fn process(&self, image: DynamicImage, profile: &ThumbnailProfile) -> ImageResult<DynamicImage>;
}

/// Named thumbnail size and processing options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Encoder quality, 1-100 (JPEG only)
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Crop to exactly fill the box instead of fitting inside it
    #[serde(default = "default_true")]
    pub crop: bool,
    /// Centre a cropped result smaller than the box on a white matte
    #[serde(default)]
    pub inset: bool,
    #[serde(skip)]
    pub processor: Option<Arc<dyn ThumbnailProcessor>>,
}

fn default_quality() -> u8 {
    100
}

fn default_true() -> bool {
    true
}

impl ThumbnailProfile {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            quality: default_quality(),
            crop: true,
            inset: false,
            processor: None,
        }
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn crop(mut self, crop: bool) -> Self {
        self.crop = crop;
        self
    }

    pub fn inset(mut self, inset: bool) -> Self {
        self.inset = inset;
        self
    }

    pub fn processor(mut self, processor: Arc<dyn ThumbnailProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }
}

/// Thumbnail generation settings for an image attachment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailPolicy {
    /// Path template for thumbnails; should contain `[[profile]]`
    #[serde(default = "default_thumb_path")]
    pub thumb_path: String,
    /// URL template for thumbnails
    #[serde(default = "default_thumb_url")]
    pub thumb_url: String,
    #[serde(default)]
    pub profiles: Vec<ThumbnailProfile>,
    /// Generate thumbnails right after the original is written
    #[serde(default = "default_true")]
    pub create_on_save: bool,
    /// Generate missing thumbnails when a thumbnail URL is requested
    #[serde(default)]
    pub create_on_request: bool,
    /// Remove the original once thumbnails are generated
    #[serde(default)]
    pub delete_original: bool,
    /// Apply EXIF orientation before resizing
    #[serde(default = "default_true")]
    pub rotate_by_exif: bool,
}

fn default_thumb_path() -> String {
    "@webroot/images/[[profile]]_[[pk]].[[extension]]".to_string()
}

fn default_thumb_url() -> String {
    "/images/[[profile]]_[[pk]].[[extension]]".to_string()
}

impl Default for ThumbnailPolicy {
    fn default() -> Self {
        Self {
            thumb_path: default_thumb_path(),
            thumb_url: default_thumb_url(),
            profiles: Vec::new(),
            create_on_save: true,
            create_on_request: false,
            delete_original: false,
            rotate_by_exif: true,
        }
    }
}

impl ThumbnailPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thumb_path(mut self, template: impl Into<String>) -> Self {
        self.thumb_path = template.into();
        self
    }

    pub fn thumb_url(mut self, template: impl Into<String>) -> Self {
        self.thumb_url = template.into();
        self
    }

    pub fn profile(mut self, profile: ThumbnailProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn create_on_save(mut self, enabled: bool) -> Self {
        self.create_on_save = enabled;
        self
    }

    pub fn create_on_request(mut self, enabled: bool) -> Self {
        self.create_on_request = enabled;
        self
    }

    pub fn delete_original(mut self, enabled: bool) -> Self {
        self.delete_original = enabled;
        self
    }

    pub fn rotate_by_exif(mut self, enabled: bool) -> Self {
        self.rotate_by_exif = enabled;
        self
    }

    pub fn find_profile(&self, name: &str) -> Option<&ThumbnailProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }
}
