//! Thumbnail generation for image attachments

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::behavior::AttachmentHook;
use crate::error::{AttachmentError, AttachmentResult};
use crate::imaging;
use crate::model::{AttachmentPolicy, ThumbnailPolicy};
use crate::resolver::{resolve, ResolveContext};
use crate::storage;

/// Outcome of one `create_thumbs` run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailReport {
    /// Thumbnail paths written by this run
    pub created: Vec<String>,
    /// Thumbnail paths left alone (already present, or no source file)
    pub skipped: Vec<String>,
    pub original_deleted: bool,
}

/// Derives one thumbnail per profile from an attachment's original file
#[derive(Debug)]
pub struct ThumbnailGenerator {
    attachment: Arc<AttachmentPolicy>,
    policy: ThumbnailPolicy,
}

impl ThumbnailGenerator {
    pub fn new(attachment: Arc<AttachmentPolicy>, policy: ThumbnailPolicy) -> Self {
        Self { attachment, policy }
    }

    pub fn policy(&self) -> &ThumbnailPolicy {
        &self.policy
    }

    pub fn thumb_path(&self, ctx: &ResolveContext<'_>, profile: &str) -> String {
        resolve(&self.policy.thumb_path, &ctx.with_profile(profile))
    }

    pub fn thumb_url(&self, ctx: &ResolveContext<'_>, profile: &str) -> String {
        resolve(&self.policy.thumb_url, &ctx.with_profile(profile))
    }

    /// Generate every missing thumbnail.
    ///
    /// Existing thumbnails are never rewritten. Vector originals are copied
    /// as-is; raster originals are decoded and resized off the async runtime.
    #[instrument(skip_all, fields(attribute = ctx.attribute))]
    pub async fn create_thumbs(&self, ctx: &ResolveContext<'_>) -> AttachmentResult<ThumbnailReport> {
        let source = resolve(&self.attachment.file_path, ctx);
        let source_path = PathBuf::from(&source);
        let mut report = ThumbnailReport::default();

        for profile in &self.policy.profiles {
            let target = self.thumb_path(ctx, &profile.name);
            let target_path = PathBuf::from(&target);

            if !storage::is_file(&source_path).await || storage::is_file(&target_path).await {
                debug!(profile = %profile.name, path = %target, "Thumbnail skipped");
                report.skipped.push(target);
                continue;
            }

            storage::ensure_parent(&target_path).await?;
            if storage::is_vector_image(&source_path) {
                storage::copy_file(&source_path, &target_path).await?;
            } else {
                let (from, to) = (source_path.clone(), target_path.clone());
                let profile = profile.clone();
                let rotate = self.policy.rotate_by_exif;
                tokio::task::spawn_blocking(move || {
                    imaging::render_thumbnail(&from, &to, &profile, rotate)
                })
                .await
                .map_err(|e| AttachmentError::Task(e.to_string()))??;
            }

            info!(profile = %profile.name, path = %target, "Thumbnail created");
            report.created.push(target);
        }

        if self.policy.delete_original {
            report.original_deleted = storage::remove_quietly(&source).await;
        }
        Ok(report)
    }
}

#[async_trait]
impl AttachmentHook for ThumbnailGenerator {
    async fn after_file_save(&self, ctx: &ResolveContext<'_>) -> AttachmentResult<()> {
        if self.policy.create_on_save {
            self.create_thumbs(ctx).await?;
        }
        Ok(())
    }

    fn derived_paths(&self, ctx: &ResolveContext<'_>) -> Vec<String> {
        self.policy
            .profiles
            .iter()
            .map(|p| self.thumb_path(ctx, &p.name))
            .collect()
    }
}
