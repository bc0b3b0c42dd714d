//! Attachment lifecycle
//!
//! An [`AttachmentBehavior`] binds one record attribute to a stored file and
//! reacts to the owning record's lifecycle events. [`Attachments`] holds every
//! behavior of a record type and routes host events to them.
//!
//! Per save cycle a behavior moves `Idle -> PendingUpload -> Attached`, or back
//! to `Idle` when the save is abandoned. There is no locking: two concurrent
//! saves of the same record race on the filesystem.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use ub_core::{AttributeValue, PathRoots, PendingUpload, Record, RecordStore, UploadSource};

use crate::error::{AttachmentError, AttachmentResult};
use crate::model::{AttachmentPolicy, ThumbnailPolicy};
use crate::resolver::{resolve, ResolveContext};
use crate::storage;
use crate::thumbnail::{ThumbnailGenerator, ThumbnailReport};

/// Work that runs after the original file has been written.
///
/// Hooks also report the files they derive from the original so those are
/// removed together with it.
#[async_trait]
pub trait AttachmentHook: Send + Sync {
    async fn after_file_save(&self, ctx: &ResolveContext<'_>) -> AttachmentResult<()>;

    /// Paths of files derived from the original for the given record state
    fn derived_paths(&self, _ctx: &ResolveContext<'_>) -> Vec<String> {
        Vec::new()
    }
}

/// One attachment attribute of a record type
#[derive(Clone)]
pub struct AttachmentBehavior {
    policy: Arc<AttachmentPolicy>,
    roots: Arc<PathRoots>,
    thumbnails: Option<Arc<ThumbnailGenerator>>,
    hooks: Vec<Arc<dyn AttachmentHook>>,
    pending: Option<PendingUpload>,
}

impl std::fmt::Debug for AttachmentBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentBehavior")
            .field("policy", &self.policy)
            .field("thumbnails", &self.thumbnails.is_some())
            .field("hooks", &self.hooks.len())
            .field("pending", &self.pending)
            .finish()
    }
}

impl AttachmentBehavior {
    pub fn new(policy: AttachmentPolicy, roots: Arc<PathRoots>) -> Self {
        Self {
            policy: Arc::new(policy),
            roots,
            thumbnails: None,
            hooks: Vec::new(),
            pending: None,
        }
    }

    /// Attach thumbnail generation; the generator runs as a post-save hook.
    pub fn with_thumbnails(mut self, thumbnails: ThumbnailPolicy) -> Self {
        let generator = Arc::new(ThumbnailGenerator::new(self.policy.clone(), thumbnails));
        self.hooks.push(generator.clone());
        self.thumbnails = Some(generator);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn AttachmentHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn policy(&self) -> &AttachmentPolicy {
        &self.policy
    }

    pub fn attribute(&self) -> &str {
        &self.policy.attribute
    }

    pub fn roots(&self) -> &PathRoots {
        &self.roots
    }

    pub fn thumbnails(&self) -> Option<&ThumbnailGenerator> {
        self.thumbnails.as_deref()
    }

    /// Upload captured for the current save cycle
    pub fn pending(&self) -> Option<&PendingUpload> {
        self.pending.as_ref()
    }

    /// Same behavior with no pending upload, for a fresh record instance
    pub fn fresh(&self) -> Self {
        Self {
            pending: None,
            ..self.clone()
        }
    }

    pub fn context<'a>(&'a self, record: &'a dyn Record) -> ResolveContext<'a> {
        ResolveContext::new(record, &self.policy, &self.roots)
    }

    fn has_file(&self, record: &dyn Record) -> bool {
        record
            .attribute(self.attribute())
            .map_or(false, |v| !v.is_empty())
    }

    fn generator(&self) -> AttachmentResult<&ThumbnailGenerator> {
        self.thumbnails()
            .ok_or_else(|| AttachmentError::ThumbnailsNotConfigured(self.attribute().to_string()))
    }

    /// Capture the upload for this attribute, if any.
    ///
    /// An upload already assigned to the attribute wins; otherwise the
    /// form-scoped field is tried before the bare attribute name.
    #[instrument(skip_all, fields(attribute = %self.policy.attribute))]
    pub fn before_validate(&mut self, record: &mut dyn Record, uploads: &dyn UploadSource) {
        let attribute = self.attribute().to_string();

        if let Some(upload) = record.attribute(&attribute).and_then(|v| v.as_upload()) {
            debug!(upload = %upload, "Upload assigned directly");
            self.pending = Some(upload.clone());
            return;
        }

        let found = uploads
            .instance(record.model_name(), &attribute)
            .or_else(|| uploads.instance_by_name(&attribute));

        match found {
            Some(upload) => {
                debug!(upload = %upload, "Upload captured");
                record.set_attribute(&attribute, AttributeValue::Upload(upload.clone()));
                self.pending = Some(upload);
            }
            None => self.pending = None,
        }
    }

    /// Clean the previous files of a replaced attachment and store the new
    /// file name, or keep the persisted name when nothing was uploaded.
    #[instrument(skip_all, fields(attribute = %self.policy.attribute))]
    pub async fn before_save(
        &mut self,
        record: &mut dyn Record,
        store: &dyn RecordStore,
    ) -> AttachmentResult<()> {
        let attribute = self.attribute().to_string();

        match &self.pending {
            Some(upload) => {
                if !record.is_new_record() {
                    let key = record.primary_key();
                    match store.find_persisted(record.model_name(), &key).await? {
                        Some(persisted) => self.clean_files(persisted.as_ref()).await,
                        None => warn!(?key, "Persisted record not found, previous files kept"),
                    }
                }
                record.set_attribute(&attribute, AttributeValue::Text(upload.stored_name()));
            }
            None => {
                if !record.is_new_record() && !self.has_file(record) {
                    if let Some(previous) = record.old_attribute(&attribute).cloned() {
                        record.set_attribute(&attribute, previous);
                    }
                }
            }
        }
        Ok(())
    }

    /// Write the pending upload to its resolved path and run post-save hooks
    #[instrument(skip_all, fields(attribute = %self.policy.attribute))]
    pub async fn after_save(&mut self, record: &dyn Record) -> AttachmentResult<()> {
        let Some(upload) = self.pending.take() else {
            return Ok(());
        };

        let path = PathBuf::from(resolve(&self.policy.file_path, &self.context(record)));
        storage::ensure_parent(&path).await?;
        upload.save_as(&path).await?;
        info!(path = %path.display(), size = upload.size(), "File saved");

        let ctx = self.context(record);
        for hook in &self.hooks {
            hook.after_file_save(&ctx).await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(attribute = %self.policy.attribute))]
    pub async fn before_delete(&self, record: &dyn Record) {
        self.clean_files(record).await;
    }

    /// Remove the stored file and everything derived from it. Failures are
    /// logged and swallowed.
    pub async fn clean_files(&self, record: &dyn Record) {
        if !self.has_file(record) {
            return;
        }

        let ctx = self.context(record);
        storage::remove_quietly(&resolve(&self.policy.file_path, &ctx)).await;
        for hook in &self.hooks {
            for path in hook.derived_paths(&ctx) {
                storage::remove_quietly(&path).await;
            }
        }
    }

    /// Filesystem path of the stored file, empty when there is none
    pub fn uploaded_file_path(&self, record: &dyn Record) -> String {
        if !self.has_file(record) {
            return String::new();
        }
        resolve(&self.policy.file_path, &self.context(record))
    }

    /// URL of the stored file, or `empty` when there is none
    pub fn uploaded_file_url(&self, record: &dyn Record, empty: Option<&str>) -> Option<String> {
        if !self.has_file(record) {
            return empty.map(str::to_string);
        }
        Some(resolve(&self.policy.file_url, &self.context(record)))
    }

    pub fn thumb_file_path(&self, record: &dyn Record, profile: &str) -> AttachmentResult<String> {
        let generator = self.generator()?;
        if !self.has_file(record) {
            return Ok(String::new());
        }
        Ok(generator.thumb_path(&self.context(record), profile))
    }

    /// URL of a thumbnail, or `empty` when there is no file. Missing
    /// thumbnails are generated first when the policy asks for it.
    pub async fn thumb_file_url(
        &self,
        record: &dyn Record,
        profile: &str,
        empty: Option<&str>,
    ) -> AttachmentResult<Option<String>> {
        let generator = self.generator()?;
        if !self.has_file(record) {
            return Ok(empty.map(str::to_string));
        }

        let ctx = self.context(record);
        if generator.policy().create_on_request {
            generator.create_thumbs(&ctx).await?;
        }
        Ok(Some(generator.thumb_url(&ctx, profile)))
    }

    pub async fn create_thumbs(&self, record: &dyn Record) -> AttachmentResult<ThumbnailReport> {
        let generator = self.generator()?;
        if !self.has_file(record) {
            return Ok(ThumbnailReport::default());
        }
        generator.create_thumbs(&self.context(record)).await
    }
}

/// Host record events the behaviors react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    BeforeValidate,
    BeforeInsert,
    BeforeUpdate,
    AfterInsert,
    AfterUpdate,
    BeforeDelete,
}

/// Host services a lifecycle event may need
#[derive(Clone, Copy)]
pub struct HookEnv<'a> {
    pub uploads: &'a dyn UploadSource,
    pub store: &'a dyn RecordStore,
}

/// Every attachment behavior of one record type
#[derive(Debug, Clone, Default)]
pub struct Attachments {
    behaviors: Vec<AttachmentBehavior>,
}

impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, behavior: AttachmentBehavior) -> Self {
        self.push(behavior);
        self
    }

    pub fn push(&mut self, behavior: AttachmentBehavior) {
        self.behaviors.push(behavior);
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.behaviors.iter().map(|b| b.attribute())
    }

    /// Registry with the same behaviors and no pending uploads
    pub fn fresh(&self) -> Self {
        Self {
            behaviors: self.behaviors.iter().map(AttachmentBehavior::fresh).collect(),
        }
    }

    /// Behavior bound to `attribute`
    pub fn behavior(&self, attribute: &str) -> AttachmentResult<&AttachmentBehavior> {
        self.behaviors
            .iter()
            .find(|b| b.attribute() == attribute)
            .ok_or_else(|| AttachmentError::MissingBehavior(attribute.to_string()))
    }

    pub fn behavior_mut(&mut self, attribute: &str) -> AttachmentResult<&mut AttachmentBehavior> {
        self.behaviors
            .iter_mut()
            .find(|b| b.attribute() == attribute)
            .ok_or_else(|| AttachmentError::MissingBehavior(attribute.to_string()))
    }

    /// Route a host event to every behavior, in registration order
    pub async fn dispatch(
        &mut self,
        event: LifecycleEvent,
        record: &mut dyn Record,
        env: &HookEnv<'_>,
    ) -> AttachmentResult<()> {
        debug!(?event, model = record.model_name(), "Dispatching lifecycle event");
        for behavior in &mut self.behaviors {
            match event {
                LifecycleEvent::BeforeValidate => behavior.before_validate(record, env.uploads),
                LifecycleEvent::BeforeInsert | LifecycleEvent::BeforeUpdate => {
                    behavior.before_save(record, env.store).await?
                }
                LifecycleEvent::AfterInsert | LifecycleEvent::AfterUpdate => {
                    behavior.after_save(record).await?
                }
                LifecycleEvent::BeforeDelete => behavior.before_delete(record).await,
            }
        }
        Ok(())
    }

    pub fn uploaded_file_path(&self, record: &dyn Record, attribute: &str) -> AttachmentResult<String> {
        Ok(self.behavior(attribute)?.uploaded_file_path(record))
    }

    pub fn uploaded_file_url(
        &self,
        record: &dyn Record,
        attribute: &str,
        empty: Option<&str>,
    ) -> AttachmentResult<Option<String>> {
        Ok(self.behavior(attribute)?.uploaded_file_url(record, empty))
    }

    /// URL of the original image of an image attachment
    pub fn image_file_url(
        &self,
        record: &dyn Record,
        attribute: &str,
        empty: Option<&str>,
    ) -> AttachmentResult<Option<String>> {
        let behavior = self.behavior(attribute)?;
        behavior.generator()?;
        Ok(behavior.uploaded_file_url(record, empty))
    }

    pub fn thumb_file_path(
        &self,
        record: &dyn Record,
        attribute: &str,
        profile: &str,
    ) -> AttachmentResult<String> {
        self.behavior(attribute)?.thumb_file_path(record, profile)
    }

    pub async fn thumb_file_url(
        &self,
        record: &dyn Record,
        attribute: &str,
        profile: &str,
        empty: Option<&str>,
    ) -> AttachmentResult<Option<String>> {
        self.behavior(attribute)?
            .thumb_file_url(record, profile, empty)
            .await
    }

    pub async fn create_thumbs(
        &self,
        record: &dyn Record,
        attribute: &str,
    ) -> AttachmentResult<ThumbnailReport> {
        self.behavior(attribute)?.create_thumbs(record).await
    }
}
