//! Save, replace and delete cycles against a real filesystem

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use tempfile::TempDir;
use ub_attachments::{
    AttachmentBehavior, AttachmentError, AttachmentPolicy, AttachmentResult, Attachments, HookEnv,
    LifecycleEvent, MemoryUploads, PathRoots, PendingUpload, ThumbnailPolicy, ThumbnailProfile,
};
use ub_core::{AttributeValue, MemoryRecord, MemoryRecordStore, Record};

struct Fixture {
    dir: TempDir,
    attachments: Attachments,
    store: MemoryRecordStore,
}

impl Fixture {
    fn new(thumbnails: ThumbnailPolicy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let web = dir.path().join("web");
        let roots = Arc::new(PathRoots::new(
            dir.path().to_string_lossy(),
            web.to_string_lossy(),
            "https://static.example.com",
        ));

        let photo = AttachmentPolicy::image("photo")
            .file_path("@webroot/images/[[id_path]]/[[basename]]")
            .file_url("@web/images/[[id_path]]/[[basename]]");
        let document = AttachmentPolicy::new("document")
            .file_path("@app/private/[[model]]/[[pk]]-[[attribute]].[[extension]]");

        let attachments = Attachments::new()
            .with(AttachmentBehavior::new(photo, roots.clone()).with_thumbnails(thumbnails))
            .with(AttachmentBehavior::new(document, roots));

        Self {
            dir,
            attachments,
            store: MemoryRecordStore::new(),
        }
    }

    fn web(&self, relative: &str) -> PathBuf {
        self.dir.path().join("web").join(relative)
    }

    /// Write a PNG to the temporary upload area
    fn png_upload(&self, name: &str, width: u32, height: u32) -> PendingUpload {
        let temp = self.dir.path().join(format!("tmp-{}", name));
        RgbaImage::from_pixel(width, height, Rgba([90, 160, 30, 255]))
            .save_with_format(&temp, image::ImageFormat::Png)
            .unwrap();
        let size = std::fs::metadata(&temp).unwrap().len();
        PendingUpload::new(temp, name, size)
    }

    async fn save(
        &mut self,
        record: &mut MemoryRecord,
        uploads: &MemoryUploads,
    ) -> AttachmentResult<()> {
        let env = HookEnv {
            uploads,
            store: &self.store,
        };
        let insert = record.is_new_record();
        let (before, after) = if insert {
            (LifecycleEvent::BeforeInsert, LifecycleEvent::AfterInsert)
        } else {
            (LifecycleEvent::BeforeUpdate, LifecycleEvent::AfterUpdate)
        };

        self.attachments
            .dispatch(LifecycleEvent::BeforeValidate, record, &env)
            .await?;
        self.attachments.dispatch(before, record, &env).await?;
        self.store.save(record).await;
        self.attachments.dispatch(after, record, &env).await
    }

    async fn delete(&mut self, record: &mut MemoryRecord) -> AttachmentResult<()> {
        let uploads = MemoryUploads::new();
        let env = HookEnv {
            uploads: &uploads,
            store: &self.store,
        };
        self.attachments
            .dispatch(LifecycleEvent::BeforeDelete, record, &env)
            .await?;
        self.store.delete(record).await?;
        Ok(())
    }
}

fn small_profile() -> ThumbnailPolicy {
    ThumbnailPolicy::new()
        .thumb_path("@webroot/images/[[id_path]]/[[profile]]_[[basename]]")
        .thumb_url("@web/images/[[id_path]]/[[profile]]_[[basename]]")
        .profile(ThumbnailProfile::new("small", 32, 32))
}

const ID_DIR: &str = "images/1/0/0/0/0/0/0/0/0/0";

fn exists(path: &Path) -> bool {
    path.is_file()
}

#[tokio::test]
async fn test_insert_writes_original_and_thumbnails() {
    let mut fx = Fixture::new(small_profile());
    let uploads = MemoryUploads::new().with("Photo[photo]", fx.png_upload("Beach.PNG", 64, 48));
    let mut record = MemoryRecord::new("Photo").set("id", 1);

    fx.save(&mut record, &uploads).await.unwrap();

    assert_eq!(record.text("photo"), "Beach.png");
    assert!(exists(&fx.web(&format!("{}/Beach.png", ID_DIR))));
    assert!(exists(&fx.web(&format!("{}/small_Beach.png", ID_DIR))));

    let url = fx
        .attachments
        .uploaded_file_url(&record, "photo", None)
        .unwrap();
    assert_eq!(
        url.as_deref(),
        Some("https://static.example.com/images/1/0/0/0/0/0/0/0/0/0/Beach.png")
    );
    let thumb = fx
        .attachments
        .thumb_file_url(&record, "photo", "small", None)
        .await
        .unwrap();
    assert_eq!(
        thumb.as_deref(),
        Some("https://static.example.com/images/1/0/0/0/0/0/0/0/0/0/small_Beach.png")
    );
}

#[tokio::test]
async fn test_replace_removes_previous_files() {
    let mut fx = Fixture::new(small_profile());
    let mut record = MemoryRecord::new("Photo").set("id", 1);

    let first = MemoryUploads::new().with("photo", fx.png_upload("first.png", 64, 64));
    fx.save(&mut record, &first).await.unwrap();
    let old_original = fx.web(&format!("{}/first.png", ID_DIR));
    let old_thumb = fx.web(&format!("{}/small_first.png", ID_DIR));
    assert!(exists(&old_original));
    assert!(exists(&old_thumb));

    let second = MemoryUploads::new().with("Photo[photo]", fx.png_upload("second.png", 64, 64));
    fx.save(&mut record, &second).await.unwrap();

    assert!(!exists(&old_original));
    assert!(!exists(&old_thumb));
    assert!(exists(&fx.web(&format!("{}/second.png", ID_DIR))));
    assert!(exists(&fx.web(&format!("{}/small_second.png", ID_DIR))));
    assert_eq!(record.text("photo"), "second.png");
}

#[tokio::test]
async fn test_update_without_upload_keeps_file() {
    let mut fx = Fixture::new(small_profile());
    let mut record = MemoryRecord::new("Photo").set("id", 1);
    let uploads = MemoryUploads::new().with("photo", fx.png_upload("keep.png", 40, 40));
    fx.save(&mut record, &uploads).await.unwrap();

    // A form submitted without a file blanks the attribute.
    record.set_attribute("photo", AttributeValue::Null);
    fx.save(&mut record, &MemoryUploads::new()).await.unwrap();

    assert_eq!(record.text("photo"), "keep.png");
    assert!(exists(&fx.web(&format!("{}/keep.png", ID_DIR))));
}

#[tokio::test]
async fn test_delete_removes_files() {
    let mut fx = Fixture::new(small_profile());
    let mut record = MemoryRecord::new("Photo").set("id", 1);
    let uploads = MemoryUploads::new().with("photo", fx.png_upload("gone.png", 40, 40));
    fx.save(&mut record, &uploads).await.unwrap();

    fx.delete(&mut record).await.unwrap();

    assert!(!exists(&fx.web(&format!("{}/gone.png", ID_DIR))));
    assert!(!exists(&fx.web(&format!("{}/small_gone.png", ID_DIR))));
    assert!(fx.store.is_empty().await);
}

#[tokio::test]
async fn test_delete_without_file_succeeds() {
    let mut fx = Fixture::new(small_profile());
    let mut record = MemoryRecord::new("Photo").set("id", 5);
    fx.save(&mut record, &MemoryUploads::new()).await.unwrap();

    fx.delete(&mut record).await.unwrap();
    assert_eq!(
        fx.attachments
            .uploaded_file_url(&record, "photo", Some("/img/placeholder.png"))
            .unwrap(),
        Some("/img/placeholder.png".to_string())
    );
    assert_eq!(
        fx.attachments
            .thumb_file_url(&record, "photo", "small", Some("/img/placeholder.png"))
            .await
            .unwrap(),
        Some("/img/placeholder.png".to_string())
    );
}

#[tokio::test]
async fn test_second_attribute_uses_own_template() {
    let mut fx = Fixture::new(small_profile());
    let temp = fx.dir.path().join("tmp-contract");
    std::fs::write(&temp, b"signed").unwrap();
    let uploads = MemoryUploads::new().with("document", PendingUpload::new(temp, "Contract.PDF", 6));
    let mut record = MemoryRecord::new("Photo").set("id", 12);

    fx.save(&mut record, &uploads).await.unwrap();

    let path = fx.attachments.uploaded_file_path(&record, "document").unwrap();
    assert_eq!(
        path,
        format!("{}/private/photo/12-document.pdf", fx.dir.path().display())
    );
    assert_eq!(std::fs::read(&path).unwrap(), b"signed");
    assert_eq!(fx.attachments.uploaded_file_path(&record, "photo").unwrap(), "");
}

#[tokio::test]
async fn test_thumbnails_on_request() {
    let mut fx = Fixture::new(small_profile().create_on_save(false).create_on_request(true));
    let mut record = MemoryRecord::new("Photo").set("id", 1);
    let uploads = MemoryUploads::new().with("photo", fx.png_upload("lazy.png", 50, 50));
    fx.save(&mut record, &uploads).await.unwrap();

    let thumb = fx.web(&format!("{}/small_lazy.png", ID_DIR));
    assert!(!exists(&thumb));

    fx.attachments
        .thumb_file_url(&record, "photo", "small", None)
        .await
        .unwrap();
    assert!(exists(&thumb));

    let again = fx.attachments.create_thumbs(&record, "photo").await.unwrap();
    assert!(again.created.is_empty());
}

#[tokio::test]
async fn test_failed_write_reports_upload_code() {
    let mut fx = Fixture::new(small_profile());
    let upload = PendingUpload::new("/nonexistent/tmp-upload", "partial.png", 10).with_error_code(3);
    let uploads = MemoryUploads::new().with("photo", upload);
    let mut record = MemoryRecord::new("Photo").set("id", 1);

    let err = fx.save(&mut record, &uploads).await.unwrap_err();
    assert!(matches!(err, AttachmentError::Upload(_)));
    assert_eq!(
        err.to_string(),
        "File saving error: The uploaded file was only partially uploaded. Error code is 3"
    );
}

#[tokio::test]
async fn test_unknown_attribute() {
    let fx = Fixture::new(small_profile());
    let record = MemoryRecord::new("Photo").set("id", 1);

    let err = fx
        .attachments
        .uploaded_file_url(&record, "avatar", None)
        .unwrap_err();
    assert!(matches!(err, AttachmentError::MissingBehavior(_)));
    assert!(err.is_configuration_error());
}
