//! Shared helpers for the `upload-behavior` binary

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ub_attachments::{AppConfig, Attachments, PendingUpload};
use ub_core::{MemoryRecord, Record};

/// Install the tracing subscriber. Logs go to stderr so command output on
/// stdout stays machine readable.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ub_attachments=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Configuration from a file when given, from the environment otherwise
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    match path {
        Some(path) => AppConfig::load(Some(path))
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(AppConfig::from_env()),
    }
}

/// Build a record from a JSON object given on the command line
pub fn parse_record(model: &str, key: &[String], json: &str) -> Result<MemoryRecord> {
    let value: Value = serde_json::from_str(json).context("Record is not valid JSON")?;
    if !value.is_object() {
        bail!("Record must be a JSON object");
    }
    let key: Vec<&str> = key.iter().map(String::as_str).collect();
    Ok(MemoryRecord::from_json(model, &key, &value))
}

/// Copy a local file into `staging` so it can be moved into place like a
/// fresh upload without touching the original.
pub async fn stage_upload(file: &Path, staging: &Path) -> Result<PendingUpload> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", file.display()))?;

    tokio::fs::create_dir_all(staging).await?;
    let temp = staging.join(format!("{}-{}", std::process::id(), name));
    let size = tokio::fs::copy(file, &temp)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    Ok(PendingUpload::new(temp, name, size))
}

/// Paths and URLs of every attachment of `record`, thumbnails included
pub fn describe(attachments: &Attachments, record: &dyn Record) -> Result<Value> {
    let mut out = Map::new();

    for attribute in attachments.attributes() {
        let behavior = attachments.behavior(attribute)?;
        let path = behavior.uploaded_file_path(record);
        let mut entry = json!({
            "path": path,
            "url": behavior.uploaded_file_url(record, None),
        });

        if let Some(generator) = behavior.thumbnails() {
            let ctx = behavior.context(record);
            let mut thumbs = Map::new();
            for profile in &generator.policy().profiles {
                let thumb = if path.is_empty() {
                    Value::Null
                } else {
                    json!({
                        "path": generator.thumb_path(&ctx, &profile.name),
                        "url": generator.thumb_url(&ctx, &profile.name),
                    })
                };
                thumbs.insert(profile.name.clone(), thumb);
            }
            entry["thumbnails"] = Value::Object(thumbs);
        }

        out.insert(attribute.to_string(), entry);
    }

    Ok(Value::Object(out))
}
