//! upload-behavior
//!
//! Inspect and exercise attachment configuration from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use ub_attachments::{
    resolve, AttachmentBehavior, AttachmentPolicy, HookEnv, LifecycleEvent, MemoryUploads,
    ResolveContext,
};
use ub_cli::{describe, init_tracing, load_config, parse_record, stage_upload};
use ub_core::{MemoryRecordStore, Record};

#[derive(Parser, Debug)]
#[command(name = "upload-behavior")]
#[command(about = "Resolve attachment paths, generate thumbnails and attach files to records")]
struct Cli {
    /// Configuration file (YAML, TOML or JSON); roots come from the
    /// environment when omitted
    #[arg(long, short, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RecordArgs {
    /// Record fields as a JSON object
    #[arg(long, value_name = "JSON")]
    record: String,

    /// Record type name
    #[arg(long, default_value = "Model")]
    model: String,

    /// Primary-key fields, in order
    #[arg(long = "key", default_value = "id", value_delimiter = ',')]
    key: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a single template against a record
    Resolve {
        template: String,
        #[command(flatten)]
        record: RecordArgs,
        /// Attachment attribute supplying the file placeholders
        #[arg(long, default_value = "upload")]
        attribute: String,
        /// Thumbnail profile for `[[profile]]`
        #[arg(long)]
        profile: Option<String>,
    },
    /// Print paths and URLs of every configured attachment
    Paths {
        #[command(flatten)]
        record: RecordArgs,
    },
    /// Generate missing thumbnails for an image attachment
    Thumbs {
        #[command(flatten)]
        record: RecordArgs,
        #[arg(long)]
        attribute: String,
    },
    /// Run a save cycle that attaches a local file to the record
    Attach {
        #[command(flatten)]
        record: RecordArgs,
        #[arg(long)]
        attribute: String,
        /// File to attach; it is copied, never moved
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
        /// Treat the record as already persisted, replacing its current file
        #[arg(long)]
        existing: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Resolve {
            template,
            record,
            attribute,
            profile,
        } => {
            let record = parse_record(&record.model, &record.key, &record.record)?;
            let policy = AttachmentPolicy::new(attribute);
            let mut ctx = ResolveContext::new(&record, &policy, &config.roots);
            if let Some(profile) = profile.as_deref() {
                ctx = ctx.with_profile(profile);
            }
            println!("{}", resolve(&template, &ctx));
        }
        Command::Paths { record } => {
            let record = parse_record(&record.model, &record.key, &record.record)?;
            let out = describe(&config.attachments(), &record)?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Thumbs { record, attribute } => {
            let record = parse_record(&record.model, &record.key, &record.record)?;
            let report = config.attachments().create_thumbs(&record, &attribute).await?;
            info!(
                created = report.created.len(),
                skipped = report.skipped.len(),
                "Thumbnails processed"
            );
            for path in &report.created {
                println!("{}", path);
            }
        }
        Command::Attach {
            record,
            attribute,
            file,
            existing,
        } => {
            let mut record = parse_record(&record.model, &record.key, &record.record)?;
            let store = MemoryRecordStore::new();
            if existing {
                store.save(&mut record).await;
            }

            let mut attachments = config.attachments();
            if attachments.behavior(&attribute).is_err() {
                let roots = Arc::new(config.roots.clone());
                attachments.push(AttachmentBehavior::new(AttachmentPolicy::new(&attribute), roots));
            }

            let staging = std::env::temp_dir().join("upload-behavior");
            let upload = stage_upload(&file, &staging).await?;
            let uploads = MemoryUploads::new().with(attribute.clone(), upload);
            let env = HookEnv {
                uploads: &uploads,
                store: &store,
            };

            let insert = record.is_new_record();
            attachments
                .dispatch(LifecycleEvent::BeforeValidate, &mut record, &env)
                .await?;
            let before = if insert {
                LifecycleEvent::BeforeInsert
            } else {
                LifecycleEvent::BeforeUpdate
            };
            attachments.dispatch(before, &mut record, &env).await?;
            store.save(&mut record).await;
            let after = if insert {
                LifecycleEvent::AfterInsert
            } else {
                LifecycleEvent::AfterUpdate
            };
            attachments.dispatch(after, &mut record, &env).await?;

            info!(attribute = %attribute, value = %record.text(&attribute), "File attached");
            println!("{}", serde_json::to_string_pretty(&describe(&attachments, &record)?)?);
        }
    }

    Ok(())
}
