mod document;
mod store;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use document::{Document, Field};
use std::fs;
use std::path::{Path, PathBuf};
use store::JsonRecordStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload_core::constants::UPLOAD_BASE_PATH_ENV;
use upload_core::{
    ExtensionHint, PendingUpload, PendingWrite, UnitOfWork, UploadCarrier, UploadConfig,
    UploadListener,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "uploads")]
#[command(about = "Attach files to records with transactional upload handling")]
struct Cli {
    /// Directory holding record JSON files
    #[arg(long, default_value = "records", global = true)]
    records_dir: PathBuf,
    /// YAML configuration file (overrides UPLOAD_BASE_PATH)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach a file to a record, replacing any previous file in that field
    Attach {
        /// Record UUID, or "new" to create a record
        record: String,
        /// File to upload
        source: PathBuf,
        /// Upload field to set
        #[arg(long, value_enum, default_value = "attachment")]
        field: Field,
        /// Extension of the stored file (defaults to the source's extension)
        #[arg(long, conflicts_with = "media_type")]
        extension: Option<String>,
        /// Media type used to pick the stored file's extension
        #[arg(long)]
        media_type: Option<String>,
    },
    /// Show a record and the paths of its stored files
    Show {
        /// Record UUID
        record: Uuid,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("uploads=info".parse()?)
                .add_directive("upload_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = resolve_config(
        cli.config.as_deref(),
        std::env::var(UPLOAD_BASE_PATH_ENV).ok(),
        &std::env::current_dir()?,
    )?;

    match cli.command {
        Some(Commands::Attach {
            record,
            source,
            field,
            extension,
            media_type,
        }) => {
            let Some(listener) = UploadListener::from_config(&config)? else {
                bail!(
                    "No upload base path configured; set {} or pass --config",
                    UPLOAD_BASE_PATH_ENV
                );
            };
            let store = JsonRecordStore::open(&cli.records_dir)?;
            let record = match record.as_str() {
                "new" => None,
                id => Some(id.parse::<Uuid>().context("record must be a UUID or \"new\"")?),
            };
            let hint = extension_hint(&source, extension, media_type);

            let attached = attach(store, &listener, record, &source, field, hint)?;
            println!("Record: {}", attached.record_id);
            println!("Stored: {}", attached.stored.display());
            if attached.orphaned > 0 {
                eprintln!(
                    "Warning: {} superseded file(s) could not be deleted",
                    attached.orphaned
                );
            }
        }
        Some(Commands::Show { record }) => {
            let store = JsonRecordStore::open(&cli.records_dir)?;
            let doc = store.load(record)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);

            if let Some(listener) = UploadListener::from_config(&config)? {
                for field in [Field::Attachment, Field::Preview] {
                    if let Some(path) = doc.stored_path(listener.namer(), field) {
                        println!("{}: {}", field.as_str(), path.display());
                    }
                }
            }
        }
        None => {
            println!("No command given. Use --help for usage.");
        }
    }

    Ok(())
}

/// `--config` wins over the environment. A relative `UPLOAD_BASE_PATH` is resolved against
/// `cwd`.
fn resolve_config(
    config: Option<&Path>,
    env_value: Option<String>,
    cwd: &Path,
) -> anyhow::Result<UploadConfig> {
    if let Some(path) = config {
        return UploadConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load {}", path.display()));
    }

    UploadConfig::from_env_value_relative_to(env_value, cwd)
        .with_context(|| format!("invalid {}", UPLOAD_BASE_PATH_ENV))
}

fn extension_hint(
    source: &Path,
    extension: Option<String>,
    media_type: Option<String>,
) -> ExtensionHint {
    match (extension, media_type) {
        (Some(extension), _) => ExtensionHint::Extension(extension),
        (None, Some(media_type)) => ExtensionHint::MediaType(media_type),
        (None, None) => source
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(ExtensionHint::from_file_name)
            .unwrap_or_else(|| ExtensionHint::Extension(String::new())),
    }
}

struct Attached {
    record_id: Uuid,
    stored: PathBuf,
    orphaned: usize,
}

/// Stages a copy of `source` and flushes it onto the record in one transaction.
fn attach(
    store: JsonRecordStore,
    listener: &UploadListener,
    record: Option<Uuid>,
    source: &Path,
    field: Field,
    hint: ExtensionHint,
) -> anyhow::Result<Attached> {
    let (mut doc, is_new) = match record {
        Some(id) => (store.load(id)?, false),
        None => (Document::new(), true),
    };

    let staging = store.staging_dir();
    fs::create_dir_all(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;
    let staged = staging.join(Uuid::new_v4().simple().to_string());
    fs::copy(source, &staged).with_context(|| format!("failed to read {}", source.display()))?;

    doc.set_file_upload(field.as_str(), Some(PendingUpload::new(&staged, hint)))?;
    doc.touch();

    let mut uow = UnitOfWork::with_uploads(store, listener.clone());
    let write = if is_new {
        PendingWrite::insert(&mut doc)
    } else {
        PendingWrite::update(&mut doc)
    };
    let flushed = uow.flush(&mut [write]);

    let report = match flushed {
        Ok(report) => report,
        Err(e) => {
            if let Err(remove_error) = fs::remove_file(&staged) {
                if remove_error.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        error = %remove_error,
                        staged = %staged.display(),
                        "Failed to remove staged copy after failed flush"
                    );
                }
            }
            return Err(e.into());
        }
    };

    let stored = doc
        .stored_path(listener.namer(), field)
        .context("flush completed without a stored file name")?;
    tracing::info!(
        id = %doc.id,
        field = field.as_str(),
        path = %stored.display(),
        "File attached"
    );

    Ok(Attached {
        record_id: doc.id,
        stored,
        orphaned: report.failures.len(),
    })
}
