//! Cumulus driver - container lifecycle, metadata, and tunable transfers

use anyhow::Context;
use clap::{Parser, Subcommand};
use cumulus_store::{Config, MemoryStore, RemoteStore, StorageService};
use cumulus_transfer::{
    ProgressCallback, TransferCoordinator, TransferOptions, DEFAULT_BLOCK_SIZE,
    DEFAULT_MAX_CONCURRENCY,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "cumulus")]
#[command(about = "Chunked blob transfers against a block-oriented object store")]
#[command(version)]
struct Cli {
    /// Storage endpoint URL
    #[arg(long, default_value = "http://localhost:10000", env = "CUMULUS_ENDPOINT")]
    endpoint: String,

    /// Bearer access token
    #[arg(long, env = "CUMULUS_TOKEN")]
    token: Option<String>,

    /// Use an in-memory store (for experimentation, data will not persist)
    #[arg(long, env = "CUMULUS_MEMORY_STORE")]
    memory_store: bool,

    /// Enable debug logging
    #[arg(short, long, env = "CUMULUS_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a container, with a random unique name when none is given
    CreateContainer {
        /// Container name (must be lowercase)
        #[arg(long)]
        name: Option<String>,
    },
    /// Replace a container's user metadata
    SetMetadata {
        container: String,
        /// Metadata entries as key=value
        #[arg(required = true, value_parser = parse_key_val)]
        entries: Vec<(String, String)>,
    },
    /// Print a container's properties and metadata
    Props { container: String },
    /// Upload a file as staged blocks with tunable transfer parameters
    Upload {
        container: String,
        file: PathBuf,
        /// Blob name, defaults to the file name
        #[arg(long)]
        blob_name: Option<String>,
        /// Block size in bytes
        #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: usize,
        /// Maximum parallel staging operations
        #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
        concurrency: usize,
        /// Searchable index tags as key=value
        #[arg(long = "tag", value_parser = parse_key_val)]
        tags: Vec<(String, String)>,
    },
    /// Download a blob with tunable transfer parameters
    Download {
        container: String,
        blob: String,
        out: PathBuf,
        /// Maximum parallel range requests
        #[arg(long, default_value_t = DEFAULT_MAX_CONCURRENCY)]
        concurrency: usize,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw}"))?;
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cumulus={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.memory_store {
        tracing::warn!("using in-memory storage - data will NOT persist");
        run(Arc::new(MemoryStore::new()), cli).await
    } else {
        let mut config = Config::new(cli.endpoint.clone());
        if let Some(token) = cli.token.clone() {
            config = config.with_token(token);
        }
        let store = Arc::new(RemoteStore::new(config)?);
        run(store, cli).await
    }
}

async fn run<S: StorageService + 'static>(store: Arc<S>, cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::CreateContainer { name } => {
            let name = name.unwrap_or_else(|| format!("container-{}", Uuid::new_v4()));
            store
                .create_container(&name)
                .await
                .with_context(|| format!("creating container {name}"))?;
            println!("created container {name}");
        }
        Command::SetMetadata { container, entries } => {
            let metadata: BTreeMap<String, String> = entries.into_iter().collect();
            store
                .set_container_metadata(&container, metadata)
                .await
                .with_context(|| format!("setting metadata on {container}"))?;
            println!("metadata updated on {container}");
        }
        Command::Props { container } => {
            let props = store
                .get_container_properties(&container)
                .await
                .with_context(|| format!("fetching properties of {container}"))?;
            println!("Properties for container {container}");
            println!("Public access level: {}", props.public_access);
            println!("Last modified time in UTC: {}", props.last_modified);
            for (key, value) in &props.metadata {
                println!("Metadata: {key} = {value}");
            }
        }
        Command::Upload {
            container,
            file,
            blob_name,
            block_size,
            concurrency,
            tags,
        } => {
            let blob = blob_name.unwrap_or_else(|| file_name(&file));
            let source = std::fs::File::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let len = source.metadata()?.len();

            let options = TransferOptions::default()
                .with_block_size(block_size)
                .with_max_concurrency(concurrency);
            let coordinator = TransferCoordinator::new(Arc::clone(&store), options)?;

            if len <= coordinator.options().initial_transfer_size {
                coordinator.upload(&container, &blob, source, len).await?;
            } else {
                let progress: ProgressCallback = Box::new(|p| {
                    eprint!(
                        "\rstaged {}/{} blocks ({:.1}%)",
                        p.blocks_staged,
                        p.total_blocks,
                        p.percentage()
                    );
                });
                coordinator
                    .upload_blocks(&container, &blob, source, len, Some(progress))
                    .await?;
                eprintln!();
            }

            if !tags.is_empty() {
                let tags: BTreeMap<String, String> = tags.into_iter().collect();
                store.set_blob_tags(&container, &blob, tags).await?;
            }
            println!("uploaded {} ({len} bytes) to {container}/{blob}", file.display());
        }
        Command::Download {
            container,
            blob,
            out,
            concurrency,
        } => {
            let options = TransferOptions::default().with_max_concurrency(concurrency);
            let coordinator = TransferCoordinator::new(Arc::clone(&store), options)?;

            let mut sink = std::fs::File::create(&out)
                .with_context(|| format!("creating {}", out.display()))?;
            let written = coordinator.download(&container, &blob, &mut sink).await?;
            println!("downloaded {container}/{blob} ({written} bytes) to {}", out.display());
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "blob".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_val_parses() {
        assert_eq!(
            parse_key_val("docType=textDocuments").unwrap(),
            ("docType".to_string(), "textDocuments".to_string())
        );
        assert!(parse_key_val("nodelimiter").is_err());
    }

    #[test]
    fn cli_parses_upload_flags() {
        let cli = Cli::parse_from([
            "cumulus",
            "upload",
            "mycontainer",
            "data.bin",
            "--block-size",
            "1048576",
            "--concurrency",
            "4",
            "--tag",
            "Content=image",
        ]);
        match cli.command {
            Command::Upload {
                block_size,
                concurrency,
                tags,
                ..
            } => {
                assert_eq!(block_size, 1048576);
                assert_eq!(concurrency, 4);
                assert_eq!(tags, vec![("Content".to_string(), "image".to_string())]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
