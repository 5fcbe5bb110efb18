use std::path::PathBuf;

use ::tracing::error;
use blob_store::BlobStorage;
use clap::{Parser, Subcommand};
use metadata_store::MongoDocumentStore;

mod config;
mod http_objects;
mod ingest;
mod routes;
mod service;
mod tracing;
use tracing::setup_tracing;

#[cfg(test)]
mod testing;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "config file", help = "Path to config file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the federation HTTP API
    Serve,
    /// Upload a file and store a metadata record referencing it
    Ingest {
        /// Local file to upload
        file: PathBuf,
        /// Target bucket; defaults to the configured one
        #[arg(long)]
        bucket: Option<String>,
        /// Object key; defaults to a generated `{uuid}_{file_name}`
        #[arg(long)]
        key: Option<String>,
        /// Metadata record as a JSON object
        #[arg(long, default_value = "{}")]
        metadata: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match config::ServerConfig::load(cli.config.as_deref().and_then(|p| p.to_str())) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error loading config: {:?}", err);
            std::process::exit(1);
        }
    };
    setup_tracing(&config);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let service = service::Service::new(config);
            if let Err(err) = service.start().await {
                error!("Error starting service: {:?}", err);
                std::process::exit(1);
            }
        }
        Command::Ingest {
            file,
            bucket,
            key,
            metadata,
        } => {
            let metadata: serde_json::Value = match serde_json::from_str(&metadata) {
                Ok(value) => value,
                Err(err) => {
                    error!("invalid metadata JSON: {}", err);
                    std::process::exit(1);
                }
            };
            let store = match MongoDocumentStore::new(&config.metadata_store).await {
                Ok(store) => store,
                Err(err) => {
                    error!("error connecting to metadata store: {:?}", err);
                    std::process::exit(1);
                }
            };
            let blobs = BlobStorage::new(config.blob_storage.clone());
            match ingest::ingest_file(
                &store,
                &blobs,
                &file,
                bucket.as_deref(),
                key.as_deref(),
                &metadata,
            )
            .await
            {
                Ok(id) => println!("{}", id),
                Err(err) => {
                    error!("ingestion failed: {:?}", err);
                    std::process::exit(1);
                }
            }
        }
    }
}
