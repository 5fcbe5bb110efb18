use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use blob_store::BlobStorage;
use metadata_store::MongoDocumentStore;
use tokio::signal;
use tracing::info;

use crate::{
    config::ServerConfig,
    routes::{create_routes, RouteState},
};

pub struct Service {
    pub config: ServerConfig,
}

impl Service {
    pub fn new(config: ServerConfig) -> Self {
        Service { config }
    }

    pub async fn start(&self) -> Result<()> {
        let document_store = Arc::new(
            MongoDocumentStore::new(&self.config.metadata_store)
                .await
                .context("error connecting to metadata store")?,
        );
        let blob_storage = Arc::new(BlobStorage::new(self.config.blob_storage.clone()));

        let route_state = RouteState {
            document_store,
            blob_fetcher: blob_storage,
        };

        let handle = Handle::new();
        let handle_sh = handle.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        info!("server api listening on {}", self.config.listen_addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(create_routes(route_state).into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.shutdown();
}
