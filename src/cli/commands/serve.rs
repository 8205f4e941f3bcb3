use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::models::Config;
use crate::server::{AppState, SharedStore, serve};
use crate::services::{AsyncEmbeddingClient, AsyncHttpStore, AsyncVectorStore};

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, help = "Bind address (defaults to [Server] host)")]
    pub host: Option<String>,

    #[arg(long, short = 'p', help = "Port (defaults to [Server] port)")]
    pub port: Option<u16>,

    #[arg(long, help = "Store received log lines in Chroma over HTTP")]
    pub store: bool,

    #[arg(long, help = "Collection for stored log lines (defaults to [Server] collection)")]
    pub collection: Option<String>,
}

pub fn handle_serve(args: ServeArgs, config: &Config) -> Result<()> {
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let ip: IpAddr = host
        .parse()
        .with_context(|| format!("invalid bind address: {host}"))?;
    let addr = SocketAddr::new(ip, port);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let store = if args.store {
            let collection = args
                .collection
                .unwrap_or_else(|| config.server.collection.clone());
            Some(connect_store(config, &collection).await?)
        } else {
            tracing::info!(target: "server", "no --store given; log lines are echoed only");
            None
        };

        serve(addr, Arc::new(AppState::new(store)))
            .await
            .with_context(|| format!("server on {addr} failed"))
    })
}

async fn connect_store(config: &Config, collection: &str) -> Result<SharedStore> {
    let embedder = AsyncEmbeddingClient::new(&config.embedding)?;
    let mut store = AsyncHttpStore::new(&config.chroma, embedder);
    store
        .create_client()
        .await
        .context("failed to connect to Chroma")?;
    store
        .get_collection(collection)
        .await
        .with_context(|| format!("failed to open collection '{collection}'"))?;
    tracing::info!(target: "server", collection, "storing log lines");
    Ok(Arc::new(store))
}
