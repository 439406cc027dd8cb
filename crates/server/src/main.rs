//! iconcache server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use iconcache_client::{FetchClient, FetchConfig};
use iconcache_core::config::AppConfig;
use iconcache_core::{CacheOptions, IconCache};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(db_path = %config.db_path.display(), "Starting iconcache server on stdio transport");

    let fetcher = FetchClient::new(FetchConfig::from_app_config(&config))?;
    let cache = IconCache::builder(CacheOptions::from_config(&config))
        .fetcher(Arc::new(fetcher))
        .build();

    if !cache.init().await {
        tracing::warn!("icon cache failed to initialize; lookups will miss until it recovers");
    }

    let handler = handler::IconCacheServer::new(cache.clone());
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    let outcome = server.waiting().await;
    cache.destroy().await;
    outcome?;

    Ok(())
}
