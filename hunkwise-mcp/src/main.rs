//! hunkwise-mcp — stdio MCP server with one tool, `submit_review`.
//!
//! Reviews submitted here go through the same ingest pipeline as the HTTP
//! endpoint and the generator, with strict validation, and land in the same
//! store the viewer watches.

mod server;

use std::sync::Arc;

use hunkwise_core::clock::SystemClock;
use hunkwise_core::config::Config;
use hunkwise_core::ingest::IngestService;
use rmcp::{transport::io::stdio, ServiceExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use server::ReviewMcpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC, so logs go to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive("hunkwise=info".parse()?))
        .init();

    let config = Config::load();
    let store = config.store();
    tracing::info!(store = %store.base().display(), "starting hunkwise MCP server");

    let server = ReviewMcpServer::new(IngestService::new(store, Arc::new(SystemClock)));
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    tracing::info!("hunkwise MCP server stopped");
    Ok(())
}
