//! Daemon entry point for the zentickr MCP server.
//!
//! Loads configuration from the environment, builds the Yahoo Finance provider
//! and request handler, and serves MCP over stdio and/or streamable HTTP.

mod config;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use zentickr_core::{RequestHandler, ToolCatalog};
use zentickr_mcp::server::{serve_stdio, serve_streamable_http};
use zentickr_yahoo::YahooProvider;

use crate::config::ZentickrConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing() {
    // stdout carries the stdio transport; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_tracing();
    let config = ZentickrConfig::from_args()?;

    let provider = YahooProvider::new(config.yahoo())?;
    if config.provider_warmup {
        if let Err(err) = provider.warm_up().await {
            error!(error = %err, "yahoo warm-up failed");
            return Err(err.into());
        }
        info!("yahoo session ready");
    }

    let handler = Arc::new(
        RequestHandler::new(Arc::new(ToolCatalog::standard()), Arc::new(provider))
            .with_timeout(config.provider_timeout),
    );
    info!(
        tools = handler.catalog().len(),
        stdio = config.enable_stdio,
        http = config.mcp_serve,
        "zentickr starting"
    );

    match (config.enable_stdio, config.mcp_serve) {
        (true, true) => {
            // Whichever transport finishes first ends the process.
            tokio::select! {
                result = serve_stdio(handler.clone()) => result?,
                result = serve_streamable_http(handler, config.http()) => result?,
            }
        }
        (true, false) => serve_stdio(handler).await?,
        (false, _) => serve_streamable_http(handler, config.http()).await?,
    }
    Ok(())
}
