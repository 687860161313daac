//! SQL MCP Server entry point.
//!
//! Reads JSON-RPC requests from stdin and writes responses to stdout until
//! stdin is closed. Diagnostics go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use sql_mcp_server::config::Cli;
use sql_mcp_server::database::TdsDriver;
use sql_mcp_server::transport::serve_stdio;
use sql_mcp_server::{Config, SqlMcpServer};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for JSON-RPC)
    init_logging();

    let cli = Cli::parse();
    info!(
        "SQL MCP Server v{} starting (protocol {}, transport: stdio)",
        env!("CARGO_PKG_VERSION"),
        sql_mcp_server::constants::PROTOCOL_VERSION
    );

    std::panic::set_hook(Box::new(|info| {
        error!("panic: {}", info);
    }));

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            if let Some(hint) = e.suggestion() {
                error!("Hint: {}", hint);
            }
            return Err(e).context("failed to load configuration");
        }
    };
    info!("Configured databases: {:?}", config.registry);

    let server = SqlMcpServer::new(Arc::new(config), Arc::new(TdsDriver::new()));
    serve_stdio(&server).await.context("stdio transport failed")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with stderr output.
///
/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,sql_mcp_server=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
