//! LSP Bridge MCP Server - Entry Point
//!
//! Sets up logging, parses arguments, starts the language server and serves
//! MCP over stdio until the client disconnects.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use lsp_bridge::config::Cli;
use lsp_bridge::lsp::LspClientBuilder;
use lsp_bridge::mcp::LspBridge;

/// Initializes the tracing subscriber. Logs go to stderr; stdout carries MCP.
fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_filter()?)?;

    let config = cli.client_config()?;
    info!(
        workspace = %config.workspace_root.display(),
        language_server = %config.server_command,
        "starting lsp-bridge"
    );

    let client = LspClientBuilder::from_config(config)
        .build()
        .await
        .context("failed to start language server")?;
    let client = Arc::new(client);
    info!(
        server = client.capabilities().server_name.as_deref().unwrap_or("unknown"),
        "language server initialized"
    );

    let served = async {
        let service = LspBridge::new(client.clone())
            .serve(stdio())
            .await
            .context("failed to start MCP server")?;
        info!("MCP server started, waiting for messages");
        service.waiting().await?;
        anyhow::Ok(())
    }
    .await;

    let outcome = client.close().await;
    if outcome.was_forced() {
        warn!(?outcome, "language server did not shut down cleanly");
    } else {
        info!(?outcome, "language server stopped");
    }

    served
}
