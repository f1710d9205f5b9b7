//! Command-line configuration for the `lsp-bridge` binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::Level;

use crate::error::{Error, Result};
use crate::lsp::LspClientConfig;

/// MCP server exposing a language server's features as tools.
#[derive(Parser, Debug, Clone)]
#[command(name = "lsp-bridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace root directory.
    #[arg(short, long, default_value = ".")]
    pub workspace: PathBuf,

    /// Language server command to run, e.g. `gopls` or `rust-analyzer`.
    #[arg(short, long)]
    pub language_server: String,

    /// Argument passed to the language server; repeat for several.
    #[arg(long = "language-server-args", allow_hyphen_values = true)]
    pub language_server_args: Vec<String>,

    /// Log level: trace, debug, info, warn, error. `RUST_LOG` overrides it.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Seconds to wait for any single language server request.
    #[arg(long, default_value_t = 10)]
    pub request_timeout_secs: u64,
}

impl Cli {
    /// Parses the log level string into a tracing Level.
    pub fn parse_log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            other => Err(Error::Config(format!("invalid log level: {other}"))),
        }
    }

    /// Default filter directive used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> Result<String> {
        let level = self.parse_log_level()?;
        Ok(format!("lsp_bridge={level},rmcp={level}"))
    }

    /// Client configuration with a canonical workspace root.
    pub fn client_config(&self) -> Result<LspClientConfig> {
        if self.language_server.trim().is_empty() {
            return Err(Error::Config("language server command is empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request timeout must be at least one second".into(),
            ));
        }
        let workspace_root = self.workspace.canonicalize().map_err(|e| {
            Error::Config(format!(
                "failed to canonicalize workspace path {}: {e}",
                self.workspace.display()
            ))
        })?;

        Ok(LspClientConfig {
            server_command: self.language_server.clone(),
            server_args: self.language_server_args.clone(),
            workspace_root,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..LspClientConfig::default()
        })
    }
}
