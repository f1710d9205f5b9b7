//! LSP Bridge
//!
//! A client runtime for the Language Server Protocol, plus an MCP server
//! that exposes whatever the language server supports as tools for LLM
//! applications.
//!
//! # Overview
//!
//! This library provides:
//! - A client runtime that spawns a language server, speaks framed JSON-RPC
//!   over its stdio, and keeps documents, diagnostics and capabilities in
//!   sync
//! - Name-based symbol resolution on top of `workspace/symbol`
//! - An MCP server with stdio transport rendering results as plain text
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     stdio      ┌─────────────────┐
//! │   LLM Client    │◄──────────────►│   MCP Server    │
//! │                 │    (MCP)       │   (LspBridge)   │
//! └─────────────────┘                └────────┬────────┘
//!                                             │
//!                                      ┌──────▼──────┐
//!                                      │  LspClient  │
//!                                      └──────┬──────┘
//!                                             │ JSON-RPC over stdio
//!                                      ┌──────▼──────┐
//!                                      │  Language   │
//!                                      │   Server    │
//!                                      └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`error`] - Error types for the entire application
//! - [`config`] - Command-line configuration
//! - [`lsp`] - LSP client runtime
//! - [`mcp`] - MCP server implementation
//!
//! # Example
//!
//! ```ignore
//! use lsp_bridge::lsp::LspClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = LspClient::builder()
//!         .server_command("rust-analyzer")
//!         .workspace_root(".")
//!         .build()
//!         .await?;
//!
//!     let uri = client.open_file("src/main.rs".as_ref()).await?;
//!     println!("{:?}", client.diagnostics(&uri));
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are too strict
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod lsp;
pub mod mcp;

// Re-export commonly used types at the crate root
pub use error::{Error, Result};
