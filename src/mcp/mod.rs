//! MCP (Model Context Protocol) server module.
//!
//! Exposes a running language server client as MCP tools over stdio.
//!
//! # Architecture
//!
//! - `server`: [`LspBridge`], the tool router and server handler
//! - `tools`: parameter types for every tool
//! - `format`: plain-text rendering of runtime results
//! - `edit`: line-based file edits
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use lsp_bridge::{lsp::LspClient, mcp::LspBridge};
//! use rmcp::{ServiceExt, transport::stdio};
//!
//! let client = Arc::new(LspClient::builder().server_command("gopls").build().await?);
//! LspBridge::new(client).serve(stdio()).await?.waiting().await?;
//! ```

pub mod edit;
pub mod format;
pub mod server;
pub mod tools;

pub use server::LspBridge;
