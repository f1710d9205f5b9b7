//! Common test helpers and utilities.

#![allow(dead_code)]

pub mod temp_workspace;

use std::path::Path;
use std::time::Duration;

use lsp_bridge::lsp::{LspClient, LspClientBuilder};
use lsp_types::Url;
use serde_json::{Value, json};

// Re-export for convenience
pub use temp_workspace::TestWorkspace;

/// Path of the mock language server built alongside the tests.
pub fn mockls() -> &'static str {
    env!("CARGO_BIN_EXE_mockls")
}

/// Builder preconfigured for `mockls` with short test timeouts.
pub fn mockls_builder(root: &Path, args: &[&str]) -> LspClientBuilder {
    LspClient::builder()
        .server_command(mockls())
        .server_args(args.iter().copied())
        .workspace_root(root)
        .init_timeout(Duration::from_secs(10))
        .request_timeout(Duration::from_secs(5))
}

/// Starts an initialized `mockls` client rooted at `root`.
pub async fn spawn_mockls(root: &Path, args: &[&str]) -> LspClient {
    mockls_builder(root, args)
        .build()
        .await
        .expect("failed to start mockls")
}

/// `file://` URI of an absolute path.
pub fn uri(path: &Path) -> Url {
    Url::from_file_path(path).expect("absolute path")
}

/// Asks `mockls` what it knows about a document.
pub async fn document_state(client: &LspClient, path: &Path) -> Value {
    client
        .call("mockls/documentState", json!({ "uri": uri(path) }))
        .await
        .expect("documentState failed")
}

/// Polls `check` every 20ms until it returns true or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// A `Location` JSON value, 0-indexed.
pub fn location(uri: &Url, start: (u32, u32), end: (u32, u32)) -> Value {
    json!({
        "uri": uri,
        "range": {
            "start": { "line": start.0, "character": start.1 },
            "end": { "line": end.0, "character": end.1 }
        }
    })
}

/// A flat `SymbolInformation` JSON value.
pub fn symbol_information(
    name: &str,
    kind: u32,
    container: Option<&str>,
    uri: &Url,
    start: (u32, u32),
    end: (u32, u32),
) -> Value {
    let mut symbol = json!({
        "name": name,
        "kind": kind,
        "location": location(uri, start, end)
    });
    if let Some(container) = container {
        symbol["containerName"] = json!(container);
    }
    symbol
}

/// Key used by `mockls` fixtures for position-based answers.
pub fn position_key(uri: &Url, line: u32, character: u32) -> String {
    format!("{uri}:{line}:{character}")
}
