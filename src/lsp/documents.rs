//! Document synchronization.
//!
//! Every file-addressing request goes through [`DocumentSync::open_file`]
//! first, so the server always knows a document before it is asked about it.
//! Per file the state moves `Unopened -> Open -> Closed`; a closed document
//! is only brought back through an explicit [`DocumentSync::reopen_file`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lsp_types::notification::{DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument};
use lsp_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem, Url,
    VersionedTextDocumentIdentifier,
};
use tracing::{debug, warn};

use super::rpc::RpcEngine;
use super::{LspResult, lock};
use crate::error::LspError;

/// A document the server currently has open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDocument {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// `file://` URI sent to the server.
    pub uri: Url,
    /// Language id sent in `didOpen`.
    pub language_id: String,
    /// Starts at 1, bumped by every change.
    pub version: i32,
    /// Text as last synced.
    pub content: String,
}

#[derive(Debug)]
enum DocumentState {
    Open(OpenDocument),
    Closed,
}

/// Owner of the open-document table.
#[derive(Debug)]
pub struct DocumentSync {
    rpc: Arc<RpcEngine>,
    table: Mutex<HashMap<PathBuf, DocumentState>>,
    // Serializes transitions; the table lock itself is never held across an await.
    transitions: tokio::sync::Mutex<()>,
}

/// Lookup result that does not borrow the table.
enum Existing {
    Unopened,
    Open(Url),
    Closed,
}

impl DocumentSync {
    /// Creates a tracker sending notifications through `rpc`.
    pub fn new(rpc: Arc<RpcEngine>) -> Self {
        Self {
            rpc,
            table: Mutex::new(HashMap::new()),
            transitions: tokio::sync::Mutex::new(()),
        }
    }

    /// Makes sure the server has `path` open and returns its URI.
    ///
    /// A no-op for documents that are already open. The first open reads
    /// the file from disk and sends `didOpen` with version 1.
    ///
    /// # Errors
    ///
    /// - [`LspError::DocumentNotFound`] if the file cannot be read
    /// - [`LspError::DocumentClosed`] if the document was closed before
    pub async fn open_file(&self, path: &Path) -> LspResult<Url> {
        let path = canonical(path).await?;
        let _transition = self.transitions.lock().await;

        match self.existing(&path) {
            Existing::Open(uri) => Ok(uri),
            Existing::Closed => Err(LspError::DocumentClosed(path.display().to_string())),
            Existing::Unopened => self.send_open(path).await,
        }
    }

    /// Opens `path` again after it was closed, starting over at version 1.
    ///
    /// Behaves like [`open_file`](Self::open_file) for documents that are
    /// unopened or still open.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::DocumentNotFound`] if the file cannot be read.
    pub async fn reopen_file(&self, path: &Path) -> LspResult<Url> {
        let path = canonical(path).await?;
        let _transition = self.transitions.lock().await;

        match self.existing(&path) {
            Existing::Open(uri) => Ok(uri),
            Existing::Closed | Existing::Unopened => self.send_open(path).await,
        }
    }

    /// Replaces the full text of an open document and bumps its version.
    ///
    /// Returns the new version.
    ///
    /// # Errors
    ///
    /// Fails if the document is not open, or if the notification cannot be
    /// sent.
    pub async fn change_file(&self, path: &Path, content: String) -> LspResult<i32> {
        let path = canonical(path).await?;
        let _transition = self.transitions.lock().await;

        let (uri, version) = match lock(&self.table).get(&path) {
            Some(DocumentState::Open(doc)) => (doc.uri.clone(), doc.version + 1),
            Some(DocumentState::Closed) => {
                return Err(LspError::DocumentClosed(path.display().to_string()));
            }
            None => {
                return Err(LspError::DocumentNotFound(format!(
                    "{} is not open",
                    path.display()
                )));
            }
        };

        self.rpc
            .notify_typed::<DidChangeTextDocument>(DidChangeTextDocumentParams {
                text_document: VersionedTextDocumentIdentifier {
                    uri: uri.clone(),
                    version,
                },
                content_changes: vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: content.clone(),
                }],
            })
            .await?;

        if let Some(DocumentState::Open(doc)) = lock(&self.table).get_mut(&path) {
            doc.version = version;
            doc.content = content;
        }
        debug!(%uri, version, "document changed");
        Ok(version)
    }

    /// Closes `path`. Closing twice, or closing a never-opened file, does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if `didClose` cannot be sent. The document is
    /// considered closed either way.
    pub async fn close_file(&self, path: &Path) -> LspResult<()> {
        let path = canonical(path).await?;
        let _transition = self.transitions.lock().await;

        let uri = {
            let mut table = lock(&self.table);
            match table.get(&path) {
                Some(DocumentState::Open(doc)) => {
                    let uri = doc.uri.clone();
                    table.insert(path, DocumentState::Closed);
                    uri
                }
                Some(DocumentState::Closed) | None => return Ok(()),
            }
        };

        debug!(%uri, "closing document");
        self.send_close(uri).await
    }

    /// Closes every open document. Used during shutdown; send failures are
    /// logged and skipped. Returns how many documents were open.
    pub async fn close_all(&self) -> usize {
        let _transition = self.transitions.lock().await;

        let uris: Vec<Url> = {
            let mut table = lock(&self.table);
            table
                .values_mut()
                .filter_map(|state| match std::mem::replace(state, DocumentState::Closed) {
                    DocumentState::Open(doc) => Some(doc.uri),
                    DocumentState::Closed => None,
                })
                .collect()
        };

        for uri in &uris {
            if let Err(e) = self.send_close(uri.clone()).await {
                warn!(%uri, error = %e, "didClose failed during shutdown");
            }
        }
        uris.len()
    }

    /// Snapshot of an open document.
    pub fn document(&self, path: &Path) -> Option<OpenDocument> {
        let path = path.canonicalize().ok()?;
        match lock(&self.table).get(&path) {
            Some(DocumentState::Open(doc)) => Some(doc.clone()),
            _ => None,
        }
    }

    /// Snapshot of an open document by URI.
    pub fn document_by_uri(&self, uri: &Url) -> Option<OpenDocument> {
        lock(&self.table).values().find_map(|state| match state {
            DocumentState::Open(doc) if doc.uri == *uri => Some(doc.clone()),
            _ => None,
        })
    }

    /// Number of documents currently open.
    pub fn open_count(&self) -> usize {
        lock(&self.table)
            .values()
            .filter(|state| matches!(state, DocumentState::Open(_)))
            .count()
    }

    fn existing(&self, path: &Path) -> Existing {
        match lock(&self.table).get(path) {
            Some(DocumentState::Open(doc)) => Existing::Open(doc.uri.clone()),
            Some(DocumentState::Closed) => Existing::Closed,
            None => Existing::Unopened,
        }
    }

    /// Reads the file and sends `didOpen`. Caller holds the transition lock.
    async fn send_open(&self, path: PathBuf) -> LspResult<Url> {
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            LspError::DocumentNotFound(format!("failed to read '{}': {e}", path.display()))
        })?;
        let uri = Url::from_file_path(&path)
            .map_err(|()| LspError::DocumentNotFound(format!("invalid path: {}", path.display())))?;
        let language_id = language_id_for(&path).to_string();

        self.rpc
            .notify_typed::<DidOpenTextDocument>(DidOpenTextDocumentParams {
                text_document: TextDocumentItem {
                    uri: uri.clone(),
                    language_id: language_id.clone(),
                    version: 1,
                    text: content.clone(),
                },
            })
            .await?;

        debug!(%uri, language_id, "document opened");
        lock(&self.table).insert(
            path.clone(),
            DocumentState::Open(OpenDocument {
                path,
                uri: uri.clone(),
                language_id,
                version: 1,
                content,
            }),
        );
        Ok(uri)
    }

    async fn send_close(&self, uri: Url) -> LspResult<()> {
        self.rpc
            .notify_typed::<DidCloseTextDocument>(DidCloseTextDocumentParams {
                text_document: TextDocumentIdentifier { uri },
            })
            .await
    }
}

async fn canonical(path: &Path) -> LspResult<PathBuf> {
    tokio::fs::canonicalize(path).await.map_err(|e| {
        LspError::DocumentNotFound(format!("failed to resolve '{}': {e}", path.display()))
    })
}

/// LSP language identifier for a file, from its extension.
pub fn language_id_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return "plaintext";
    };
    match ext {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "go" => "go",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "java" => "java",
        "rb" => "ruby",
        "cs" => "csharp",
        "lua" => "lua",
        "sh" | "bash" => "shellscript",
        "json" => "json",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "md" => "markdown",
        _ => "plaintext",
    }
}
