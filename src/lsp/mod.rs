//! LSP client runtime.
//!
//! # Architecture
//!
//! - `transport`: the child process and its stdio pipes
//! - `codec`: Content-Length framing
//! - `protocol`: JSON-RPC message shapes
//! - `rpc`: request/response correlation and notification dispatch
//! - `capabilities`: what the server declared at `initialize`
//! - `documents`: `didOpen`/`didChange`/`didClose` bookkeeping
//! - `diagnostics`: pushed diagnostics per document
//! - `lifecycle`: start, ready and idempotent shutdown
//! - `client`: the [`LspClient`] facade tying it together
//! - `resolver`: symbol name to definition lookup
//! - `types`: coordinate and URI helpers
//!
//! # Usage
//!
//! ```ignore
//! use lsp_bridge::lsp::LspClient;
//!
//! let client = LspClient::builder()
//!     .server_command("gopls")
//!     .workspace_root("/path/to/project")
//!     .build()
//!     .await?;
//!
//! let uri = client.open_file(Path::new("/path/to/project/main.go")).await?;
//! let diagnostics = client.diagnostics(&uri);
//! client.close().await;
//! ```

pub mod capabilities;
pub mod client;
pub mod codec;
pub mod diagnostics;
pub mod documents;
pub mod lifecycle;
pub mod protocol;
pub mod resolver;
pub mod rpc;
pub mod transport;
pub mod types;

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::LspError;

/// Result type for LSP operations.
pub type LspResult<T> = std::result::Result<T, LspError>;

pub use capabilities::{Capability, CapabilitiesSnapshot};
pub use client::{LspClient, LspClientBuilder, LspClientConfig};
pub use diagnostics::DiagnosticsStore;
pub use documents::OpenDocument;
pub use lifecycle::{CloseOutcome, LifecycleState};
pub use resolver::{DefinitionLookup, ResolvedDefinition};
pub use types::{CodeActionEntry, UserPosition};

// A panic while holding one of these locks leaves plain data behind, never a
// half-applied transition, so poisoning is ignored.

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
