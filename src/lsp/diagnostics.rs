//! Diagnostics store: latest `publishDiagnostics` set per document.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use lsp_types::{Diagnostic, PublishDiagnosticsParams, Url};
use tokio::sync::Notify;
use tracing::trace;

use super::{read, write};

/// Latest diagnostics per URI.
///
/// Each push replaces the previous set for its URI; nothing is merged and
/// no history is kept. Readers always get copies.
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    entries: RwLock<HashMap<Url, Vec<Diagnostic>>>,
    published: Notify,
}

impl DiagnosticsStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one `textDocument/publishDiagnostics` push.
    ///
    /// An empty set is stored as well: it means "known clean", which is
    /// different from "never reported".
    pub fn publish(&self, params: PublishDiagnosticsParams) {
        trace!(uri = %params.uri, count = params.diagnostics.len(), "diagnostics published");
        write(&self.entries).insert(params.uri, params.diagnostics);
        self.published.notify_waiters();
    }

    /// Current diagnostics for `uri`, empty if the server never reported any.
    pub fn get(&self, uri: &Url) -> Vec<Diagnostic> {
        read(&self.entries).get(uri).cloned().unwrap_or_default()
    }

    /// Returns true if at least one push arrived for `uri`.
    pub fn has_report(&self, uri: &Url) -> bool {
        read(&self.entries).contains_key(uri)
    }

    /// Copy of every entry.
    pub fn all(&self) -> HashMap<Url, Vec<Diagnostic>> {
        read(&self.entries).clone()
    }

    /// Waits up to `timeout` for the first push for `uri`.
    ///
    /// Returns `None` if nothing arrived in time. Returns immediately when a
    /// report already exists, even a stale one.
    pub async fn wait_for(&self, uri: &Url, timeout: Duration) -> Option<Vec<Diagnostic>> {
        let wait = async {
            loop {
                let notified = self.published.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let current = read(&self.entries).get(uri).cloned();
                if let Some(diagnostics) = current {
                    return diagnostics;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }
}
