//! LSP client facade.
//!
//! [`LspClient`] wires the runtime together: it spawns the server, runs the
//! `initialize` handshake, routes pushed diagnostics into the store, and
//! exposes the raw `call`/`notify` surface plus typed helpers for the
//! requests the tool layer needs.
//!
//! # Example
//!
//! ```ignore
//! use lsp_bridge::lsp::LspClient;
//! use lsp_types::Position;
//! use std::path::Path;
//!
//! let client = LspClient::builder()
//!     .server_command("gopls")
//!     .workspace_root("/path/to/project")
//!     .build()
//!     .await?;
//!
//! let locations = client
//!     .definition(Path::new("/path/to/project/main.go"), Position::new(9, 4))
//!     .await?;
//! client.close().await;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lsp_types::notification::{Initialized, Notification};
use lsp_types::request::{
    CallHierarchyIncomingCalls, CallHierarchyOutgoingCalls, CallHierarchyPrepare,
    CodeLensRequest, CodeLensResolve, Completion, DocumentSymbolRequest, ExecuteCommand,
    GotoDefinition, HoverRequest, References, Rename, Request, SignatureHelpRequest,
    WorkspaceSymbolRequest,
};
use lsp_types::{
    CallHierarchyIncomingCall, CallHierarchyIncomingCallsParams, CallHierarchyItem,
    CallHierarchyOutgoingCall, CallHierarchyOutgoingCallsParams, CallHierarchyPrepareParams,
    ClientCapabilities, ClientInfo, CodeActionClientCapabilities, CodeActionContext,
    CodeActionParams, CodeLens, CodeLensParams, Command, CompletionClientCapabilities,
    CompletionItemCapability, CompletionParams, CompletionResponse, Diagnostic,
    DocumentSymbolClientCapabilities, DocumentSymbolParams, DocumentSymbolResponse,
    DynamicRegistrationClientCapabilities, ExecuteCommandParams, GotoCapability,
    GotoDefinitionParams, Hover, HoverClientCapabilities, HoverParams, InitializeParams,
    InitializedParams, Location, LogMessageParams, MarkupKind, MessageType, PartialResultParams,
    Position, PublishDiagnosticsClientCapabilities, PublishDiagnosticsParams, Range,
    ReferenceContext, ReferenceParams, RenameClientCapabilities, RenameParams, SignatureHelp,
    SignatureHelpClientCapabilities, SignatureHelpParams, TextDocumentClientCapabilities,
    TextDocumentIdentifier, TextDocumentPositionParams, TextDocumentSyncClientCapabilities,
    TraceValue, Url, WindowClientCapabilities, WorkDoneProgressParams, WorkspaceClientCapabilities,
    WorkspaceEdit, WorkspaceEditClientCapabilities, WorkspaceFolder,
    WorkspaceSymbolClientCapabilities, WorkspaceSymbolParams, WorkspaceSymbolResponse,
};
use serde_json::Value;
use tracing::{Span, debug, error, info, trace, warn};

use super::LspResult;
use super::capabilities::CapabilitiesSnapshot;
use super::diagnostics::DiagnosticsStore;
use super::documents::{DocumentSync, OpenDocument};
use super::lifecycle::{CloseOutcome, Lifecycle, LifecycleState};
use super::rpc::RpcEngine;
use super::transport::Transport;
use super::types::{CodeActionEntry, normalize_definition, path_to_url};
use crate::error::LspError;

/// Configuration for building an LSP client.
#[derive(Debug, Clone)]
pub struct LspClientConfig {
    /// Command to start the language server.
    pub server_command: String,
    /// Arguments to pass to the language server.
    pub server_args: Vec<String>,
    /// Root directory of the workspace.
    pub workspace_root: PathBuf,
    /// Timeout for the `initialize` request.
    pub init_timeout: Duration,
    /// Timeout for every other request.
    pub request_timeout: Duration,
    /// How long `close` waits for the server to exit before killing it.
    pub shutdown_grace: Duration,
    /// Span the client logs under. Defaults to `lsp_client{server=...}`.
    pub span: Option<Span>,
}

impl Default for LspClientConfig {
    fn default() -> Self {
        Self {
            server_command: String::new(),
            server_args: Vec::new(),
            workspace_root: PathBuf::from("."),
            init_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(2),
            span: None,
        }
    }
}

/// Builder for constructing an LSP client.
#[derive(Debug, Default)]
pub struct LspClientBuilder {
    config: LspClientConfig,
}

impl LspClientBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn from_config(config: LspClientConfig) -> Self {
        Self { config }
    }

    /// Sets the server command.
    #[must_use]
    pub fn server_command(mut self, command: impl Into<String>) -> Self {
        self.config.server_command = command.into();
        self
    }

    /// Sets the server arguments.
    #[must_use]
    pub fn server_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.server_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the workspace root.
    #[must_use]
    pub fn workspace_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = path.into();
        self
    }

    /// Sets the initialization timeout.
    #[must_use]
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// Sets the span every event of this client is recorded under.
    #[must_use]
    pub fn span(mut self, span: Span) -> Self {
        self.config.span = Some(span);
        self
    }

    /// Spawns the server without running the handshake.
    ///
    /// The client starts in [`LifecycleState::Starting`]. Must be called
    /// from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if the workspace root does not exist or the process cannot be
    /// spawned.
    pub fn spawn(self) -> LspResult<LspClient> {
        let config = self.config;
        let workspace_root = config.workspace_root.canonicalize().map_err(|e| {
            LspError::InitializationFailed(format!(
                "failed to canonicalize workspace root '{}': {e}",
                config.workspace_root.display()
            ))
        })?;
        let span = config.span.clone().unwrap_or_else(
            || tracing::info_span!("lsp_client", server = %config.server_command),
        );

        let transport = Transport::spawn(
            &config.server_command,
            &config.server_args,
            &workspace_root,
            &span,
        )?;

        let rpc = Arc::new(RpcEngine::new(transport.stdin, config.request_timeout));
        let diagnostics = Arc::new(DiagnosticsStore::new());
        register_default_handlers(&rpc, &diagnostics);

        let documents = Arc::new(DocumentSync::new(rpc.clone()));
        let lifecycle = Arc::new(Lifecycle::new(
            transport.child,
            rpc.clone(),
            documents.clone(),
            config.shutdown_grace,
            span.clone(),
        ));
        lifecycle.track(transport.stderr_pump);
        lifecycle.spawn_read_loop(transport.stdout);

        Ok(LspClient {
            config,
            workspace_root,
            rpc,
            documents,
            diagnostics,
            capabilities: CapabilitiesSnapshot::default(),
            lifecycle,
            span,
        })
    }

    /// Spawns the server and performs the `initialize` handshake.
    ///
    /// On handshake failure the process is shut down before returning.
    ///
    /// # Errors
    ///
    /// Fails if spawning or initialization fails.
    pub async fn build(self) -> LspResult<LspClient> {
        let mut client = self.spawn()?;
        if let Err(e) = client.initialize().await {
            error!(parent: &client.span, error = %e, "initialization failed");
            client.close().await;
            return Err(e);
        }
        Ok(client)
    }
}

fn register_default_handlers(rpc: &RpcEngine, diagnostics: &Arc<DiagnosticsStore>) {
    let store = diagnostics.clone();
    rpc.on_notification(
        lsp_types::notification::PublishDiagnostics::METHOD,
        move |params| match serde_json::from_value::<PublishDiagnosticsParams>(params) {
            Ok(params) => store.publish(params),
            Err(e) => warn!(error = %e, "malformed publishDiagnostics"),
        },
    );

    for method in [
        lsp_types::notification::LogMessage::METHOD,
        lsp_types::notification::ShowMessage::METHOD,
    ] {
        // ShowMessageParams has the same shape as LogMessageParams.
        rpc.on_notification(method, move |params| {
            match serde_json::from_value::<LogMessageParams>(params) {
                Ok(LogMessageParams { typ, message }) => log_server_message(method, typ, &message),
                Err(e) => debug!(method, error = %e, "malformed message notification"),
            }
        });
    }

    rpc.on_notification(lsp_types::notification::Progress::METHOD, |params| {
        trace!(%params, "progress");
    });
}

fn log_server_message(method: &str, typ: MessageType, message: &str) {
    match typ {
        MessageType::ERROR => error!(method, "{message}"),
        MessageType::WARNING => warn!(method, "{message}"),
        MessageType::INFO => info!(method, "{message}"),
        _ => debug!(method, "{message}"),
    }
}

/// LSP client for communicating with a language server.
///
/// All methods take `&self` and may be called concurrently; share the client
/// behind an `Arc`.
pub struct LspClient {
    config: LspClientConfig,
    workspace_root: PathBuf,
    rpc: Arc<RpcEngine>,
    documents: Arc<DocumentSync>,
    diagnostics: Arc<DiagnosticsStore>,
    capabilities: CapabilitiesSnapshot,
    lifecycle: Arc<Lifecycle>,
    span: Span,
}

impl std::fmt::Debug for LspClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LspClient")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl LspClient {
    /// Creates a new builder for constructing an LSP client.
    pub fn builder() -> LspClientBuilder {
        LspClientBuilder::new()
    }

    /// Runs the `initialize` handshake and moves the client to `Ready`.
    ///
    /// # Errors
    ///
    /// - [`LspError::Timeout`] if the server does not answer in time
    /// - [`LspError::InitializationFailed`] for any other failure
    pub async fn initialize(&mut self) -> LspResult<()> {
        let params = serde_json::to_value(self.initialize_params()?)
            .map_err(|e| LspError::InitializationFailed(e.to_string()))?;

        let result = self
            .rpc
            .call_with_timeout("initialize", params, self.config.init_timeout)
            .await
            .map_err(|e| match e {
                LspError::Timeout(_) => e,
                other => LspError::InitializationFailed(format!("initialize request failed: {other}")),
            })?;
        self.capabilities = CapabilitiesSnapshot::from_initialize_result(&result);

        self.rpc
            .notify_typed::<Initialized>(InitializedParams {})
            .await
            .map_err(|e| {
                LspError::InitializationFailed(format!("initialized notification failed: {e}"))
            })?;

        if !self.lifecycle.mark_ready() {
            return Err(LspError::InitializationFailed(
                "client was closed during initialization".to_string(),
            ));
        }
        info!(
            parent: &self.span,
            server = self.capabilities.server_name.as_deref().unwrap_or("unknown"),
            version = self.capabilities.server_version.as_deref().unwrap_or("unknown"),
            "language server ready"
        );
        Ok(())
    }

    fn initialize_params(&self) -> LspResult<InitializeParams> {
        let workspace_uri = path_to_url(&self.workspace_root)?;
        let dynamic_off = Some(DynamicRegistrationClientCapabilities {
            dynamic_registration: Some(false),
        });

        Ok(InitializeParams {
            process_id: Some(std::process::id()),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: workspace_uri,
                name: self
                    .workspace_root
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("workspace")
                    .to_string(),
            }]),
            initialization_options: None,
            capabilities: ClientCapabilities {
                workspace: Some(WorkspaceClientCapabilities {
                    configuration: Some(true),
                    workspace_folders: Some(true),
                    did_change_configuration: dynamic_off.clone(),
                    execute_command: dynamic_off.clone(),
                    workspace_edit: Some(WorkspaceEditClientCapabilities {
                        document_changes: Some(true),
                        ..Default::default()
                    }),
                    symbol: Some(WorkspaceSymbolClientCapabilities {
                        dynamic_registration: Some(false),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                text_document: Some(TextDocumentClientCapabilities {
                    synchronization: Some(TextDocumentSyncClientCapabilities {
                        dynamic_registration: Some(false),
                        will_save: Some(false),
                        will_save_wait_until: Some(false),
                        did_save: Some(false),
                    }),
                    completion: Some(CompletionClientCapabilities {
                        dynamic_registration: Some(false),
                        completion_item: Some(CompletionItemCapability {
                            snippet_support: Some(false),
                            documentation_format: Some(vec![
                                MarkupKind::Markdown,
                                MarkupKind::PlainText,
                            ]),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    hover: Some(HoverClientCapabilities {
                        dynamic_registration: Some(false),
                        content_format: Some(vec![MarkupKind::Markdown, MarkupKind::PlainText]),
                    }),
                    signature_help: Some(SignatureHelpClientCapabilities {
                        dynamic_registration: Some(false),
                        ..Default::default()
                    }),
                    definition: Some(GotoCapability {
                        dynamic_registration: Some(false),
                        link_support: Some(true),
                    }),
                    references: dynamic_off.clone(),
                    document_symbol: Some(DocumentSymbolClientCapabilities {
                        dynamic_registration: Some(false),
                        hierarchical_document_symbol_support: Some(true),
                        ..Default::default()
                    }),
                    code_action: Some(CodeActionClientCapabilities {
                        dynamic_registration: Some(false),
                        ..Default::default()
                    }),
                    rename: Some(RenameClientCapabilities {
                        dynamic_registration: Some(false),
                        prepare_support: Some(true),
                        ..Default::default()
                    }),
                    publish_diagnostics: Some(PublishDiagnosticsClientCapabilities {
                        related_information: Some(true),
                        version_support: Some(true),
                        ..Default::default()
                    }),
                    code_lens: dynamic_off.clone(),
                    call_hierarchy: dynamic_off,
                    ..Default::default()
                }),
                window: Some(WindowClientCapabilities {
                    work_done_progress: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
            trace: Some(TraceValue::Off),
            client_info: Some(ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            locale: None,
            work_done_progress_params: WorkDoneProgressParams::default(),
            ..Default::default()
        })
    }

    /// The canonical workspace root.
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// What the server declared at `initialize`. All features read as absent
    /// before the handshake.
    pub fn capabilities(&self) -> &CapabilitiesSnapshot {
        &self.capabilities
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Ready and still connected.
    pub fn is_alive(&self) -> bool {
        self.state() == LifecycleState::Ready && !self.rpc.is_closed()
    }

    /// The span this client logs under.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Shuts the server down. Idempotent; concurrent callers share one
    /// teardown and all receive its outcome.
    pub async fn close(&self) -> CloseOutcome {
        let outcome = self.lifecycle.close().await;
        if let Some(warning) = outcome.warning() {
            warn!(parent: &self.span, "{warning}");
        }
        outcome
    }

    // Raw RPC surface

    /// Sends a request with raw JSON params.
    ///
    /// # Errors
    ///
    /// See [`RpcEngine::call`].
    pub async fn call(&self, method: &str, params: Value) -> LspResult<Value> {
        self.rpc.call(method, params).await
    }

    /// Sends a typed request.
    ///
    /// # Errors
    ///
    /// See [`RpcEngine::request`].
    pub async fn request<R: Request>(&self, params: R::Params) -> LspResult<R::Result> {
        self.rpc.request::<R>(params).await
    }

    /// Sends a notification with raw JSON params.
    ///
    /// # Errors
    ///
    /// See [`RpcEngine::notify`].
    pub async fn notify(&self, method: &str, params: Value) -> LspResult<()> {
        self.rpc.notify(method, params).await
    }

    /// Sends a typed notification.
    ///
    /// # Errors
    ///
    /// See [`RpcEngine::notify`].
    pub async fn notify_typed<N: Notification>(&self, params: N::Params) -> LspResult<()> {
        self.rpc.notify_typed::<N>(params).await
    }

    /// Registers an additional notification handler.
    pub fn on_notification<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.rpc.on_notification(method, handler);
    }

    // Documents

    /// Opens `path` on the server if needed and returns its URI.
    ///
    /// # Errors
    ///
    /// See [`DocumentSync::open_file`].
    pub async fn open_file(&self, path: &Path) -> LspResult<Url> {
        self.documents.open_file(path).await
    }

    /// Opens a previously closed document again.
    ///
    /// # Errors
    ///
    /// See [`DocumentSync::reopen_file`].
    pub async fn reopen_file(&self, path: &Path) -> LspResult<Url> {
        self.documents.reopen_file(path).await
    }

    /// Sends new full content for an open document.
    ///
    /// # Errors
    ///
    /// See [`DocumentSync::change_file`].
    pub async fn change_file(&self, path: &Path, content: String) -> LspResult<i32> {
        self.documents.change_file(path, content).await
    }

    /// Closes a document.
    ///
    /// # Errors
    ///
    /// See [`DocumentSync::close_file`].
    pub async fn close_file(&self, path: &Path) -> LspResult<()> {
        self.documents.close_file(path).await
    }

    /// Snapshot of an open document.
    pub fn document(&self, path: &Path) -> Option<OpenDocument> {
        self.documents.document(path)
    }

    /// Snapshot of an open document by URI.
    pub fn document_by_uri(&self, uri: &Url) -> Option<OpenDocument> {
        self.documents.document_by_uri(uri)
    }

    // Diagnostics

    /// Latest diagnostics pushed for `uri`; empty if none arrived yet.
    pub fn diagnostics(&self, uri: &Url) -> Vec<Diagnostic> {
        self.diagnostics.get(uri)
    }

    /// Every diagnostics entry received so far.
    pub fn all_diagnostics(&self) -> HashMap<Url, Vec<Diagnostic>> {
        self.diagnostics.all()
    }

    /// Waits up to `timeout` for the first diagnostics push for `uri`.
    pub async fn wait_for_diagnostics(
        &self,
        uri: &Url,
        timeout: Duration,
    ) -> Option<Vec<Diagnostic>> {
        self.diagnostics.wait_for(uri, timeout).await
    }

    // Typed requests. Positions are 0-indexed protocol positions; every
    // file-addressing helper opens the file first.

    async fn position_params(
        &self,
        path: &Path,
        position: Position,
    ) -> LspResult<TextDocumentPositionParams> {
        let uri = self.open_file(path).await?;
        Ok(TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri },
            position,
        })
    }

    /// Definition locations for the symbol at `position`, links flattened.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn definition(&self, path: &Path, position: Position) -> LspResult<Vec<Location>> {
        let params = GotoDefinitionParams {
            text_document_position_params: self.position_params(path, position).await?,
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        Ok(normalize_definition(
            self.request::<GotoDefinition>(params).await?,
        ))
    }

    /// References to the symbol at `position`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn references(
        &self,
        path: &Path,
        position: Position,
        include_declaration: bool,
    ) -> LspResult<Vec<Location>> {
        let params = ReferenceParams {
            text_document_position: self.position_params(path, position).await?,
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
            context: ReferenceContext {
                include_declaration,
            },
        };
        Ok(self.request::<References>(params).await?.unwrap_or_default())
    }

    /// Hover information at `position`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn hover(&self, path: &Path, position: Position) -> LspResult<Option<Hover>> {
        let params = HoverParams {
            text_document_position_params: self.position_params(path, position).await?,
            work_done_progress_params: WorkDoneProgressParams::default(),
        };
        self.request::<HoverRequest>(params).await
    }

    /// All symbols in a document.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn document_symbols(&self, path: &Path) -> LspResult<Option<DocumentSymbolResponse>> {
        let uri = self.open_file(path).await?;
        let params = DocumentSymbolParams {
            text_document: TextDocumentIdentifier { uri },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        self.request::<DocumentSymbolRequest>(params).await
    }

    /// Workspace-wide symbol search.
    ///
    /// # Errors
    ///
    /// Fails if the request fails.
    pub async fn workspace_symbols(&self, query: &str) -> LspResult<Option<WorkspaceSymbolResponse>> {
        let params = WorkspaceSymbolParams {
            query: query.to_string(),
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        self.request::<WorkspaceSymbolRequest>(params).await
    }

    /// Call hierarchy items at `position`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn prepare_call_hierarchy(
        &self,
        path: &Path,
        position: Position,
    ) -> LspResult<Vec<CallHierarchyItem>> {
        let params = CallHierarchyPrepareParams {
            text_document_position_params: self.position_params(path, position).await?,
            work_done_progress_params: WorkDoneProgressParams::default(),
        };
        Ok(self
            .request::<CallHierarchyPrepare>(params)
            .await?
            .unwrap_or_default())
    }

    /// Callers of a prepared item.
    ///
    /// # Errors
    ///
    /// Fails if the request fails.
    pub async fn incoming_calls(
        &self,
        item: CallHierarchyItem,
    ) -> LspResult<Vec<CallHierarchyIncomingCall>> {
        let params = CallHierarchyIncomingCallsParams {
            item,
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        Ok(self
            .request::<CallHierarchyIncomingCalls>(params)
            .await?
            .unwrap_or_default())
    }

    /// Callees of a prepared item.
    ///
    /// # Errors
    ///
    /// Fails if the request fails.
    pub async fn outgoing_calls(
        &self,
        item: CallHierarchyItem,
    ) -> LspResult<Vec<CallHierarchyOutgoingCall>> {
        let params = CallHierarchyOutgoingCallsParams {
            item,
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        Ok(self
            .request::<CallHierarchyOutgoingCalls>(params)
            .await?
            .unwrap_or_default())
    }

    /// Completion candidates at `position`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn completion(
        &self,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<CompletionResponse>> {
        let params = CompletionParams {
            text_document_position: self.position_params(path, position).await?,
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
            context: None,
        };
        self.request::<Completion>(params).await
    }

    /// Signature help at `position`.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn signature_help(
        &self,
        path: &Path,
        position: Position,
    ) -> LspResult<Option<SignatureHelp>> {
        let params = SignatureHelpParams {
            context: None,
            text_document_position_params: self.position_params(path, position).await?,
            work_done_progress_params: WorkDoneProgressParams::default(),
        };
        self.request::<SignatureHelpRequest>(params).await
    }

    /// Code actions for `range`, offering the stored diagnostics of the file
    /// as context.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn code_actions(&self, path: &Path, range: Range) -> LspResult<Vec<CodeActionEntry>> {
        let uri = self.open_file(path).await?;
        let diagnostics = self.diagnostics(&uri);
        let params = CodeActionParams {
            text_document: TextDocumentIdentifier { uri },
            range,
            context: CodeActionContext {
                diagnostics,
                only: None,
                trigger_kind: None,
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        let params = serde_json::to_value(params).map_err(|e| LspError::ParseError {
            method: "textDocument/codeAction".to_string(),
            reason: e.to_string(),
        })?;
        let response = self.call("textDocument/codeAction", params).await?;
        Ok(CodeActionEntry::decode_all(response))
    }

    /// Asks the server to rename the symbol at `position` to `new_name`.
    ///
    /// The returned edit is not applied; that is up to the caller.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn rename(
        &self,
        path: &Path,
        position: Position,
        new_name: &str,
    ) -> LspResult<Option<WorkspaceEdit>> {
        let params = RenameParams {
            text_document_position: self.position_params(path, position).await?,
            new_name: new_name.to_string(),
            work_done_progress_params: WorkDoneProgressParams::default(),
        };
        self.request::<Rename>(params).await
    }

    /// Code lenses of a file, unresolved as the server sent them.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or the request fails.
    pub async fn code_lens(&self, path: &Path) -> LspResult<Vec<CodeLens>> {
        let uri = self.open_file(path).await?;
        let params = CodeLensParams {
            text_document: TextDocumentIdentifier { uri },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        Ok(self
            .request::<CodeLensRequest>(params)
            .await?
            .unwrap_or_default())
    }

    /// Fills in the command of a lens sent without one.
    ///
    /// # Errors
    ///
    /// Fails if the request fails.
    pub async fn resolve_code_lens(&self, lens: CodeLens) -> LspResult<CodeLens> {
        self.request::<CodeLensResolve>(lens).await
    }

    /// Runs `workspace/executeCommand` for `command`.
    ///
    /// # Errors
    ///
    /// Fails if the request fails.
    pub async fn execute_command(&self, command: Command) -> LspResult<Option<Value>> {
        let params = ExecuteCommandParams {
            command: command.command,
            arguments: command.arguments.unwrap_or_default(),
            work_done_progress_params: WorkDoneProgressParams::default(),
        };
        self.request::<ExecuteCommand>(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_default() {
        let builder = LspClientBuilder::new();
        assert_eq!(builder.config.init_timeout, Duration::from_secs(30));
        assert_eq!(builder.config.request_timeout, Duration::from_secs(10));
        assert_eq!(builder.config.shutdown_grace, Duration::from_secs(2));
        assert!(builder.config.span.is_none());
    }

    #[test]
    fn test_builder_configuration() {
        let builder = LspClientBuilder::new()
            .server_command("pylsp")
            .server_args(["--verbose"])
            .workspace_root("/home/user/project")
            .init_timeout(Duration::from_secs(60))
            .shutdown_grace(Duration::from_millis(500));

        assert_eq!(builder.config.server_command, "pylsp");
        assert_eq!(builder.config.server_args, vec!["--verbose"]);
        assert_eq!(
            builder.config.workspace_root,
            PathBuf::from("/home/user/project")
        );
        assert_eq!(builder.config.init_timeout, Duration::from_secs(60));
        assert_eq!(builder.config.shutdown_grace, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_workspace_root_fails_before_spawning() {
        let err = LspClientBuilder::new()
            .server_command("true")
            .workspace_root("/definitely/not/a/workspace")
            .spawn()
            .unwrap_err();
        assert!(matches!(err, LspError::InitializationFailed(_)));
    }
}
