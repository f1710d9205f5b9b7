//! MCP server exposing a running [`LspClient`] as tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, ErrorCode, Implementation, ProtocolVersion, ServerCapabilities,
        ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use tracing::debug;

use super::edit::{apply_line_edits, apply_text_edits, workspace_edit_files};
use super::format;
use super::tools::{
    CallDirection, CallHierarchyParams, CodeActionsParams, CompletionsParams, DiagnosticsParams,
    DocumentSymbolsParams, EditFileParams, ExecuteCodeLensParams, GetCodeLensParams,
    PositionParams, RenameSymbolParams, SymbolNameParams,
};
use crate::error::{LspError, ToolError};
use crate::lsp::LspClient;
use crate::lsp::resolver::{find_references, resolve_definition};
use crate::lsp::types::{UserPosition, UserRange, url_to_path};

/// How long `diagnostics` waits for a first push after opening a file.
const DIAGNOSTICS_WAIT: Duration = Duration::from_secs(2);

/// Source lines shown around each reference.
const REFERENCE_CONTEXT_LINES: usize = 2;

type ToolResult<T> = Result<T, ToolError>;

impl From<ToolError> for McpError {
    fn from(error: ToolError) -> Self {
        let code = match &error {
            ToolError::InvalidArguments(_)
            | ToolError::Lsp(LspError::InvalidPosition { .. }) => ErrorCode::INVALID_PARAMS,
            ToolError::Unsupported(_) => ErrorCode::INVALID_REQUEST,
            ToolError::File { .. } | ToolError::Edit(_) | ToolError::Lsp(_) => {
                ErrorCode::INTERNAL_ERROR
            }
        };
        McpError::new(code, error.to_string(), None)
    }
}

impl From<LspError> for McpError {
    fn from(error: LspError) -> Self {
        ToolError::from(error).into()
    }
}

fn text_result(text: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text.into())])
}

/// MCP server for semantic code navigation and editing.
#[derive(Clone)]
pub struct LspBridge {
    client: Arc<LspClient>,
    diagnostics_wait: Duration,
    tool_router: ToolRouter<LspBridge>,
}

impl std::fmt::Debug for LspBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LspBridge")
            .field("workspace_root", &self.client.workspace_root())
            .finish_non_exhaustive()
    }
}

impl LspBridge {
    /// Creates a bridge serving tools backed by `client`.
    pub fn new(client: Arc<LspClient>) -> Self {
        Self {
            client,
            diagnostics_wait: DIAGNOSTICS_WAIT,
            tool_router: Self::tool_router(),
        }
    }

    /// Overrides how long `diagnostics` waits for the server's first push.
    #[must_use]
    pub fn with_diagnostics_wait(mut self, wait: Duration) -> Self {
        self.diagnostics_wait = wait;
        self
    }

    /// The underlying client.
    pub fn client(&self) -> &Arc<LspClient> {
        &self.client
    }

    /// Relative paths are taken relative to the workspace root.
    fn resolve_path(&self, file_path: &str) -> PathBuf {
        let path = Path::new(file_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.client.workspace_root().join(path)
        }
    }

    fn require(supported: bool, feature: &'static str) -> ToolResult<()> {
        if supported {
            Ok(())
        } else {
            Err(ToolError::Unsupported(feature))
        }
    }

    /// Current text of `path`: the synced copy if open, the disk otherwise.
    async fn read_text(&self, path: &Path) -> ToolResult<String> {
        if let Some(document) = self.client.document(path) {
            return Ok(document.content);
        }
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ToolError::File {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    async fn write_text(&self, path: &Path, text: &str) -> ToolResult<()> {
        tokio::fs::write(path, text)
            .await
            .map_err(|e| ToolError::File {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }
}

#[tool_router]
impl LspBridge {
    /// Find where a symbol is defined, by name.
    #[tool(
        description = "Read the source code definition of a symbol (function, type, constant, method) by name. Returns the full definition with line numbers."
    )]
    pub async fn definition(
        &self,
        Parameters(params): Parameters<SymbolNameParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(
            self.client.capabilities().supports_definition(),
            "definition lookup",
        )?;
        let lookup = resolve_definition(&self.client, &params.symbol_name).await?;
        Ok(text_result(format::format_definitions(
            &params.symbol_name,
            &lookup,
        )))
    }

    /// Find all references to a symbol, by name.
    #[tool(
        description = "Find every usage of a symbol across the codebase, grouped by file with surrounding source lines."
    )]
    pub async fn references(
        &self,
        Parameters(params): Parameters<SymbolNameParams>,
    ) -> Result<CallToolResult, McpError> {
        let capabilities = self.client.capabilities();
        Self::require(
            capabilities.supports_references() && capabilities.supports_workspace_symbols(),
            "find references",
        )?;

        let locations = find_references(&self.client, &params.symbol_name).await?;
        if locations.is_empty() {
            return Ok(text_result(format!(
                "No references found for symbol: {}",
                params.symbol_name
            )));
        }

        let total = locations.len();
        let mut out = format!("Found {total} reference(s) to {}:\n\n", params.symbol_name);
        for (uri, ranges) in format::group_by_file(locations) {
            let path = url_to_path(&uri);
            let content = match self.read_text(&path).await {
                Ok(content) => Some(content),
                Err(e) => {
                    debug!(error = %e, "reference file unreadable, listing positions only");
                    None
                }
            };
            out.push_str(&format::format_file_references(
                &path,
                content.as_deref(),
                &ranges,
                REFERENCE_CONTEXT_LINES,
            ));
        }
        Ok(text_result(out))
    }

    /// Report the diagnostics the server published for a file.
    #[tool(
        description = "Get errors and warnings for a file, with the offending source lines."
    )]
    pub async fn diagnostics(
        &self,
        Parameters(params): Parameters<DiagnosticsParams>,
    ) -> Result<CallToolResult, McpError> {
        let path = self.resolve_path(&params.file_path);
        let uri = self.client.open_file(&path).await?;

        if self
            .client
            .wait_for_diagnostics(&uri, self.diagnostics_wait)
            .await
            .is_none()
        {
            debug!(wait = ?self.diagnostics_wait, "no diagnostics published yet");
        }

        let diagnostics = self.client.diagnostics(&uri);
        let content = self.read_text(&path).await?;
        Ok(text_result(format::format_diagnostics(
            &path,
            &content,
            &diagnostics,
            params.context_lines,
            params.show_line_numbers,
        )))
    }

    /// Get type information and documentation for a symbol.
    #[tool(
        description = "Get type signature and docs for the symbol at a position. Lines and columns are 1-indexed."
    )]
    pub async fn hover(
        &self,
        Parameters(params): Parameters<PositionParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(self.client.capabilities().supports_hover(), "hover")?;
        let path = self.resolve_path(&params.file_path);
        let position = UserPosition::new(params.line, params.column).to_lsp()?;
        let hover = self.client.hover(&path, position).await?;
        Ok(text_result(format::format_hover(hover)))
    }

    /// List all symbols defined in a file.
    #[tool(
        description = "List all symbols in a file as a tree: functions, types, fields, constants."
    )]
    pub async fn document_symbols(
        &self,
        Parameters(params): Parameters<DocumentSymbolsParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(
            self.client.capabilities().supports_document_symbols(),
            "document symbols",
        )?;
        let path = self.resolve_path(&params.file_path);
        let symbols = self.client.document_symbols(&path).await?;
        Ok(text_result(format::format_document_symbols(&path, symbols)))
    }

    /// Walk the call graph from the function at a position.
    #[tool(
        description = "Show the callers ('incoming') or callees ('outgoing') of the function at a position. Lines and columns are 1-indexed."
    )]
    pub async fn call_hierarchy(
        &self,
        Parameters(params): Parameters<CallHierarchyParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(
            self.client.capabilities().supports_call_hierarchy(),
            "call hierarchy",
        )?;
        let path = self.resolve_path(&params.file_path);
        let position = UserPosition::new(params.line, params.column).to_lsp()?;

        let items = self.client.prepare_call_hierarchy(&path, position).await?;
        let Some(item) = items.into_iter().next() else {
            return Ok(text_result(format!(
                "No symbol found at {}:{}:{}",
                path.display(),
                params.line,
                params.column
            )));
        };

        let text = match params.direction {
            CallDirection::Incoming => {
                let calls = self.client.incoming_calls(item.clone()).await?;
                format::format_incoming_calls(&item, &calls)
            }
            CallDirection::Outgoing => {
                let calls = self.client.outgoing_calls(item.clone()).await?;
                format::format_outgoing_calls(&item, &calls)
            }
        };
        Ok(text_result(text))
    }

    /// Signature help at a call site.
    #[tool(
        description = "Show the signature of the function being called at a position, with the active parameter marked. Lines and columns are 1-indexed."
    )]
    pub async fn signature_help(
        &self,
        Parameters(params): Parameters<PositionParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(
            self.client.capabilities().supports_signature_help(),
            "signature help",
        )?;
        let path = self.resolve_path(&params.file_path);
        let position = UserPosition::new(params.line, params.column).to_lsp()?;
        let help = self.client.signature_help(&path, position).await?;

        let content = self.read_text(&path).await?;
        let line_text = content
            .lines()
            .nth(position.line as usize)
            .unwrap_or_default();
        Ok(text_result(format::format_signature_help(help, line_text)))
    }

    /// Code actions for a 1-indexed range.
    #[tool(
        description = "List quick fixes and refactorings available for a range. Lines and columns are 1-indexed."
    )]
    pub async fn code_actions(
        &self,
        Parameters(params): Parameters<CodeActionsParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(
            self.client.capabilities().supports_code_actions(),
            "code actions",
        )?;
        let path = self.resolve_path(&params.file_path);
        let range = UserRange {
            start: UserPosition::new(params.start_line, params.start_column),
            end: UserPosition::new(params.end_line, params.end_column),
        };
        if range.end < range.start {
            return Err(ToolError::InvalidArguments(format!(
                "range end {} is before its start {}",
                range.end, range.start
            ))
            .into());
        }
        let entries = self.client.code_actions(&path, range.to_lsp()?).await?;
        Ok(text_result(format::format_code_actions(&entries)))
    }

    /// Completion candidates, capped by `limit`.
    #[tool(
        description = "List completion candidates at a position, best first. Lines and columns are 1-indexed."
    )]
    pub async fn completions(
        &self,
        Parameters(params): Parameters<CompletionsParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(
            self.client.capabilities().supports_completion(),
            "completion",
        )?;
        let path = self.resolve_path(&params.file_path);
        let position = UserPosition::new(params.line, params.column).to_lsp()?;
        let limit = params
            .limit
            .filter(|limit| *limit > 0)
            .unwrap_or(format::DEFAULT_COMPLETION_LIMIT);
        let response = self.client.completion(&path, position).await?;
        Ok(text_result(format::format_completions(response, limit)))
    }

    /// Apply line edits to a file on disk and sync them to the server.
    #[tool(
        description = "Replace whole lines of a file. Each edit gives 1-indexed inclusive startLine/endLine and the new text; an empty newText deletes the lines."
    )]
    pub async fn edit_file(
        &self,
        Parameters(params): Parameters<EditFileParams>,
    ) -> Result<CallToolResult, McpError> {
        if params.edits.is_empty() {
            return Err(ToolError::InvalidArguments("no edits given".into()).into());
        }
        let path = self.resolve_path(&params.file_path);
        self.client.open_file(&path).await?;

        let original = self.read_text(&path).await?;
        let (updated, summary) = apply_line_edits(&original, &params.edits)?;

        self.write_text(&path, &updated).await?;
        let version = self.client.change_file(&path, updated).await?;
        debug!(version, "synced edited document");

        Ok(text_result(summary.to_string()))
    }

    /// Rename through the server and write every affected file.
    #[tool(
        description = "Rename the symbol at a position everywhere it is used. The language server computes the edits; they are written to disk and synced. Lines and columns are 1-indexed."
    )]
    pub async fn rename_symbol(
        &self,
        Parameters(params): Parameters<RenameSymbolParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(self.client.capabilities().supports_rename(), "rename")?;
        let new_name = params.new_name.trim();
        if new_name.is_empty() {
            return Err(ToolError::InvalidArguments("newName must not be empty".into()).into());
        }
        let path = self.resolve_path(&params.file_path);
        let position = UserPosition::new(params.line, params.column).to_lsp()?;

        let files = match self.client.rename(&path, position, new_name).await? {
            Some(edit) => workspace_edit_files(edit)?,
            None => Default::default(),
        };
        if files.is_empty() {
            return Ok(text_result(format!(
                "No rename edits returned for {}:{}",
                path.display(),
                UserPosition::from_lsp(position)
            )));
        }

        // Nothing is written until every file's edits applied cleanly.
        let mut updates = Vec::with_capacity(files.len());
        for (uri, edits) in files {
            let target = url_to_path(&uri);
            self.client.open_file(&target).await?;
            let original = self.read_text(&target).await?;
            let updated = apply_text_edits(&original, &edits)?;
            updates.push((target, edits.len(), updated));
        }

        let mut changed = Vec::with_capacity(updates.len());
        for (target, count, updated) in updates {
            self.write_text(&target, &updated).await?;
            let version = self.client.change_file(&target, updated).await?;
            debug!(path = %target.display(), version, "synced renamed document");
            changed.push((target, count));
        }
        Ok(text_result(format::format_rename(new_name, &changed)))
    }

    /// Code lenses of a file.
    #[tool(
        description = "List the code lenses of a file (run/test/reference counts and similar inline actions), numbered for execute_codelens."
    )]
    pub async fn get_codelens(
        &self,
        Parameters(params): Parameters<GetCodeLensParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(
            self.client.capabilities().supports_code_lens(),
            "code lens",
        )?;
        let path = self.resolve_path(&params.file_path);
        let lenses = self.client.code_lens(&path).await?;
        Ok(text_result(format::format_code_lenses(&path, &lenses)))
    }

    /// Run the command behind one lens, resolving it first if needed.
    #[tool(
        description = "Execute the command of a code lens. The index is the 1-indexed number shown by get_codelens for the same file."
    )]
    pub async fn execute_codelens(
        &self,
        Parameters(params): Parameters<ExecuteCodeLensParams>,
    ) -> Result<CallToolResult, McpError> {
        Self::require(
            self.client.capabilities().supports_code_lens(),
            "code lens",
        )?;
        let path = self.resolve_path(&params.file_path);
        let mut lenses = self.client.code_lens(&path).await?;
        if params.index == 0 || params.index > lenses.len() {
            let available = if lenses.is_empty() {
                "the file has no code lenses".to_string()
            } else {
                format!("available range: 1-{}", lenses.len())
            };
            return Err(ToolError::InvalidArguments(format!(
                "invalid code lens index {}; {available}",
                params.index
            ))
            .into());
        }

        let mut lens = lenses.swap_remove(params.index - 1);
        if lens.command.is_none() {
            lens = self.client.resolve_code_lens(lens).await?;
        }
        let Some(command) = lens.command else {
            return Err(ToolError::InvalidArguments(format!(
                "code lens {} has no command to execute",
                params.index
            ))
            .into());
        };

        let title = command.title.clone();
        let name = command.command.clone();
        let result = self.client.execute_command(command).await?;
        let headline = format!("Successfully executed code lens command: {title} ({name})");
        Ok(text_result(match result.filter(|v| !v.is_null()) {
            Some(value) => format!("{headline}\nResult: {value}"),
            None => headline,
        }))
    }
}

#[tool_handler]
impl ServerHandler for LspBridge {
    fn get_info(&self) -> ServerInfo {
        let server = self
            .client
            .capabilities()
            .server_name
            .clone()
            .unwrap_or_else(|| "the language server".to_string());
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(format!(
                "Semantic code intelligence backed by {server}. Look symbols up by name with \
                 definition and references; position-based tools take 1-indexed lines and \
                 columns. Tools the server does not support report an error instead of \
                 guessing."
            )),
        }
    }
}
