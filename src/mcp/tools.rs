//! Parameter types for the MCP tools.
//!
//! Every line and column here is 1-indexed; the server converts them at the
//! runtime boundary.
//!
//! # Available Tools
//!
//! - `definition` - Source of a symbol looked up by name
//! - `references` - Every use of a symbol looked up by name
//! - `diagnostics` - Errors and warnings published for a file
//! - `hover` - Type info and documentation at a position
//! - `document_symbols` - Outline of a file
//! - `call_hierarchy` - Callers or callees of the function at a position
//! - `signature_help` - Active signature at a call site
//! - `code_actions` - Quick fixes and refactorings for a range
//! - `completions` - Completion candidates at a position
//! - `edit_file` - Line-based edits, written to disk and synced to the server
//! - `rename_symbol` - Server-side rename, applied to every affected file
//! - `get_codelens` - Code lenses of a file
//! - `execute_codelens` - Runs the command behind one code lens

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input for tools that look a symbol up by name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SymbolNameParams {
    /// Plain or qualified symbol name.
    #[schemars(
        description = "Name of the symbol, e.g. 'main', 'Point', 'Point.x', 'Type::method' or 'pkg.Func'"
    )]
    pub symbol_name: String,
}

/// Common input for position-based tool calls.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PositionParams {
    /// Path to the file.
    #[schemars(description = "Path to the source file, absolute or relative to the workspace")]
    pub file_path: String,
    /// 1-indexed line.
    #[schemars(description = "Line number (1-indexed)")]
    pub line: u32,
    /// 1-indexed column.
    #[schemars(description = "Column number (1-indexed)")]
    pub column: u32,
}

fn default_context_lines() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// Input for the `diagnostics` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsParams {
    /// File to report on.
    #[schemars(description = "Path to the file to report diagnostics for")]
    pub file_path: String,
    /// Lines of source shown around each diagnostic.
    #[serde(default = "default_context_lines")]
    #[schemars(description = "Lines of source context shown around each diagnostic (default 5)")]
    pub context_lines: usize,
    /// Prefix source lines with their numbers.
    #[serde(default = "default_true")]
    #[schemars(description = "Prefix source lines with their line numbers (default true)")]
    pub show_line_numbers: bool,
}

/// Input for the `document_symbols` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSymbolsParams {
    /// File to outline.
    #[schemars(description = "Path to the file to outline")]
    pub file_path: String,
}

/// Which side of the call graph to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    /// Functions that call the target.
    Incoming,
    /// Functions the target calls.
    Outgoing,
}

/// Input for the `call_hierarchy` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallHierarchyParams {
    /// File containing the function.
    #[schemars(description = "Path to the file containing the function")]
    pub file_path: String,
    /// 1-indexed line of the function name.
    #[schemars(description = "Line number of the function name (1-indexed)")]
    pub line: u32,
    /// 1-indexed column of the function name.
    #[schemars(description = "Column number of the function name (1-indexed)")]
    pub column: u32,
    /// Callers or callees.
    #[schemars(description = "'incoming' for callers, 'outgoing' for callees")]
    pub direction: CallDirection,
}

/// Input for the `code_actions` tool: a 1-indexed range.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeActionsParams {
    /// Path to the file.
    #[schemars(description = "Path to the file")]
    pub file_path: String,
    /// Range start line.
    #[schemars(description = "Start line of the range (1-indexed)")]
    pub start_line: u32,
    /// Range start column.
    #[schemars(description = "Start column of the range (1-indexed)")]
    pub start_column: u32,
    /// Range end line.
    #[schemars(description = "End line of the range (1-indexed)")]
    pub end_line: u32,
    /// Range end column.
    #[schemars(description = "End column of the range (1-indexed)")]
    pub end_column: u32,
}

/// Input for the `completions` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletionsParams {
    /// Path to the file.
    #[schemars(description = "Path to the file")]
    pub file_path: String,
    /// 1-indexed line.
    #[schemars(description = "Line number (1-indexed)")]
    pub line: u32,
    /// 1-indexed column.
    #[schemars(description = "Column number (1-indexed)")]
    pub column: u32,
    /// Cap on returned items; `None` or 0 means the default.
    #[schemars(description = "Maximum number of completions to return (default 20)")]
    pub limit: Option<usize>,
}

/// A replacement of whole lines.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineEdit {
    /// First replaced line.
    #[schemars(description = "First line to replace (1-indexed, inclusive)")]
    pub start_line: u32,
    /// Last replaced line.
    #[schemars(description = "Last line to replace (1-indexed, inclusive)")]
    pub end_line: u32,
    /// Replacement text; empty deletes the lines.
    #[serde(default)]
    #[schemars(description = "Replacement text; empty to delete the lines")]
    pub new_text: String,
}

/// Input for the `edit_file` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditFileParams {
    /// File to edit.
    #[schemars(description = "Path to the file to edit")]
    pub file_path: String,
    /// Edits against the original text.
    #[schemars(description = "Edits to apply; line numbers refer to the file before any edit")]
    pub edits: Vec<LineEdit>,
}

/// Input for the `rename_symbol` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameSymbolParams {
    /// File containing the symbol.
    #[schemars(description = "Path to the file containing the symbol")]
    pub file_path: String,
    /// 1-indexed line of the symbol.
    #[schemars(description = "Line number of the symbol (1-indexed)")]
    pub line: u32,
    /// 1-indexed column of the symbol.
    #[schemars(description = "Column number of the symbol (1-indexed)")]
    pub column: u32,
    /// The replacement name.
    #[schemars(description = "New name for the symbol")]
    pub new_name: String,
}

/// Input for the `get_codelens` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetCodeLensParams {
    /// File to list lenses for.
    #[schemars(description = "Path to the file")]
    pub file_path: String,
}

/// Input for the `execute_codelens` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteCodeLensParams {
    /// File the lens belongs to.
    #[schemars(description = "Path to the file")]
    pub file_path: String,
    /// 1-indexed position in the `get_codelens` listing.
    #[schemars(description = "Index of the code lens as listed by get_codelens (1-indexed)")]
    pub index: usize,
}
