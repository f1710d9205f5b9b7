//! Server capabilities captured from the `initialize` response.
//!
//! Capabilities are read from the raw JSON rather than a typed
//! `ServerCapabilities`, because typed decoding collapses "field sent as
//! `null`" and "field not sent" into the same `None`.

use serde_json::{Map, Value};

/// Presence of one capability field in the `initialize` response.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    /// The field was not sent.
    Absent,
    /// The field was sent as `null`.
    PresentNull,
    /// The field was sent with a value (`true`, `false` or an options object).
    PresentValue(Value),
}

impl Capability {
    fn from_field(capabilities: &Map<String, Value>, name: &str) -> Self {
        match capabilities.get(name) {
            None => Self::Absent,
            Some(Value::Null) => Self::PresentNull,
            Some(value) => Self::PresentValue(value.clone()),
        }
    }

    /// Rule for fields whose value is a nullable `bool | options` union:
    /// the wrapper must be present with a non-null inner value. A literal
    /// `false` is still a value and counts.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::PresentValue(_))
    }

    /// Rule for plain optional fields: any sent value counts, whatever it is.
    pub fn is_declared(&self) -> bool {
        matches!(self, Self::PresentValue(_))
    }
}

/// Immutable snapshot of what the server declared.
#[derive(Debug, Clone)]
pub struct CapabilitiesSnapshot {
    /// `definitionProvider`.
    pub definition: Capability,
    /// `referencesProvider`.
    pub references: Capability,
    /// `hoverProvider`.
    pub hover: Capability,
    /// `documentSymbolProvider`.
    pub document_symbol: Capability,
    /// `callHierarchyProvider`.
    pub call_hierarchy: Capability,
    /// `workspaceSymbolProvider`.
    pub workspace_symbol: Capability,
    /// `renameProvider`.
    pub rename: Capability,
    /// `codeActionProvider`.
    pub code_action: Capability,
    /// `signatureHelpProvider`.
    pub signature_help: Capability,
    /// `codeLensProvider`.
    pub code_lens: Capability,
    /// `completionProvider`.
    pub completion: Capability,
    /// `serverInfo.name` from the initialize result.
    pub server_name: Option<String>,
    /// `serverInfo.version`, if sent.
    pub server_version: Option<String>,
    raw: Value,
}

impl Default for CapabilitiesSnapshot {
    fn default() -> Self {
        Self::from_initialize_result(&Value::Null)
    }
}

impl CapabilitiesSnapshot {
    /// Builds the snapshot from the full `initialize` result object.
    pub fn from_initialize_result(result: &Value) -> Self {
        let empty = Map::new();
        let raw = result.get("capabilities").cloned().unwrap_or(Value::Null);
        let caps = raw.as_object().unwrap_or(&empty);
        let field = |name| Capability::from_field(caps, name);

        let server_info = result.get("serverInfo");
        let info_field = |name: &str| {
            server_info
                .and_then(|info| info.get(name))
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        Self {
            definition: field("definitionProvider"),
            references: field("referencesProvider"),
            hover: field("hoverProvider"),
            document_symbol: field("documentSymbolProvider"),
            call_hierarchy: field("callHierarchyProvider"),
            workspace_symbol: field("workspaceSymbolProvider"),
            rename: field("renameProvider"),
            code_action: field("codeActionProvider"),
            signature_help: field("signatureHelpProvider"),
            code_lens: field("codeLensProvider"),
            completion: field("completionProvider"),
            server_name: info_field("name"),
            server_version: info_field("version"),
            raw,
        }
    }

    /// The `capabilities` object exactly as the server sent it.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Wrapper rule: any non-null value, `false` included.
    pub fn supports_goto_definition(&self) -> bool {
        self.definition.is_enabled()
    }

    /// Wrapper rule.
    pub fn supports_references(&self) -> bool {
        self.references.is_enabled()
    }

    /// Wrapper rule.
    pub fn supports_hover(&self) -> bool {
        self.hover.is_enabled()
    }

    /// Wrapper rule.
    pub fn supports_document_symbols(&self) -> bool {
        self.document_symbol.is_enabled()
    }

    /// Wrapper rule.
    pub fn supports_call_hierarchy(&self) -> bool {
        self.call_hierarchy.is_enabled()
    }

    /// Wrapper rule.
    pub fn supports_workspace_symbols(&self) -> bool {
        self.workspace_symbol.is_enabled()
    }

    /// Declared at all, even as `null`.
    pub fn supports_rename(&self) -> bool {
        self.rename.is_declared()
    }

    /// Declared at all.
    pub fn supports_code_actions(&self) -> bool {
        self.code_action.is_declared()
    }

    /// Declared at all.
    pub fn supports_signature_help(&self) -> bool {
        self.signature_help.is_declared()
    }

    /// Declared at all.
    pub fn supports_code_lens(&self) -> bool {
        self.code_lens.is_declared()
    }

    /// Declared at all.
    pub fn supports_completion(&self) -> bool {
        self.completion.is_declared()
    }

    /// Symbol-name lookup needs both workspace search and goto-definition.
    pub fn supports_definition(&self) -> bool {
        self.supports_goto_definition() && self.supports_workspace_symbols()
    }

    /// Edits go through text synchronization, which every server handles.
    pub fn supports_edit(&self) -> bool {
        true
    }

    /// Diagnostics are pushed without any capability declaration.
    pub fn supports_diagnostics(&self) -> bool {
        true
    }
}
