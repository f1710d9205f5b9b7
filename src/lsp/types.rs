//! Helpers shared by the runtime and the tool layer.
//!
//! The protocol speaks 0-indexed lines and columns; everything shown to or
//! accepted from a user is 1-indexed. [`UserPosition`] is the only place the
//! two meet.

use std::path::{Path, PathBuf};

use lsp_types::{
    CodeAction, Command, GotoDefinitionResponse, Location, Position, Range, SymbolKind, Url,
};
use serde_json::Value;

use super::LspResult;
use crate::error::LspError;

/// A 1-indexed line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserPosition {
    /// Line, starting at 1.
    pub line: u32,
    /// Column, starting at 1.
    pub column: u32,
}

impl UserPosition {
    /// A position from 1-indexed coordinates. Not validated until [`Self::to_lsp`].
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Converts to a protocol position.
    ///
    /// # Errors
    ///
    /// Returns [`LspError::InvalidPosition`] if either coordinate is 0.
    pub fn to_lsp(self) -> LspResult<Position> {
        if self.line == 0 || self.column == 0 {
            return Err(LspError::InvalidPosition {
                line: self.line,
                column: self.column,
            });
        }
        Ok(Position::new(self.line - 1, self.column - 1))
    }

    /// The 1-indexed form of a 0-indexed LSP position.
    pub fn from_lsp(position: Position) -> Self {
        Self::new(position.line + 1, position.character + 1)
    }
}

impl std::fmt::Display for UserPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}:C{}", self.line, self.column)
    }
}

/// A 1-indexed range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserRange {
    /// Inclusive start.
    pub start: UserPosition,
    /// Exclusive end.
    pub end: UserPosition,
}

impl UserRange {
    /// The 1-indexed form of an LSP range.
    pub fn from_lsp(range: Range) -> Self {
        Self {
            start: UserPosition::from_lsp(range.start),
            end: UserPosition::from_lsp(range.end),
        }
    }

    /// # Errors
    ///
    /// Returns [`LspError::InvalidPosition`] if any coordinate is 0.
    pub fn to_lsp(self) -> LspResult<Range> {
        Ok(Range::new(self.start.to_lsp()?, self.end.to_lsp()?))
    }
}

impl std::fmt::Display for UserRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Converts an absolute path to a `file://` URI.
///
/// # Errors
///
/// Returns [`LspError::DocumentNotFound`] for relative paths.
pub fn path_to_url(path: &Path) -> LspResult<Url> {
    Url::from_file_path(path)
        .map_err(|()| LspError::DocumentNotFound(format!("not an absolute path: {}", path.display())))
}

/// Converts a `file://` URI back to a path, falling back to the raw URI.
pub fn url_to_path(uri: &Url) -> PathBuf {
    uri.to_file_path()
        .unwrap_or_else(|()| PathBuf::from(uri.as_str()))
}

/// Flattens the three shapes a definition response can take.
///
/// Links contribute their target URI and full target range.
pub fn normalize_definition(response: Option<GotoDefinitionResponse>) -> Vec<Location> {
    match response {
        None => Vec::new(),
        Some(GotoDefinitionResponse::Scalar(location)) => vec![location],
        Some(GotoDefinitionResponse::Array(locations)) => locations,
        Some(GotoDefinitionResponse::Link(links)) => links
            .into_iter()
            .map(|link| Location::new(link.target_uri, link.target_range))
            .collect(),
    }
}

/// One entry of a `textDocument/codeAction` response.
///
/// Servers may answer with bare commands or full code actions mixed in the
/// same array; each element is decoded once here.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeActionEntry {
    /// A full code action.
    Action(CodeAction),
    /// A bare command.
    Command(Command),
    /// Anything that decoded as neither.
    Unrecognized(Value),
}

impl CodeActionEntry {
    /// Decodes a single array element.
    ///
    /// A `Command` carries its command name as a string in `command`; a
    /// `CodeAction`'s `command`, if any, is an object.
    pub fn decode(value: Value) -> Self {
        let is_command = value.get("command").is_some_and(Value::is_string);
        let decoded = if is_command {
            serde_json::from_value(value.clone()).map(Self::Command)
        } else if value.get("title").is_some_and(Value::is_string) {
            serde_json::from_value(value.clone()).map(Self::Action)
        } else {
            return Self::Unrecognized(value);
        };
        decoded.unwrap_or(Self::Unrecognized(value))
    }

    /// Decodes a whole response; `null` yields no entries.
    pub fn decode_all(response: Value) -> Vec<Self> {
        match response {
            Value::Array(items) => items.into_iter().map(Self::decode).collect(),
            Value::Null => Vec::new(),
            other => vec![Self::Unrecognized(other)],
        }
    }

    /// Title shown to the user; `None` for unrecognized entries.
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Action(action) => Some(&action.title),
            Self::Command(command) => Some(&command.title),
            Self::Unrecognized(_) => None,
        }
    }
}

/// Converts an LSP symbol kind to a human-readable string.
pub fn symbol_kind_to_string(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::FILE => "File",
        SymbolKind::MODULE => "Module",
        SymbolKind::NAMESPACE => "Namespace",
        SymbolKind::PACKAGE => "Package",
        SymbolKind::CLASS => "Class",
        SymbolKind::METHOD => "Method",
        SymbolKind::PROPERTY => "Property",
        SymbolKind::FIELD => "Field",
        SymbolKind::CONSTRUCTOR => "Constructor",
        SymbolKind::ENUM => "Enum",
        SymbolKind::INTERFACE => "Interface",
        SymbolKind::FUNCTION => "Function",
        SymbolKind::VARIABLE => "Variable",
        SymbolKind::CONSTANT => "Constant",
        SymbolKind::STRING => "String",
        SymbolKind::NUMBER => "Number",
        SymbolKind::BOOLEAN => "Boolean",
        SymbolKind::ARRAY => "Array",
        SymbolKind::OBJECT => "Object",
        SymbolKind::KEY => "Key",
        SymbolKind::NULL => "Null",
        SymbolKind::ENUM_MEMBER => "EnumMember",
        SymbolKind::STRUCT => "Struct",
        SymbolKind::EVENT => "Event",
        SymbolKind::OPERATOR => "Operator",
        SymbolKind::TYPE_PARAMETER => "TypeParameter",
        _ => "Unknown",
    }
}

/// Prefixes each line with its 1-indexed number, starting at `first_line`.
pub fn add_line_numbers(text: &str, first_line: u32) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let last = first_line as usize + lines.len().saturating_sub(1);
    let width = last.to_string().len();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}|{line}\n", first_line as usize + i))
        .collect()
}

#[cfg(test)]
mod tests {
    use lsp_types::LocationLink;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_user_position_round_trip_through_wire() {
        let wire = UserPosition::new(5, 3).to_lsp().unwrap();
        assert_eq!(wire, Position::new(4, 2));
        assert_eq!(UserPosition::from_lsp(wire), UserPosition::new(5, 3));
    }

    #[test]
    fn test_zero_coordinates_are_rejected() {
        assert!(matches!(
            UserPosition::new(0, 1).to_lsp(),
            Err(LspError::InvalidPosition { line: 0, column: 1 })
        ));
        assert!(UserPosition::new(1, 0).to_lsp().is_err());
    }

    #[test]
    fn test_range_from_wire_is_one_indexed() {
        let range = UserRange::from_lsp(Range::new(Position::new(0, 0), Position::new(9, 4)));
        assert_eq!(range.to_string(), "L1:C1 - L10:C5");
    }

    #[test]
    fn test_normalize_definition_shapes() {
        let uri = Url::parse("file:///src/lib.rs").unwrap();
        let range = Range::new(Position::new(3, 0), Position::new(5, 1));
        let location = Location::new(uri.clone(), range);

        assert!(normalize_definition(None).is_empty());
        assert_eq!(
            normalize_definition(Some(GotoDefinitionResponse::Scalar(location.clone()))),
            vec![location.clone()]
        );
        assert_eq!(
            normalize_definition(Some(GotoDefinitionResponse::Array(vec![
                location.clone(),
                location.clone()
            ])))
            .len(),
            2
        );

        let link = LocationLink {
            origin_selection_range: None,
            target_uri: uri,
            target_range: range,
            target_selection_range: Range::new(Position::new(3, 4), Position::new(3, 8)),
        };
        assert_eq!(
            normalize_definition(Some(GotoDefinitionResponse::Link(vec![link]))),
            vec![location]
        );
    }

    #[test]
    fn test_code_action_entry_decoding() {
        let entries = CodeActionEntry::decode_all(json!([
            {"title": "Run test", "command": "mock.runTest", "arguments": [1]},
            {"title": "Add import", "kind": "quickfix", "command": {"title": "x", "command": "y"}},
            {"unexpected": true}
        ]));

        assert!(matches!(&entries[0], CodeActionEntry::Command(c) if c.command == "mock.runTest"));
        assert!(matches!(&entries[1], CodeActionEntry::Action(a) if a.title == "Add import"));
        assert!(matches!(&entries[2], CodeActionEntry::Unrecognized(_)));
        assert_eq!(entries[1].title(), Some("Add import"));
        assert!(CodeActionEntry::decode_all(Value::Null).is_empty());
    }

    #[test]
    fn test_symbol_kind_to_string() {
        assert_eq!(symbol_kind_to_string(SymbolKind::FUNCTION), "Function");
        assert_eq!(symbol_kind_to_string(SymbolKind::STRUCT), "Struct");
    }

    #[test]
    fn test_add_line_numbers_pads_to_widest() {
        let numbered = add_line_numbers("a\nb\nc", 9);
        assert_eq!(numbered, " 9|a\n10|b\n11|c\n");
    }
}
