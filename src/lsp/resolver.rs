//! Symbol name to definition lookup.
//!
//! `workspace/symbol` is fuzzy by each server's own policy, so its results
//! are filtered with [`symbol_matches`] before asking `textDocument/definition`
//! at every surviving candidate. Results are deduplicated by start position
//! and returned with the source text of the enclosing symbol.

use std::collections::HashSet;
use std::path::PathBuf;

use lsp_types::{
    DocumentSymbol, DocumentSymbolResponse, Location, OneOf, Position, Range, SymbolInformation,
    SymbolKind, Url, WorkspaceSymbolResponse,
};
use tracing::{debug, warn};

use super::LspResult;
use super::client::LspClient;
use super::types::{add_line_numbers, url_to_path};

/// One workspace symbol search hit with a concrete location.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolCandidate {
    /// Symbol name as the server reported it.
    pub name: String,
    /// Symbol kind.
    pub kind: SymbolKind,
    /// Enclosing type or module, if reported.
    pub container_name: Option<String>,
    /// Where the symbol search placed it.
    pub location: Location,
}

impl SymbolCandidate {
    /// Flattens either response shape. Workspace symbols that only carry a
    /// URI have no position to query and are skipped.
    pub fn from_response(response: Option<WorkspaceSymbolResponse>) -> Vec<Self> {
        match response {
            None => Vec::new(),
            Some(WorkspaceSymbolResponse::Flat(symbols)) => {
                symbols.into_iter().map(Self::from_information).collect()
            }
            Some(WorkspaceSymbolResponse::Nested(symbols)) => symbols
                .into_iter()
                .filter_map(|symbol| match symbol.location {
                    OneOf::Left(location) => Some(Self {
                        name: symbol.name,
                        kind: symbol.kind,
                        container_name: symbol.container_name,
                        location,
                    }),
                    OneOf::Right(_) => None,
                })
                .collect(),
        }
    }

    #[allow(deprecated)]
    fn from_information(symbol: SymbolInformation) -> Self {
        Self {
            name: symbol.name,
            kind: symbol.kind,
            container_name: symbol.container_name,
            location: symbol.location,
        }
    }
}

/// Decides whether a workspace symbol is what the user asked for.
///
/// Rules are tried in order and the first one that accepts wins:
///
/// 1. exact name match
/// 2. a query containing `.` or `:` only matches exactly
/// 3. the name ends in `::query` or `.query`
/// 4. methods and functions: same name with a container
/// 5. classes, structs, interfaces, enums: case-insensitive equality or
///    substring
/// 6. variables and constants: last `::` segment equals the query
pub fn symbol_matches(
    query: &str,
    name: &str,
    kind: SymbolKind,
    container_name: Option<&str>,
) -> bool {
    if name == query {
        return true;
    }
    if query.contains(['.', ':']) {
        return false;
    }
    if name.ends_with(&format!("::{query}")) || name.ends_with(&format!(".{query}")) {
        return true;
    }

    if (kind == SymbolKind::METHOD || kind == SymbolKind::FUNCTION)
        && name == query
        && container_name.is_some_and(|c| !c.is_empty())
    {
        return true;
    }

    if matches!(
        kind,
        SymbolKind::CLASS | SymbolKind::STRUCT | SymbolKind::INTERFACE | SymbolKind::ENUM
    ) && (name.eq_ignore_ascii_case(query) || name.contains(query))
    {
        return true;
    }

    if (kind == SymbolKind::VARIABLE || kind == SymbolKind::CONSTANT)
        && name.rsplit_once("::").is_some_and(|(_, last)| last == query)
    {
        return true;
    }

    false
}

/// A definition found for a symbol name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDefinition {
    /// Name of the matched symbol.
    pub symbol: String,
    /// Kind of the matched symbol.
    pub kind: SymbolKind,
    /// Container of the matched symbol.
    pub container_name: Option<String>,
    /// File holding the definition.
    pub path: PathBuf,
    /// Range of the enclosing symbol, or the definition range itself.
    pub range: Range,
    /// Source lines of `range`, prefixed with 1-indexed line numbers.
    pub text: String,
}

/// Outcome of a lookup. Nothing found is a normal result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionLookup {
    /// One entry per distinct definition.
    Found(Vec<ResolvedDefinition>),
    /// No candidate survived filtering.
    NotFound,
}

/// Key used to drop duplicate definition locations.
fn location_key(location: &Location) -> (Url, u32, u32) {
    (
        location.uri.clone(),
        location.range.start.line,
        location.range.start.character,
    )
}

/// Keeps the first occurrence of every `(uri, line, column)` start position.
pub fn dedup_locations<T>(
    items: impl IntoIterator<Item = (T, Location)>,
) -> Vec<(T, Location)> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|(_, location)| seen.insert(location_key(location)))
        .collect()
}

/// Finds the definitions of `query` across the workspace.
///
/// Failures for a single candidate are logged and skipped.
///
/// # Errors
///
/// Only the workspace symbol search itself can fail the lookup.
pub async fn resolve_definition(client: &LspClient, query: &str) -> LspResult<DefinitionLookup> {
    let candidates = matching_candidates(client, query).await?;

    let mut located = Vec::new();
    for candidate in candidates {
        let path = url_to_path(&candidate.location.uri);
        match client
            .definition(&path, candidate.location.range.start)
            .await
        {
            Ok(locations) => {
                located.extend(locations.into_iter().map(|loc| (candidate.clone(), loc)));
            }
            Err(e) => warn!(symbol = candidate.name, error = %e, "definition lookup failed"),
        }
    }

    let mut definitions = Vec::new();
    for (candidate, location) in dedup_locations(located) {
        match enclosing_text(client, &location).await {
            Ok((range, text)) => definitions.push(ResolvedDefinition {
                symbol: candidate.name,
                kind: candidate.kind,
                container_name: candidate.container_name,
                path: url_to_path(&location.uri),
                range,
                text,
            }),
            Err(e) => warn!(uri = %location.uri, error = %e, "failed to read definition"),
        }
    }

    if definitions.is_empty() {
        return Ok(DefinitionLookup::NotFound);
    }
    Ok(DefinitionLookup::Found(definitions))
}

/// References to every workspace symbol matching `query`, deduplicated.
///
/// # Errors
///
/// Only the workspace symbol search itself can fail the lookup.
pub async fn find_references(client: &LspClient, query: &str) -> LspResult<Vec<Location>> {
    let candidates = matching_candidates(client, query).await?;

    let mut found = Vec::new();
    for candidate in candidates {
        let path = url_to_path(&candidate.location.uri);
        match client
            .references(&path, candidate.location.range.start, false)
            .await
        {
            Ok(locations) => found.extend(locations.into_iter().map(|loc| ((), loc))),
            Err(e) => warn!(symbol = candidate.name, error = %e, "references lookup failed"),
        }
    }

    Ok(dedup_locations(found)
        .into_iter()
        .map(|((), location)| location)
        .collect())
}

async fn matching_candidates(client: &LspClient, query: &str) -> LspResult<Vec<SymbolCandidate>> {
    let response = client.workspace_symbols(query).await?;
    let candidates: Vec<_> = SymbolCandidate::from_response(response)
        .into_iter()
        .filter(|c| symbol_matches(query, &c.name, c.kind, c.container_name.as_deref()))
        .collect();
    debug!(query, matches = candidates.len(), "filtered workspace symbols");
    Ok(candidates)
}

/// Source text of the innermost document symbol around `location`, falling
/// back to the location's own range, widened to whole lines.
async fn enclosing_text(client: &LspClient, location: &Location) -> LspResult<(Range, String)> {
    let path = url_to_path(&location.uri);
    // Opening first makes the synced copy the source of truth for the text.
    client.open_file(&path).await?;

    let mut range = location.range;
    if client.capabilities().supports_document_symbols() {
        match client.document_symbols(&path).await {
            Ok(symbols) => {
                if let Some(enclosing) = innermost_enclosing(symbols, location.range.start) {
                    range = enclosing;
                }
            }
            Err(e) => debug!(error = %e, "document symbols unavailable, using definition range"),
        }
    }

    let content = match client.document(&path) {
        Some(document) => document.content,
        None => tokio::fs::read_to_string(&path).await.map_err(|e| {
            crate::error::LspError::DocumentNotFound(format!(
                "failed to read '{}': {e}",
                path.display()
            ))
        })?,
    };

    let text = line_span(&content, range.start.line, range.end.line);
    Ok((range, add_line_numbers(&text, range.start.line + 1)))
}

/// Lines `first..=last` (0-indexed) of `content`.
fn line_span(content: &str, first: u32, last: u32) -> String {
    content
        .lines()
        .skip(first as usize)
        .take(last.saturating_sub(first) as usize + 1)
        .collect::<Vec<_>>()
        .join("\n")
}

fn contains(range: &Range, position: Position) -> bool {
    let at = (position.line, position.character);
    (range.start.line, range.start.character) <= at && at <= (range.end.line, range.end.character)
}

fn span_size(range: &Range) -> (u32, u32) {
    (
        range.end.line.saturating_sub(range.start.line),
        range.end.character.saturating_sub(range.start.character),
    )
}

/// Smallest symbol range containing `position`.
fn innermost_enclosing(symbols: Option<DocumentSymbolResponse>, position: Position) -> Option<Range> {
    match symbols? {
        DocumentSymbolResponse::Nested(symbols) => innermost_nested(&symbols, position),
        DocumentSymbolResponse::Flat(symbols) => symbols
            .iter()
            .map(|s| s.location.range)
            .filter(|range| contains(range, position))
            .min_by_key(span_size),
    }
}

fn innermost_nested(symbols: &[DocumentSymbol], position: Position) -> Option<Range> {
    let symbol = symbols.iter().find(|s| contains(&s.range, position))?;
    symbol
        .children
        .as_deref()
        .and_then(|children| innermost_nested(children, position))
        .or(Some(symbol.range))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(uri: &str, line: u32, character: u32) -> Location {
        Location::new(
            Url::parse(uri).unwrap(),
            Range::new(
                Position::new(line, character),
                Position::new(line + 2, 1),
            ),
        )
    }

    #[test]
    fn test_exact_match_always_wins() {
        assert!(symbol_matches("Foo", "Foo", SymbolKind::FIELD, None));
        assert!(symbol_matches("a.b", "a.b", SymbolKind::FIELD, None));
    }

    #[test]
    fn test_unqualified_query_matches_qualified_names() {
        assert!(symbol_matches("method", "TestClass::method", SymbolKind::METHOD, None));
        assert!(symbol_matches("method", "TestClass.method", SymbolKind::METHOD, None));
        assert!(!symbol_matches("method", "TestClass::methods", SymbolKind::METHOD, None));
    }

    #[test]
    fn test_qualified_query_requires_exact_name() {
        assert!(symbol_matches(
            "TestClass::method",
            "TestClass::method",
            SymbolKind::METHOD,
            None
        ));
        assert!(!symbol_matches("TestClass::method", "method", SymbolKind::METHOD, Some("TestClass")));
        assert!(!symbol_matches("pkg.Run", "Run", SymbolKind::FUNCTION, Some("pkg")));
    }

    #[test]
    fn test_type_like_kinds_are_fuzzy() {
        assert!(symbol_matches("vector", "std::vector<int>", SymbolKind::CLASS, None));
        assert!(symbol_matches("shape", "Shape", SymbolKind::STRUCT, None));
        assert!(symbol_matches("Reader", "BufferedReader", SymbolKind::INTERFACE, None));
        assert!(!symbol_matches("Reader", "BufferedReader", SymbolKind::FUNCTION, None));
    }

    #[test]
    fn test_variables_match_last_scope_segment() {
        assert!(symbol_matches("MAX", "config::limits::MAX", SymbolKind::CONSTANT, None));
        assert!(symbol_matches("count", "ns::count", SymbolKind::VARIABLE, None));
        assert!(!symbol_matches("MAX", "MAX_SIZE", SymbolKind::CONSTANT, None));
    }

    #[test]
    fn test_dedup_keeps_first_of_identical_starts() {
        let unique = dedup_locations(vec![
            ("first", location("file:///a.rs", 3, 4)),
            ("second", location("file:///a.rs", 3, 4)),
            ("third", location("file:///a.rs", 3, 5)),
            ("fourth", location("file:///b.rs", 3, 4)),
        ]);
        let tags: Vec<_> = unique.iter().map(|(tag, _)| *tag).collect();
        assert_eq!(tags, vec!["first", "third", "fourth"]);
    }

    #[test]
    fn test_candidates_skip_uri_only_workspace_symbols() {
        let response: WorkspaceSymbolResponse = serde_json::from_value(serde_json::json!([
            {
                "name": "Run",
                "kind": 12,
                "location": {
                    "uri": "file:///main.go",
                    "range": {"start": {"line": 1, "character": 5}, "end": {"line": 1, "character": 8}}
                }
            },
            {"name": "Lazy", "kind": 12, "location": {"uri": "file:///lazy.go"}}
        ]))
        .unwrap();
        let candidates = SymbolCandidate::from_response(Some(response));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Run");
    }

    #[test]
    fn test_innermost_nested_symbol() {
        let symbols: DocumentSymbolResponse = serde_json::from_value(serde_json::json!([{
            "name": "Outer",
            "kind": 5,
            "range": {"start": {"line": 0, "character": 0}, "end": {"line": 10, "character": 1}},
            "selectionRange": {"start": {"line": 0, "character": 6}, "end": {"line": 0, "character": 11}},
            "children": [{
                "name": "inner",
                "kind": 6,
                "range": {"start": {"line": 2, "character": 4}, "end": {"line": 4, "character": 5}},
                "selectionRange": {"start": {"line": 2, "character": 7}, "end": {"line": 2, "character": 12}}
            }]
        }]))
        .unwrap();

        let inner = innermost_enclosing(Some(symbols.clone()), Position::new(3, 0)).unwrap();
        assert_eq!(inner.start.line, 2);
        let outer = innermost_enclosing(Some(symbols), Position::new(8, 0)).unwrap();
        assert_eq!(outer.start.line, 0);
    }

    #[test]
    fn test_line_span_is_inclusive() {
        let content = "zero\none\ntwo\nthree\n";
        assert_eq!(line_span(content, 1, 2), "one\ntwo");
        assert_eq!(line_span(content, 3, 3), "three");
    }
}
