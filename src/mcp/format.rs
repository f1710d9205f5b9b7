//! Plain-text rendering of runtime results for tool output.
//!
//! Everything shown here is 1-indexed.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use lsp_types::{
    CallHierarchyIncomingCall, CallHierarchyItem, CallHierarchyOutgoingCall, CodeLens,
    CompletionItem, CompletionItemKind, CompletionResponse, Diagnostic, DiagnosticSeverity,
    DocumentSymbol, DocumentSymbolResponse, Documentation, Hover, HoverContents, Location,
    MarkedString, NumberOrString, ParameterLabel, Range, SignatureHelp, SymbolInformation, Url,
};

use crate::lsp::types::{
    CodeActionEntry, UserPosition, UserRange, symbol_kind_to_string, url_to_path,
};
use crate::lsp::{DefinitionLookup, ResolvedDefinition};

/// Marks the active signature and parameter.
const ACTIVE_MARKER: &str = "▶";

/// Completions returned when the caller does not pass a limit.
pub const DEFAULT_COMPLETION_LIMIT: usize = 20;

const MAX_DOC_CHARS: usize = 100;

fn display_uri(uri: &Url) -> String {
    url_to_path(uri).display().to_string()
}

/// `L{line}:C{column}` of a range's start.
fn start_of(range: &Range) -> String {
    UserPosition::from_lsp(range.start).to_string()
}

/// Source lines around `line` (1-indexed), the target line marked with `>`.
pub fn context_lines(content: &str, line: u32, context: usize, show_line_numbers: bool) -> String {
    let lines: Vec<_> = content.lines().collect();
    let line_idx = line.saturating_sub(1) as usize;
    if line_idx >= lines.len() {
        return String::new();
    }

    let start = line_idx.saturating_sub(context);
    let end = (line_idx + context + 1).min(lines.len());

    let mut result = String::new();
    for (idx, line_text) in lines[start..end].iter().enumerate() {
        let line_num = start + idx + 1;
        let marker = if line_num == line_idx + 1 { ">" } else { " " };
        if show_line_numbers {
            let _ = writeln!(result, "{marker} {line_num:4} | {line_text}");
        } else {
            let _ = writeln!(result, "{marker} {line_text}");
        }
    }
    result
}

// ---------------------------------------------------------------------------
// definition / references
// ---------------------------------------------------------------------------

/// One block per definition, or `<symbol> not found`.
pub fn format_definitions(symbol: &str, lookup: &DefinitionLookup) -> String {
    let definitions = match lookup {
        DefinitionLookup::Found(definitions) => definitions,
        DefinitionLookup::NotFound => return format!("{symbol} not found"),
    };
    definitions.iter().map(format_definition).collect()
}

fn format_definition(definition: &ResolvedDefinition) -> String {
    let mut out = String::from("---\n\n");
    let _ = writeln!(out, "Symbol: {}", definition.symbol);
    let _ = writeln!(out, "File: {}", definition.path.display());
    let _ = writeln!(out, "Kind: {}", symbol_kind_to_string(definition.kind));
    if let Some(container) = definition.container_name.as_deref().filter(|c| !c.is_empty()) {
        let _ = writeln!(out, "Container Name: {container}");
    }
    let _ = writeln!(out, "Range: {}\n", UserRange::from_lsp(definition.range));
    out.push_str(&definition.text);
    out.push('\n');
    out
}

/// Reference ranges grouped per file, files in URI order.
pub fn group_by_file(locations: Vec<Location>) -> BTreeMap<Url, Vec<Range>> {
    let mut grouped: BTreeMap<Url, Vec<Range>> = BTreeMap::new();
    for location in locations {
        grouped.entry(location.uri).or_default().push(location.range);
    }
    for ranges in grouped.values_mut() {
        ranges.sort_by_key(|r| (r.start.line, r.start.character));
    }
    grouped
}

/// One file's section of a references report.
///
/// `content` is `None` when the file could not be read; positions are still
/// listed.
pub fn format_file_references(
    path: &Path,
    content: Option<&str>,
    ranges: &[Range],
    context: usize,
) -> String {
    let mut out = String::from("---\n\n");
    let _ = writeln!(out, "{}", path.display());
    let _ = writeln!(out, "References in File: {}", ranges.len());
    let positions: Vec<_> = ranges.iter().map(start_of).collect();
    let _ = writeln!(out, "At: {}\n", positions.join(", "));

    if let Some(content) = content {
        for range in ranges {
            out.push_str(&context_lines(content, range.start.line + 1, context, true));
            out.push('\n');
        }
    }
    out
}

// ---------------------------------------------------------------------------
// diagnostics
// ---------------------------------------------------------------------------

fn severity_label(severity: Option<DiagnosticSeverity>) -> &'static str {
    match severity {
        Some(DiagnosticSeverity::ERROR) => "ERROR",
        Some(DiagnosticSeverity::WARNING) => "WARNING",
        Some(DiagnosticSeverity::INFORMATION) => "INFO",
        Some(DiagnosticSeverity::HINT) => "HINT",
        _ => "UNKNOWN",
    }
}

/// Diagnostics of one file with source context around each.
pub fn format_diagnostics(
    path: &Path,
    content: &str,
    diagnostics: &[Diagnostic],
    context: usize,
    show_line_numbers: bool,
) -> String {
    if diagnostics.is_empty() {
        return format!("No diagnostics found for {}", path.display());
    }

    let mut sorted: Vec<_> = diagnostics.iter().collect();
    sorted.sort_by_key(|d| (d.range.start.line, d.range.start.character));

    let mut out = format!("Diagnostics for {} ({}):\n\n", path.display(), sorted.len());
    for (i, diagnostic) in sorted.iter().enumerate() {
        let _ = write!(
            out,
            "{}. {} at {}",
            i + 1,
            severity_label(diagnostic.severity),
            UserRange::from_lsp(diagnostic.range)
        );
        if let Some(source) = &diagnostic.source {
            let _ = write!(out, " [{source}]");
        }
        match &diagnostic.code {
            Some(NumberOrString::Number(code)) => {
                let _ = write!(out, " ({code})");
            }
            Some(NumberOrString::String(code)) => {
                let _ = write!(out, " ({code})");
            }
            None => {}
        }
        let _ = writeln!(out, ": {}", diagnostic.message);
        out.push_str(&context_lines(
            content,
            diagnostic.range.start.line + 1,
            context,
            show_line_numbers,
        ));
        out.push('\n');
    }
    out
}

// ---------------------------------------------------------------------------
// hover
// ---------------------------------------------------------------------------

fn marked_string_text(marked: MarkedString) -> String {
    match marked {
        MarkedString::String(s) => s,
        MarkedString::LanguageString(ls) => format!("```{}\n{}\n```", ls.language, ls.value),
    }
}

/// Extracts markdown text from `MarkupContent` or marked strings.
fn hover_text(contents: HoverContents) -> String {
    match contents {
        HoverContents::Scalar(marked) => marked_string_text(marked),
        HoverContents::Array(marked) => marked
            .into_iter()
            .map(marked_string_text)
            .collect::<Vec<_>>()
            .join("\n\n"),
        HoverContents::Markup(markup) => markup.value,
    }
}

/// Hover contents as plain text.
pub fn format_hover(hover: Option<Hover>) -> String {
    let text = hover.map(|h| hover_text(h.contents)).unwrap_or_default();
    if text.trim().is_empty() {
        "No hover information available.".to_string()
    } else {
        text
    }
}

// ---------------------------------------------------------------------------
// document symbols
// ---------------------------------------------------------------------------

fn tree_indent(depth: usize) -> String {
    if depth == 0 {
        String::new()
    } else {
        format!("{}├── ", "│   ".repeat(depth - 1))
    }
}

fn format_nested_symbols(out: &mut String, symbols: &[DocumentSymbol], depth: usize) {
    for symbol in symbols {
        let _ = write!(
            out,
            "{}{} {}",
            tree_indent(depth),
            symbol_kind_to_string(symbol.kind),
            symbol.name
        );
        if let Some(detail) = symbol.detail.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(out, " ({detail})");
        }
        let _ = writeln!(out, " [{}]", UserRange::from_lsp(symbol.range));
        if let Some(children) = &symbol.children {
            format_nested_symbols(out, children, depth + 1);
        }
    }
}

fn format_flat_symbols(out: &mut String, symbols: &[SymbolInformation]) {
    for symbol in symbols {
        let _ = write!(
            out,
            "• {} {}",
            symbol_kind_to_string(symbol.kind),
            symbol.name
        );
        if let Some(container) = symbol.container_name.as_deref().filter(|c| !c.is_empty()) {
            let _ = write!(out, " (in {container})");
        }
        let _ = writeln!(out, " [{}]", UserRange::from_lsp(symbol.location.range));
    }
}

/// Indented outline; flat `SymbolInformation` answers are listed as is.
pub fn format_document_symbols(path: &Path, response: Option<DocumentSymbolResponse>) -> String {
    let mut body = String::new();
    match response {
        Some(DocumentSymbolResponse::Nested(symbols)) => {
            format_nested_symbols(&mut body, &symbols, 0);
        }
        Some(DocumentSymbolResponse::Flat(symbols)) => format_flat_symbols(&mut body, &symbols),
        None => {}
    }
    if body.is_empty() {
        return "No symbols found".to_string();
    }
    format!("Document Symbols for {}:\n\n{body}", path.display())
}

// ---------------------------------------------------------------------------
// call hierarchy
// ---------------------------------------------------------------------------

fn describe_item(item: &CallHierarchyItem) -> String {
    let mut out = item.name.clone();
    if let Some(detail) = item.detail.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(out, " ({detail})");
    }
    let _ = write!(
        out,
        " at {}:{}",
        display_uri(&item.uri),
        item.selection_range.start.line + 1
    );
    out
}

fn call_sites(ranges: &[Range]) -> String {
    ranges.iter().map(start_of).collect::<Vec<_>>().join(", ")
}

/// Callers of `item` with their call sites.
pub fn format_incoming_calls(item: &CallHierarchyItem, calls: &[CallHierarchyIncomingCall]) -> String {
    if calls.is_empty() {
        return "No incoming calls found\n".to_string();
    }
    let mut out = format!("Incoming calls to: {}\n\n", describe_item(item));
    for (i, call) in calls.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, describe_item(&call.from));
        if !call.from_ranges.is_empty() {
            let _ = writeln!(out, "   Call sites: {}", call_sites(&call.from_ranges));
        }
    }
    out
}

/// Functions `item` calls.
pub fn format_outgoing_calls(item: &CallHierarchyItem, calls: &[CallHierarchyOutgoingCall]) -> String {
    if calls.is_empty() {
        return "No outgoing calls found\n".to_string();
    }
    let mut out = format!("Outgoing calls from: {}\n\n", describe_item(item));
    for (i, call) in calls.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, describe_item(&call.to));
        if !call.from_ranges.is_empty() {
            let _ = writeln!(out, "   Called at: {}", call_sites(&call.from_ranges));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// signature help
// ---------------------------------------------------------------------------

fn documentation_text(documentation: &Documentation) -> &str {
    match documentation {
        Documentation::String(s) => s,
        Documentation::MarkupContent(markup) => &markup.value,
    }
}

/// Offsets in a parameter label count UTF-16 code units.
fn parameter_label(signature_label: &str, label: &ParameterLabel) -> String {
    match label {
        ParameterLabel::Simple(s) => s.clone(),
        ParameterLabel::LabelOffsets([start, end]) => {
            let units: Vec<u16> = signature_label.encode_utf16().collect();
            let start = (*start as usize).min(units.len());
            let end = (*end as usize).clamp(start, units.len());
            String::from_utf16_lossy(&units[start..end])
        }
    }
}

/// Renders signature help; `line_text` is the source line shown when the
/// server has nothing to offer.
pub fn format_signature_help(help: Option<SignatureHelp>, line_text: &str) -> String {
    let help = match help {
        Some(help) if !help.signatures.is_empty() => help,
        _ => {
            return format!(
                "No signature help available for this position on the following line:\n{line_text}"
            );
        }
    };

    let active = (help.active_signature.unwrap_or(0) as usize).min(help.signatures.len() - 1);
    let mut out = String::from("Signature Help:\n\n");
    for (i, signature) in help.signatures.iter().enumerate() {
        let prefix = if i == active { "▶ " } else { "  " };
        let _ = writeln!(out, "{prefix}{}", signature.label);
    }

    let signature = &help.signatures[active];
    if let Some(parameters) = signature.parameters.as_deref().filter(|p| !p.is_empty()) {
        let active_parameter = signature.active_parameter.or(help.active_parameter);
        out.push_str("\nParameters:\n");
        for (i, parameter) in parameters.iter().enumerate() {
            let marker = if active_parameter == Some(i as u32) {
                ACTIVE_MARKER
            } else {
                " "
            };
            let _ = write!(
                out,
                "  {marker} {}",
                parameter_label(&signature.label, &parameter.label)
            );
            if let Some(doc) = parameter.documentation.as_ref().map(documentation_text) {
                let _ = write!(out, " - {doc}");
            }
            out.push('\n');
        }
    }

    if let Some(doc) = signature.documentation.as_ref().map(documentation_text) {
        let _ = writeln!(out, "\nDocumentation:\n{doc}");
    }

    if help.signatures.len() > 1 {
        let _ = writeln!(
            out,
            "\nShowing {} of {} signatures ({ACTIVE_MARKER} marks active signature/parameter)",
            active + 1,
            help.signatures.len()
        );
    }
    out
}

// ---------------------------------------------------------------------------
// code actions
// ---------------------------------------------------------------------------

/// Display label for a code action kind, e.g. `Refactor.Inline`.
pub fn format_code_action_kind(kind: Option<&str>) -> String {
    const KNOWN: &[(&str, &str)] = &[
        ("quickfix", "QuickFix"),
        ("refactor.extract", "Refactor.Extract"),
        ("refactor.inline", "Refactor.Inline"),
        ("refactor.rewrite", "Refactor.Rewrite"),
        ("refactor", "Refactor"),
        ("source.organizeImports", "Source.OrganizeImports"),
        ("source.fixAll", "Source.FixAll"),
        ("source", "Source"),
    ];
    let Some(kind) = kind.filter(|k| !k.is_empty()) else {
        return "Unknown".to_string();
    };
    KNOWN
        .iter()
        .find(|(prefix, _)| kind.starts_with(prefix))
        .map_or_else(|| kind.to_string(), |(_, label)| (*label).to_string())
}

/// Numbered list of actions and bare commands.
pub fn format_code_actions(entries: &[CodeActionEntry]) -> String {
    if entries.is_empty() {
        return "No code actions available".to_string();
    }

    let blocks: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let n = i + 1;
            match entry {
                CodeActionEntry::Action(action) => {
                    let kind = format_code_action_kind(action.kind.as_ref().map(|k| k.as_str()));
                    let mut block = format!("{n}. [{kind}] {}\n", action.title);
                    if let Some(command) = &action.command {
                        let _ = writeln!(block, "   Command: {}", command.command);
                    }
                    block
                }
                CodeActionEntry::Command(command) => {
                    format!("{n}. [Command] {}\n   Command: {}\n", command.title, command.command)
                }
                CodeActionEntry::Unrecognized(_) => format!("{n}. Unknown action type\n"),
            }
        })
        .collect();

    format!(
        "Code Actions ({} available):\n\n{}",
        entries.len(),
        blocks.join("\n")
    )
}

// ---------------------------------------------------------------------------
// code lenses and rename
// ---------------------------------------------------------------------------

/// Numbered lens listing; the numbers are what `execute_codelens` takes.
pub fn format_code_lenses(path: &Path, lenses: &[CodeLens]) -> String {
    if lenses.is_empty() {
        return format!("No code lenses found in {}", path.display());
    }

    let mut out = format!("Code Lenses in {} ({}):\n\n", path.display(), lenses.len());
    for (i, lens) in lenses.iter().enumerate() {
        let range = UserRange::from_lsp(lens.range);
        match &lens.command {
            Some(command) => {
                let _ = writeln!(out, "{}. {range}: {}", i + 1, command.title);
                let _ = writeln!(out, "   Command: {}", command.command);
                if let Some(arguments) = command.arguments.as_ref().filter(|a| !a.is_empty()) {
                    let arguments: Vec<String> =
                        arguments.iter().map(ToString::to_string).collect();
                    let _ = writeln!(out, "   Arguments: {}", arguments.join(", "));
                }
            }
            None => {
                let _ = writeln!(out, "{}. {range}: (unresolved)", i + 1);
            }
        }
    }
    out
}

/// Summary of an applied rename: edits per file, files in the order given.
pub fn format_rename(new_name: &str, files: &[(PathBuf, usize)]) -> String {
    let total: usize = files.iter().map(|(_, edits)| edits).sum();
    let mut out = format!(
        "Successfully renamed symbol to '{new_name}': {total} edit(s) in {} file(s)\n",
        files.len()
    );
    for (path, edits) in files {
        let _ = writeln!(out, "- {}: {edits} edit(s)", path.display());
    }
    out
}

// ---------------------------------------------------------------------------
// completions
// ---------------------------------------------------------------------------

/// Display name of a completion kind.
pub fn completion_kind_to_string(kind: CompletionItemKind) -> &'static str {
    match kind {
        CompletionItemKind::TEXT => "Text",
        CompletionItemKind::METHOD => "Method",
        CompletionItemKind::FUNCTION => "Function",
        CompletionItemKind::CONSTRUCTOR => "Constructor",
        CompletionItemKind::FIELD => "Field",
        CompletionItemKind::VARIABLE => "Variable",
        CompletionItemKind::CLASS => "Class",
        CompletionItemKind::INTERFACE => "Interface",
        CompletionItemKind::MODULE => "Module",
        CompletionItemKind::PROPERTY => "Property",
        CompletionItemKind::UNIT => "Unit",
        CompletionItemKind::VALUE => "Value",
        CompletionItemKind::ENUM => "Enum",
        CompletionItemKind::KEYWORD => "Keyword",
        CompletionItemKind::SNIPPET => "Snippet",
        CompletionItemKind::COLOR => "Color",
        CompletionItemKind::FILE => "File",
        CompletionItemKind::REFERENCE => "Reference",
        CompletionItemKind::FOLDER => "Folder",
        CompletionItemKind::ENUM_MEMBER => "EnumMember",
        CompletionItemKind::CONSTANT => "Constant",
        CompletionItemKind::STRUCT => "Struct",
        CompletionItemKind::EVENT => "Event",
        CompletionItemKind::OPERATOR => "Operator",
        CompletionItemKind::TYPE_PARAMETER => "TypeParameter",
        _ => "Unknown",
    }
}

/// First line of a documentation string, cut to a readable length.
fn short_doc(doc: &str) -> String {
    let first = doc.lines().next().unwrap_or_default();
    if first.chars().count() > MAX_DOC_CHARS {
        let cut: String = first.chars().take(MAX_DOC_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        first.to_string()
    }
}

/// Up to `limit` items, ordered by `sortText` (the label when absent).
pub fn format_completions(response: Option<CompletionResponse>, limit: usize) -> String {
    let mut items: Vec<CompletionItem> = match response {
        Some(CompletionResponse::Array(items)) => items,
        Some(CompletionResponse::List(list)) => list.items,
        None => Vec::new(),
    };
    if items.is_empty() {
        return "No completions available".to_string();
    }

    items.sort_by(|a, b| {
        let key_a = a.sort_text.as_deref().unwrap_or(&a.label);
        let key_b = b.sort_text.as_deref().unwrap_or(&b.label);
        key_a.cmp(key_b)
    });

    let total = items.len();
    let shown = limit.min(total);
    let mut out = format!("Completions ({shown} of {total}):\n\n");
    for (i, item) in items.iter().take(shown).enumerate() {
        let kind = item.kind.map_or("Unknown", completion_kind_to_string);
        let _ = write!(out, "{}. [{kind}] {}", i + 1, item.label);
        if let Some(detail) = item.detail.as_deref().filter(|d| !d.is_empty()) {
            let _ = write!(out, "\n   Type: {detail}");
        }
        if let Some(doc) = item.documentation.as_ref().map(documentation_text) {
            let doc = short_doc(doc);
            if !doc.is_empty() {
                let _ = write!(out, "\n   Doc: {doc}");
            }
        }
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use lsp_types::{
        CodeAction, CodeActionKind, Command, CompletionList, MarkupContent, MarkupKind,
        ParameterInformation, Position, SignatureInformation, SymbolKind,
    };

    use super::*;

    fn range(sl: u32, sc: u32, el: u32, ec: u32) -> Range {
        Range::new(Position::new(sl, sc), Position::new(el, ec))
    }

    fn item(name: &str, uri: &str, line: u32, detail: Option<&str>) -> CallHierarchyItem {
        CallHierarchyItem {
            name: name.to_string(),
            kind: SymbolKind::FUNCTION,
            tags: None,
            detail: detail.map(String::from),
            uri: Url::parse(uri).unwrap(),
            range: range(line, 0, line + 2, 1),
            selection_range: range(line, 3, line, 3 + name.len() as u32),
            data: None,
        }
    }

    #[test]
    fn test_context_lines_marks_target() {
        let content = "a\nb\nc\nd\ne";
        assert_eq!(
            context_lines(content, 3, 1, true),
            "     2 | b\n>    3 | c\n     4 | d\n"
        );
        assert_eq!(context_lines(content, 1, 0, false), "> a\n");
        assert_eq!(context_lines(content, 99, 2, true), "");
    }

    #[test]
    fn test_definitions_layout() {
        let lookup = DefinitionLookup::Found(vec![ResolvedDefinition {
            symbol: "add".into(),
            kind: SymbolKind::FUNCTION,
            container_name: Some("math".into()),
            path: PathBuf::from("/ws/src/lib.rs"),
            range: range(2, 0, 4, 1),
            text: "3|fn add() {\n4|}\n".into(),
        }]);
        let text = format_definitions("add", &lookup);
        assert!(text.starts_with("---\n\nSymbol: add\nFile: /ws/src/lib.rs\nKind: Function\n"));
        assert!(text.contains("Container Name: math\n"));
        assert!(text.contains("Range: L3:C1 - L5:C2\n\n3|fn add() {"));
        assert_eq!(
            format_definitions("nope", &DefinitionLookup::NotFound),
            "nope not found"
        );
    }

    #[test]
    fn test_references_grouped_and_sorted() {
        let a = Url::parse("file:///ws/a.rs").unwrap();
        let b = Url::parse("file:///ws/b.rs").unwrap();
        let grouped = group_by_file(vec![
            Location::new(b.clone(), range(4, 0, 4, 3)),
            Location::new(a.clone(), range(9, 2, 9, 5)),
            Location::new(a.clone(), range(1, 0, 1, 3)),
        ]);
        assert_eq!(grouped.keys().cloned().collect::<Vec<_>>(), vec![a.clone(), b]);

        let section = format_file_references(Path::new("/ws/a.rs"), None, &grouped[&a], 1);
        assert!(section.contains("References in File: 2\n"));
        assert!(section.contains("At: L2:C1, L10:C3\n"));
    }

    #[test]
    fn test_diagnostics_layout() {
        let diagnostic = Diagnostic {
            range: range(1, 4, 1, 9),
            severity: Some(DiagnosticSeverity::ERROR),
            code: Some(NumberOrString::String("E0425".into())),
            source: Some("mockls".into()),
            message: "cannot find value".into(),
            ..Default::default()
        };
        let text = format_diagnostics(
            Path::new("/ws/main.rs"),
            "fn main() {\n    ERROR\n}\n",
            &[diagnostic],
            1,
            true,
        );
        assert!(text.starts_with("Diagnostics for /ws/main.rs (1):\n\n"));
        assert!(text.contains("1. ERROR at L2:C5 - L2:C10 [mockls] (E0425): cannot find value\n"));
        assert!(text.contains(">    2 |     ERROR\n"));
        assert_eq!(
            format_diagnostics(Path::new("/ws/main.rs"), "", &[], 1, true),
            "No diagnostics found for /ws/main.rs"
        );
    }

    #[test]
    fn test_hover_variants() {
        let hover = Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value: "fn add(a: i32) -> i32".into(),
            }),
            range: None,
        };
        assert_eq!(format_hover(Some(hover)), "fn add(a: i32) -> i32");
        assert_eq!(format_hover(None), "No hover information available.");
    }

    #[test]
    #[allow(deprecated)]
    fn test_nested_symbol_tree() {
        let child = DocumentSymbol {
            name: "x".into(),
            detail: Some("i32".into()),
            kind: SymbolKind::FIELD,
            tags: None,
            deprecated: None,
            range: range(1, 4, 1, 10),
            selection_range: range(1, 4, 1, 5),
            children: None,
        };
        let parent = DocumentSymbol {
            name: "Point".into(),
            detail: None,
            kind: SymbolKind::STRUCT,
            tags: None,
            deprecated: None,
            range: range(0, 0, 2, 1),
            selection_range: range(0, 7, 0, 12),
            children: Some(vec![child]),
        };
        let text = format_document_symbols(
            Path::new("/ws/lib.rs"),
            Some(DocumentSymbolResponse::Nested(vec![parent])),
        );
        assert_eq!(
            text,
            "Document Symbols for /ws/lib.rs:\n\n\
             Struct Point [L1:C1 - L3:C2]\n\
             ├── Field x (i32) [L2:C5 - L2:C11]\n"
        );
        assert_eq!(
            format_document_symbols(Path::new("/ws/lib.rs"), None),
            "No symbols found"
        );
        assert_eq!(tree_indent(3), "│   │   ├── ");
    }

    #[test]
    fn test_call_hierarchy_layout() {
        let target = item("helper", "file:///ws/lib.rs", 9, Some("fn()"));
        let caller = item("main", "file:///ws/main.rs", 0, None);
        let incoming = vec![CallHierarchyIncomingCall {
            from: caller,
            from_ranges: vec![range(1, 4, 1, 10), range(3, 4, 3, 10)],
        }];
        let text = format_incoming_calls(&target, &incoming);
        assert!(text.starts_with("Incoming calls to: helper (fn()) at /ws/lib.rs:10\n\n"));
        assert!(text.contains("1. main at /ws/main.rs:1\n   Call sites: L2:C5, L4:C5\n"));
        assert_eq!(format_outgoing_calls(&target, &[]), "No outgoing calls found\n");
    }

    #[test]
    fn test_signature_help_marks_active_parameter() {
        let label = "fn add(a: i32, b: i32)";
        let help = SignatureHelp {
            signatures: vec![
                SignatureInformation {
                    label: label.into(),
                    documentation: Some(Documentation::String("Adds.".into())),
                    parameters: Some(vec![
                        ParameterInformation {
                            label: ParameterLabel::LabelOffsets([7, 13]),
                            documentation: None,
                        },
                        ParameterInformation {
                            label: ParameterLabel::Simple("b: i32".into()),
                            documentation: Some(Documentation::String("rhs".into())),
                        },
                    ]),
                    active_parameter: None,
                },
                SignatureInformation {
                    label: "fn add(a: i64)".into(),
                    documentation: None,
                    parameters: None,
                    active_parameter: None,
                },
            ],
            active_signature: Some(0),
            active_parameter: Some(1),
        };
        let text = format_signature_help(Some(help), "add(1, 2)");
        assert!(text.starts_with("Signature Help:\n\n▶ fn add(a: i32, b: i32)\n  fn add(a: i64)\n"));
        assert!(text.contains("\nParameters:\n    a: i32\n  ▶ b: i32 - rhs\n"));
        assert!(text.contains("\nDocumentation:\nAdds.\n"));
        assert!(text.contains("Showing 1 of 2 signatures"));

        let none = format_signature_help(None, "let x = 1;");
        assert!(none.ends_with("following line:\nlet x = 1;"));
    }

    #[test]
    fn test_code_action_kinds() {
        assert_eq!(format_code_action_kind(Some("quickfix")), "QuickFix");
        assert_eq!(
            format_code_action_kind(Some("refactor.extract.function")),
            "Refactor.Extract"
        );
        assert_eq!(format_code_action_kind(Some("refactor.move")), "Refactor");
        assert_eq!(format_code_action_kind(Some("custom.kind")), "custom.kind");
        assert_eq!(format_code_action_kind(None), "Unknown");
    }

    #[test]
    fn test_code_actions_layout() {
        let entries = vec![
            CodeActionEntry::Action(CodeAction {
                title: "Add import".into(),
                kind: Some(CodeActionKind::QUICKFIX),
                ..Default::default()
            }),
            CodeActionEntry::Command(Command::new("Run test".into(), "mock.run".into(), None)),
            CodeActionEntry::Unrecognized(serde_json::json!({"x": 1})),
        ];
        assert_eq!(
            format_code_actions(&entries),
            "Code Actions (3 available):\n\n\
             1. [QuickFix] Add import\n\n\
             2. [Command] Run test\n   Command: mock.run\n\n\
             3. Unknown action type\n"
        );
        assert_eq!(format_code_actions(&[]), "No code actions available");
    }

    #[test]
    fn test_code_lenses_layout() {
        let lenses = [
            CodeLens {
                range: range(0, 0, 0, 10),
                command: Some(Command {
                    title: "Run test".into(),
                    command: "test.run".into(),
                    arguments: Some(vec![serde_json::json!("add")]),
                }),
                data: None,
            },
            CodeLens {
                range: range(4, 0, 4, 5),
                command: None,
                data: None,
            },
        ];
        let text = format_code_lenses(Path::new("/ws/lib.rs"), &lenses);
        assert_eq!(
            text,
            "Code Lenses in /ws/lib.rs (2):\n\n\
             1. L1:C1 - L1:C11: Run test\n   Command: test.run\n   Arguments: \"add\"\n\
             2. L5:C1 - L5:C6: (unresolved)\n"
        );
        assert_eq!(
            format_code_lenses(Path::new("/ws/lib.rs"), &[]),
            "No code lenses found in /ws/lib.rs"
        );
    }

    #[test]
    fn test_rename_summary() {
        let text = format_rename(
            "sum",
            &[(PathBuf::from("/ws/a.rs"), 2), (PathBuf::from("/ws/b.rs"), 1)],
        );
        assert_eq!(
            text,
            "Successfully renamed symbol to 'sum': 3 edit(s) in 2 file(s)\n\
             - /ws/a.rs: 2 edit(s)\n- /ws/b.rs: 1 edit(s)\n"
        );
    }

    #[test]
    fn test_completions_sorted_and_limited() {
        let long_doc = "x".repeat(150);
        let items = vec![
            CompletionItem {
                label: "zeta".into(),
                sort_text: Some("0".into()),
                kind: Some(CompletionItemKind::FUNCTION),
                detail: Some("fn()".into()),
                documentation: Some(Documentation::String(format!("{long_doc}\nmore"))),
                ..Default::default()
            },
            CompletionItem {
                label: "alpha".into(),
                kind: Some(CompletionItemKind::VARIABLE),
                ..Default::default()
            },
            CompletionItem {
                label: "beta".into(),
                ..Default::default()
            },
        ];
        let text = format_completions(
            Some(CompletionResponse::List(CompletionList {
                is_incomplete: false,
                items,
            })),
            2,
        );
        assert!(text.starts_with("Completions (2 of 3):\n\n1. [Function] zeta\n   Type: fn()\n"));
        assert!(text.contains(&format!("   Doc: {}...\n\n", "x".repeat(97))));
        assert!(text.contains("2. [Variable] alpha\n\n"));
        assert!(!text.contains("beta"));
        assert_eq!(format_completions(None, 5), "No completions available");
    }
}
