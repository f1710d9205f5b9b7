//! Edits applied to a file's text: whole-line edits from the `edit_file`
//! tool, and LSP text edits from a server's `WorkspaceEdit`.

use std::collections::BTreeMap;

use lsp_types::{
    DocumentChangeOperation, DocumentChanges, OneOf, Position, TextEdit, Url, WorkspaceEdit,
};

use crate::error::ToolError;

use super::tools::LineEdit;

/// What an applied batch of edits changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditSummary {
    /// Edits applied.
    pub edits: usize,
    /// Original lines replaced or deleted.
    pub lines_removed: usize,
    /// Lines written in their place.
    pub lines_added: usize,
}

impl std::fmt::Display for EditSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Successfully applied {} edit(s): {} line(s) removed, {} line(s) added",
            self.edits, self.lines_removed, self.lines_added
        )
    }
}

/// Applies `edits` to `content`.
///
/// Line numbers are 1-indexed and inclusive, and all refer to the original
/// text. A `start_line` one past the last line appends. The line ending of
/// the original (`\n` or `\r\n`) and its trailing newline are kept.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] for out-of-range or overlapping
/// edits; nothing is applied in that case.
pub fn apply_line_edits(content: &str, edits: &[LineEdit]) -> Result<(String, EditSummary), ToolError> {
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let trailing_newline = content.is_empty() || content.ends_with('\n');
    let mut lines: Vec<String> = content.lines().map(String::from).collect();
    let line_count = lines.len();

    let mut ordered: Vec<&LineEdit> = edits.iter().collect();
    ordered.sort_by_key(|e| e.start_line);

    let mut previous_end = 0u32;
    for edit in &ordered {
        if edit.start_line == 0 {
            return Err(ToolError::InvalidArguments(
                "line numbers are 1-indexed; startLine must be at least 1".into(),
            ));
        }
        if edit.end_line < edit.start_line {
            return Err(ToolError::InvalidArguments(format!(
                "endLine {} is before startLine {}",
                edit.end_line, edit.start_line
            )));
        }
        if edit.start_line as usize > line_count + 1 {
            return Err(ToolError::InvalidArguments(format!(
                "startLine {} is past the end of the file ({line_count} lines)",
                edit.start_line
            )));
        }
        if edit.start_line <= previous_end {
            return Err(ToolError::InvalidArguments(format!(
                "edit starting at line {} overlaps the previous edit",
                edit.start_line
            )));
        }
        previous_end = edit.end_line;
    }

    let mut summary = EditSummary {
        edits: ordered.len(),
        lines_removed: 0,
        lines_added: 0,
    };

    // Bottom-up, so earlier line numbers stay valid.
    for edit in ordered.iter().rev() {
        let start = edit.start_line as usize - 1;
        let end = (edit.end_line as usize).min(line_count).max(start);
        let replacement: Vec<String> = if edit.new_text.is_empty() {
            Vec::new()
        } else {
            edit.new_text.lines().map(String::from).collect()
        };
        summary.lines_removed += end - start;
        summary.lines_added += replacement.len();
        lines.splice(start..end, replacement);
    }

    let mut text = lines.join(newline);
    if trailing_newline && !lines.is_empty() {
        text.push_str(newline);
    }
    Ok((text, summary))
}

/// Text edits of a `WorkspaceEdit`, grouped per document in URI order.
///
/// `documentChanges` wins over `changes` when a server sends both. Edits of
/// the same document keep the order the server gave them.
///
/// # Errors
///
/// Returns [`ToolError::Edit`] if the edit creates, renames or deletes files.
pub fn workspace_edit_files(
    edit: WorkspaceEdit,
) -> Result<BTreeMap<Url, Vec<TextEdit>>, ToolError> {
    let mut files: BTreeMap<Url, Vec<TextEdit>> = BTreeMap::new();

    let Some(document_changes) = edit.document_changes else {
        for (uri, edits) in edit.changes.unwrap_or_default() {
            files.entry(uri).or_default().extend(edits);
        }
        return Ok(files);
    };

    let document_edits = match document_changes {
        DocumentChanges::Edits(edits) => edits,
        DocumentChanges::Operations(operations) => operations
            .into_iter()
            .map(|operation| match operation {
                DocumentChangeOperation::Edit(edit) => Ok(edit),
                DocumentChangeOperation::Op(op) => Err(ToolError::Edit(format!(
                    "file operations are not supported: {op:?}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    for document in document_edits {
        let edits = document.edits.into_iter().map(|edit| match edit {
            OneOf::Left(edit) => edit,
            OneOf::Right(annotated) => annotated.text_edit,
        });
        files
            .entry(document.text_document.uri)
            .or_default()
            .extend(edits);
    }
    Ok(files)
}

/// Byte offset of an LSP position (UTF-16 columns) in `content`.
///
/// A column past the end of its line clamps to the line end, before any
/// `\r\n`. `None` if the line does not exist.
fn byte_offset(content: &str, position: Position) -> Option<usize> {
    let mut line_start = 0;
    for _ in 0..position.line {
        line_start += content[line_start..].find('\n')? + 1;
    }
    let rest = &content[line_start..];
    let line = &rest[..rest.find('\n').unwrap_or(rest.len())];
    let line = line.strip_suffix('\r').unwrap_or(line);

    let target = position.character as usize;
    let mut units = 0;
    for (index, ch) in line.char_indices() {
        if units >= target {
            return Some(line_start + index);
        }
        units += ch.len_utf16();
    }
    Some(line_start + line.len())
}

/// Applies LSP text edits to `content`.
///
/// All ranges refer to the original text. Edits sharing a start position
/// are inserted in the order given.
///
/// # Errors
///
/// Returns [`ToolError::Edit`] for ranges outside the text, reversed ranges
/// or overlapping edits; nothing is applied in that case.
pub fn apply_text_edits(content: &str, edits: &[TextEdit]) -> Result<String, ToolError> {
    let mut spans = Vec::with_capacity(edits.len());
    for edit in edits {
        let locate = |position: Position| {
            byte_offset(content, position).ok_or_else(|| {
                ToolError::Edit(format!(
                    "line {} is past the end of the document",
                    position.line + 1
                ))
            })
        };
        let start = locate(edit.range.start)?;
        let end = locate(edit.range.end)?;
        if end < start {
            return Err(ToolError::Edit(format!(
                "edit range ends before it starts: {:?}",
                edit.range
            )));
        }
        spans.push((start, end, edit.new_text.as_str()));
    }
    // Stable, so same-position inserts keep their order.
    spans.sort_by_key(|&(start, end, _)| (start, end));

    for pair in spans.windows(2) {
        if pair[1].0 < pair[0].1 {
            return Err(ToolError::Edit(format!(
                "overlapping edits at byte offsets {}..{} and {}..{}",
                pair[0].0, pair[0].1, pair[1].0, pair[1].1
            )));
        }
    }

    let mut text = String::with_capacity(content.len());
    let mut cursor = 0;
    for (start, end, new_text) in spans {
        text.push_str(&content[cursor..start]);
        text.push_str(new_text);
        cursor = end;
    }
    text.push_str(&content[cursor..]);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use lsp_types::{
        AnnotatedTextEdit, OptionalVersionedTextDocumentIdentifier, Range, RenameFile,
        ResourceOp, TextDocumentEdit,
    };

    use super::*;

    fn text_edit(start: (u32, u32), end: (u32, u32), new_text: &str) -> TextEdit {
        TextEdit {
            range: Range::new(Position::new(start.0, start.1), Position::new(end.0, end.1)),
            new_text: new_text.to_string(),
        }
    }

    fn url(path: &str) -> Url {
        Url::parse(&format!("file:///ws/{path}")).unwrap()
    }

    #[test]
    fn test_text_edits_apply_against_original_positions() {
        let content = "fn add() {}\nfn main() { add(); add(); }\n";
        let edits = [
            text_edit((1, 19), (1, 22), "sum"),
            text_edit((0, 3), (0, 6), "sum"),
            text_edit((1, 12), (1, 15), "sum"),
        ];
        let text = apply_text_edits(content, &edits).unwrap();
        assert_eq!(text, "fn sum() {}\nfn main() { sum(); sum(); }\n");
    }

    #[test]
    fn test_text_edit_columns_are_utf16() {
        // '𝕏' is two UTF-16 units and four bytes.
        let content = "let 𝕏 = old;\n";
        let text = apply_text_edits(content, &[text_edit((0, 9), (0, 12), "new")]).unwrap();
        assert_eq!(text, "let 𝕏 = new;\n");
    }

    #[test]
    fn test_text_edit_past_line_end_clamps_and_inserts_keep_order() {
        let content = "a\r\nb";
        let edits = [
            text_edit((0, 40), (0, 40), "1"),
            text_edit((0, 40), (0, 40), "2"),
            text_edit((1, 0), (1, 1), "B"),
        ];
        assert_eq!(apply_text_edits(content, &edits).unwrap(), "a12\r\nB");
    }

    #[test]
    fn test_text_edit_errors() {
        let content = "abc\n";
        assert!(matches!(
            apply_text_edits(content, &[text_edit((5, 0), (5, 1), "x")]),
            Err(ToolError::Edit(_))
        ));
        assert!(apply_text_edits(content, &[text_edit((0, 2), (0, 1), "x")]).is_err());
        assert!(
            apply_text_edits(
                content,
                &[text_edit((0, 0), (0, 2), "x"), text_edit((0, 1), (0, 3), "y")]
            )
            .is_err()
        );
        // Line one past a trailing newline is the end of the document.
        assert_eq!(
            apply_text_edits(content, &[text_edit((1, 0), (1, 0), "d\n")]).unwrap(),
            "abc\nd\n"
        );
    }

    #[test]
    fn test_workspace_edit_prefers_document_changes() {
        let mut changes = std::collections::HashMap::new();
        changes.insert(url("ignored.rs"), vec![text_edit((0, 0), (0, 0), "x")]);
        let edit = WorkspaceEdit {
            changes: Some(changes),
            document_changes: Some(DocumentChanges::Edits(vec![TextDocumentEdit {
                text_document: OptionalVersionedTextDocumentIdentifier {
                    uri: url("b.rs"),
                    version: Some(3),
                },
                edits: vec![
                    OneOf::Left(text_edit((0, 0), (0, 1), "b")),
                    OneOf::Right(AnnotatedTextEdit {
                        text_edit: text_edit((1, 0), (1, 1), "c"),
                        annotation_id: "rename".to_string(),
                    }),
                ],
            }])),
            change_annotations: None,
        };

        let files = workspace_edit_files(edit).unwrap();
        assert_eq!(files.len(), 1);
        let edits = &files[&url("b.rs")];
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[1].new_text, "c");
    }

    #[test]
    fn test_workspace_edit_plain_changes_and_file_operations() {
        let mut changes = std::collections::HashMap::new();
        changes.insert(url("b.rs"), vec![text_edit((0, 0), (0, 0), "b")]);
        changes.insert(url("a.rs"), vec![text_edit((0, 0), (0, 0), "a")]);
        let files = workspace_edit_files(WorkspaceEdit::new(changes)).unwrap();
        let uris: Vec<_> = files.keys().map(Url::as_str).collect();
        assert_eq!(uris, ["file:///ws/a.rs", "file:///ws/b.rs"]);

        let rename = WorkspaceEdit {
            document_changes: Some(DocumentChanges::Operations(vec![
                DocumentChangeOperation::Op(ResourceOp::Rename(RenameFile {
                    old_uri: url("a.rs"),
                    new_uri: url("c.rs"),
                    options: None,
                    annotation_id: None,
                })),
            ])),
            ..Default::default()
        };
        assert!(matches!(
            workspace_edit_files(rename),
            Err(ToolError::Edit(_))
        ));
    }

    fn edit(start_line: u32, end_line: u32, new_text: &str) -> LineEdit {
        LineEdit {
            start_line,
            end_line,
            new_text: new_text.to_string(),
        }
    }

    #[test]
    fn test_replace_delete_and_append() {
        let content = "one\ntwo\nthree\nfour\n";
        let (text, summary) = apply_line_edits(
            content,
            &[edit(4, 4, "FOUR\nFIVE"), edit(2, 3, ""), edit(5, 5, "six")],
        )
        .unwrap();
        assert_eq!(text, "one\nFOUR\nFIVE\nsix\n");
        assert_eq!(
            summary,
            EditSummary {
                edits: 3,
                lines_removed: 3,
                lines_added: 3
            }
        );
    }

    #[test]
    fn test_keeps_crlf_and_missing_trailing_newline() {
        let (text, _) = apply_line_edits("a\r\nb\r\nc", &[edit(2, 2, "B")]).unwrap();
        assert_eq!(text, "a\r\nB\r\nc");
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let content = "a\nb\n";
        assert!(apply_line_edits(content, &[edit(0, 1, "x")]).is_err());
        assert!(apply_line_edits(content, &[edit(2, 1, "x")]).is_err());
        assert!(apply_line_edits(content, &[edit(9, 9, "x")]).is_err());
        assert!(apply_line_edits(content, &[edit(1, 2, "x"), edit(2, 2, "y")]).is_err());
    }

    #[test]
    fn test_edit_into_empty_file() {
        let (text, summary) = apply_line_edits("", &[edit(1, 1, "fn main() {}")]).unwrap();
        assert_eq!(text, "fn main() {}\n");
        assert_eq!(summary.lines_removed, 0);
    }
}
