//! Name-based definition and reference lookup against canned server answers.
mod common;

use common::TestWorkspace;
use lsp_bridge::error::LspError;
use lsp_bridge::lsp::resolver::{find_references, resolve_definition};
use lsp_bridge::lsp::DefinitionLookup;
use lsp_types::{Position, SymbolKind};
use serde_json::{Value, json};

const FIXTURE: &str = r#"
//- /src/lib.rs
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

pub struct Calc;

impl Calc {
    pub fn add(&self, a: i32) -> i32 {
        a
    }
}
pub fn adder() {}
"#;

/// Two real `add` definitions, a near miss and a repeated candidate.
fn responses(ws: &TestWorkspace) -> Value {
    let lib = ws.uri("src/lib.rs");
    let symbol = |name, kind, container, start: (u32, u32), end| {
        common::symbol_information(name, kind, container, &lib, start, end)
    };
    let loc = |start, end| common::location(&lib, start, end);

    let free_fn = common::position_key(&lib, 0, 7);
    let method = common::position_key(&lib, 7, 11);

    json!({
        "responses": {
            "workspace/symbol": [
                symbol("add", 12, None, (0, 7), (0, 10)),
                symbol("Calc::add", 6, Some("Calc"), (7, 11), (7, 14)),
                symbol("adder", 12, None, (11, 7), (11, 12)),
                symbol("add", 12, None, (0, 7), (0, 10))
            ]
        },
        "byPosition": {
            "textDocument/definition": {
                free_fn.clone(): loc((0, 7), (0, 10)),
                method.clone(): [loc((7, 11), (7, 14)), loc((7, 11), (7, 14))]
            },
            "textDocument/references": {
                free_fn: [loc((0, 7), (0, 10)), loc((11, 0), (11, 3))],
                method: [loc((7, 11), (7, 14)), loc((0, 7), (0, 10))]
            }
        },
        "byUri": {
            "textDocument/documentSymbol": {
                lib.as_str(): [
                    {
                        "name": "add",
                        "kind": 12,
                        "range": { "start": { "line": 0, "character": 0 }, "end": { "line": 2, "character": 1 } },
                        "selectionRange": { "start": { "line": 0, "character": 7 }, "end": { "line": 0, "character": 10 } }
                    },
                    {
                        "name": "impl Calc",
                        "kind": 19,
                        "range": { "start": { "line": 6, "character": 0 }, "end": { "line": 10, "character": 1 } },
                        "selectionRange": { "start": { "line": 6, "character": 5 }, "end": { "line": 6, "character": 9 } },
                        "children": [{
                            "name": "add",
                            "kind": 6,
                            "range": { "start": { "line": 7, "character": 4 }, "end": { "line": 9, "character": 5 } },
                            "selectionRange": { "start": { "line": 7, "character": 11 }, "end": { "line": 7, "character": 14 } }
                        }]
                    }
                ]
            }
        }
    })
}

async fn workspace(args: &[&str]) -> TestWorkspace {
    TestWorkspace::builder()
        .fixture(FIXTURE)
        .mock_args(args)
        .responses(responses)
        .build()
        .await
}

#[tokio::test]
async fn test_definitions_are_filtered_and_deduplicated() {
    let ws = workspace(&[]).await;
    let client = ws.lsp();

    let DefinitionLookup::Found(definitions) = resolve_definition(client, "add").await.unwrap()
    else {
        panic!("expected definitions for add");
    };

    assert_eq!(definitions.len(), 2, "{definitions:#?}");

    let free_fn = &definitions[0];
    assert_eq!(free_fn.symbol, "add");
    assert_eq!(free_fn.kind, SymbolKind::FUNCTION);
    assert_eq!(free_fn.path, ws.apath("src/lib.rs"));
    assert_eq!(free_fn.range.start, Position::new(0, 0));
    assert_eq!(free_fn.range.end, Position::new(2, 1));
    assert_eq!(
        free_fn.text,
        "1|pub fn add(a: i32, b: i32) -> i32 {\n2|    a + b\n3|}\n"
    );

    let method = &definitions[1];
    assert_eq!(method.symbol, "Calc::add");
    assert_eq!(method.kind, SymbolKind::METHOD);
    assert_eq!(method.container_name.as_deref(), Some("Calc"));
    assert_eq!(method.range.start, Position::new(7, 4));
    assert!(method.text.starts_with(" 8|    pub fn add(&self"), "{}", method.text);
    assert!(method.text.ends_with("10|    }\n"), "{}", method.text);
    client.close().await;
}

#[tokio::test]
async fn test_qualified_query_only_matches_exact_name() {
    let ws = workspace(&[]).await;
    let client = ws.lsp();

    let DefinitionLookup::Found(definitions) =
        resolve_definition(client, "Calc::add").await.unwrap()
    else {
        panic!("expected a definition for Calc::add");
    };
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].kind, SymbolKind::METHOD);
    client.close().await;
}

#[tokio::test]
async fn test_unknown_symbol_is_not_found() {
    let ws = workspace(&[]).await;
    let client = ws.lsp();

    let lookup = resolve_definition(client, "subtract").await.unwrap();
    assert_eq!(lookup, DefinitionLookup::NotFound);
    client.close().await;
}

#[tokio::test]
async fn test_failed_candidate_lookups_are_skipped() {
    let ws = workspace(&["--fail-on", "textDocument/definition"]).await;
    let client = ws.lsp();

    let lookup = resolve_definition(client, "add").await.unwrap();
    assert_eq!(lookup, DefinitionLookup::NotFound);
    client.close().await;
}

#[tokio::test]
async fn test_symbol_search_failure_is_an_error() {
    let ws = workspace(&["--fail-on", "workspace/symbol"]).await;
    let client = ws.lsp();

    let result = resolve_definition(client, "add").await;
    assert!(matches!(result, Err(LspError::ServerError { .. })), "{result:?}");
    client.close().await;
}

#[tokio::test]
async fn test_definition_range_used_without_document_symbols() {
    let capabilities = json!({
        "textDocumentSync": 1,
        "definitionProvider": true,
        "workspaceSymbolProvider": true
    })
    .to_string();
    let ws = workspace(&["--capabilities", &capabilities]).await;
    let client = ws.lsp();

    let DefinitionLookup::Found(definitions) =
        resolve_definition(client, "Calc::add").await.unwrap()
    else {
        panic!("expected a definition for Calc::add");
    };
    assert_eq!(definitions[0].range.start, Position::new(7, 11));
    assert_eq!(definitions[0].text, "8|    pub fn add(&self, a: i32) -> i32 {\n");
    client.close().await;
}

#[tokio::test]
async fn test_references_are_merged_across_candidates() {
    let ws = workspace(&[]).await;
    let client = ws.lsp();

    let references = find_references(client, "add").await.unwrap();
    let starts: Vec<_> = references
        .iter()
        .map(|l| (l.range.start.line, l.range.start.character))
        .collect();
    assert_eq!(starts, vec![(0, 7), (11, 0), (7, 11)]);
    assert!(references.iter().all(|l| l.uri == ws.uri("src/lib.rs")));
    client.close().await;
}
