//! Scriptable mock language server used by the integration tests.
//!
//! Speaks framed JSON-RPC over stdio. Answers come from an optional JSON
//! fixture file:
//!
//! ```json
//! {
//!   "responses":  { "<method>": <result> },
//!   "byUri":      { "<method>": { "<uri>": <result> } },
//!   "byPosition": { "<method>": { "<uri>:<line>:<character>": <result> } }
//! }
//! ```
//!
//! `byPosition` is consulted first, then `byUri`, then `responses`; anything
//! else answers `null`. Call hierarchy follow-ups are keyed on the item's URI
//! and selection start.
//!
//! Every `didOpen`/`didChange` publishes one diagnostic per line containing
//! `ERROR` (severity 1) or `WARN` (severity 2) unless `--no-diagnostics` is
//! given.
//!
//! `codeLens/resolve` moves a lens's `data` into its `command`, and
//! `workspace/executeCommand` answers `{executed, arguments}`.
//!
//! Extra methods for tests:
//! - `mockls/documentState {uri}`: `{open, version, text, opens}` or `null`
//! - `mockls/lastPosition`: last `textDocument/position` params seen
//! - `mockls/notify {count}`: sends `count` `mockls/tick` notifications first
//! - `mockls/replies`: replies received to our own requests
//! - `mockls/echo`: returns its params
//! - `mockls/crash`: exits immediately without answering
//!
//! `--journal <file>` appends every received method name to `file`, so tests
//! can count lifecycle messages after the process is gone.

use std::collections::HashMap;
use std::io::{BufReader, Stdin, Stdout, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::executor::block_on;
use futures::io::AllowStdIo;
use serde::Deserialize;
use serde_json::{Value, json};

use lsp_bridge::lsp::codec::{FrameReader, FrameWriter};
use lsp_bridge::lsp::protocol::{
    Incoming, NotificationMessage, RequestMessage, ResponseMessage, classify,
};

const INTERNAL_ERROR: i64 = -32603;
const METHOD_NOT_FOUND: i64 = -32601;

/// Ids for requests this server sends; far from anything a client uses.
const FIRST_SERVER_REQUEST_ID: u64 = 9000;

#[derive(Parser, Debug)]
#[command(name = "mockls", about = "Scriptable mock language server")]
struct Args {
    /// Ignore `exit` and stdin EOF; only a kill ends the process.
    #[arg(long)]
    no_exit: bool,

    /// Sleep this long before every response.
    #[arg(long, default_value_t = 0)]
    response_delay_ms: u64,

    /// Never answer requests for this method.
    #[arg(long)]
    hang_on: Vec<String>,

    /// Answer requests for this method with an internal error.
    #[arg(long)]
    fail_on: Vec<String>,

    /// Replace the advertised capabilities with this JSON object.
    #[arg(long)]
    capabilities: Option<String>,

    /// JSON fixture file with canned responses.
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Do not publish diagnostics.
    #[arg(long)]
    no_diagnostics: bool,

    /// After `initialized`, send `workspace/configuration` and friends.
    #[arg(long)]
    ask_configuration: bool,

    /// Append the method of every request and notification received to this
    /// file, one per line. Outlives the process, unlike `mockls/*` queries.
    #[arg(long)]
    journal: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Fixture {
    responses: HashMap<String, Value>,
    by_uri: HashMap<String, HashMap<String, Value>>,
    by_position: HashMap<String, HashMap<String, Value>>,
}

impl Fixture {
    fn lookup(&self, method: &str, params: &Value) -> Value {
        if let Some(key) = position_key(params)
            && let Some(found) = self.by_position.get(method).and_then(|m| m.get(&key))
        {
            return found.clone();
        }
        if let Some(uri) = params.pointer("/textDocument/uri").and_then(Value::as_str)
            && let Some(found) = self.by_uri.get(method).and_then(|m| m.get(uri))
        {
            return found.clone();
        }
        self.responses.get(method).cloned().unwrap_or(Value::Null)
    }
}

/// `<uri>:<line>:<character>` of a position request or hierarchy item.
fn position_key(params: &Value) -> Option<String> {
    let (uri, position) = if let Some(item) = params.get("item") {
        (item.get("uri")?, item.pointer("/selectionRange/start")?)
    } else {
        (params.pointer("/textDocument/uri")?, params.get("position")?)
    };
    Some(format!(
        "{}:{}:{}",
        uri.as_str()?,
        position.get("line")?.as_u64()?,
        position.get("character")?.as_u64()?
    ))
}

fn default_capabilities() -> Value {
    json!({
        "textDocumentSync": 1,
        "definitionProvider": true,
        "referencesProvider": true,
        "hoverProvider": true,
        "documentSymbolProvider": true,
        "workspaceSymbolProvider": true,
        "callHierarchyProvider": true,
        "renameProvider": true,
        "codeActionProvider": true,
        "codeLensProvider": { "resolveProvider": true },
        "executeCommandProvider": { "commands": ["mockls.run"] },
        "signatureHelpProvider": { "triggerCharacters": ["(", ","] },
        "completionProvider": { "triggerCharacters": ["."] }
    })
}

struct Document {
    version: i64,
    text: String,
    open: bool,
    /// `didOpen` notifications received for this URI.
    opens: u32,
}

struct MockServer {
    args: Args,
    fixture: Fixture,
    writer: FrameWriter<AllowStdIo<Stdout>>,
    documents: HashMap<String, Document>,
    last_position: Value,
    replies: Vec<Value>,
    next_id: u64,
    shutdown_requested: bool,
}

impl MockServer {
    fn send<T: serde::Serialize>(&mut self, message: &T) -> Result<()> {
        block_on(self.writer.write_frame(message)).context("failed to write frame")
    }

    fn notify(&mut self, method: &str, params: Value) -> Result<()> {
        self.send(&NotificationMessage::new(method, params))
    }

    fn request(&mut self, method: &str, params: Value) -> Result<()> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&RequestMessage::new(id, method, params))
    }

    fn record(&self, method: &str) -> Result<()> {
        let Some(path) = &self.args.journal else {
            return Ok(());
        };
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open journal {}", path.display()))?;
        writeln!(file, "{method}").context("failed to write journal")
    }

    fn handle(&mut self, frame: Value) -> Result<()> {
        if let Some(method) = frame.get("method").and_then(Value::as_str) {
            self.record(method)?;
        }
        match classify(frame) {
            Incoming::Request { id, method, params } => self.handle_request(id, &method, params),
            Incoming::Notification { method, params } => self.handle_notification(&method, params),
            Incoming::Response { id, outcome } => {
                let reply = match outcome {
                    Ok(result) => json!({ "id": id, "result": result }),
                    Err(error) => json!({ "id": id, "error": error.message, "code": error.code }),
                };
                self.replies.push(reply);
                Ok(())
            }
            Incoming::Invalid(reason) => {
                eprintln!("mockls: ignoring invalid frame: {reason}");
                Ok(())
            }
        }
    }

    fn handle_request(&mut self, id: Value, method: &str, params: Value) -> Result<()> {
        if self.args.hang_on.iter().any(|m| m == method) {
            eprintln!("mockls: hanging on {method}");
            return Ok(());
        }
        if self.args.response_delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.args.response_delay_ms));
        }
        if self.args.fail_on.iter().any(|m| m == method) {
            let message = format!("mockls: forced failure for {method}");
            return self.send(&ResponseMessage::err(id, INTERNAL_ERROR, message));
        }

        if params.get("position").is_some() {
            self.last_position = params.clone();
        }

        let result = match method {
            "initialize" => {
                let capabilities = match &self.args.capabilities {
                    Some(raw) => serde_json::from_str(raw).context("invalid --capabilities")?,
                    None => default_capabilities(),
                };
                json!({
                    "capabilities": capabilities,
                    "serverInfo": { "name": "mockls", "version": env!("CARGO_PKG_VERSION") }
                })
            }
            "shutdown" => {
                self.shutdown_requested = true;
                Value::Null
            }
            "mockls/documentState" => {
                let uri = params.get("uri").and_then(Value::as_str).unwrap_or_default();
                self.documents.get(uri).map_or(Value::Null, |doc| {
                    json!({
                        "open": doc.open,
                        "version": doc.version,
                        "text": doc.text,
                        "opens": doc.opens
                    })
                })
            }
            // Resolving moves the command stashed in `data` into place.
            "codeLens/resolve" => {
                let mut lens = params;
                if let Some(data) = lens.get_mut("data").map(Value::take) {
                    lens["command"] = data;
                }
                lens
            }
            "workspace/executeCommand" => json!({
                "executed": params.get("command").cloned().unwrap_or(Value::Null),
                "arguments": params.get("arguments").cloned().unwrap_or(Value::Null)
            }),
            "mockls/lastPosition" => self.last_position.clone(),
            "mockls/notify" => {
                let count = params.get("count").and_then(Value::as_u64).unwrap_or(1);
                for n in 0..count {
                    self.notify("mockls/tick", json!({ "n": n }))?;
                }
                json!(count)
            }
            "mockls/replies" => Value::Array(self.replies.clone()),
            "mockls/echo" => params,
            "mockls/crash" => {
                eprintln!("mockls: crashing on request");
                std::process::exit(3);
            }
            _ if method.starts_with("mockls/") => {
                let message = format!("unknown mockls method {method}");
                return self.send(&ResponseMessage::err(id, METHOD_NOT_FOUND, message));
            }
            _ => self.fixture.lookup(method, &params),
        };
        self.send(&ResponseMessage::ok(id, result))
    }

    fn handle_notification(&mut self, method: &str, params: Value) -> Result<()> {
        match method {
            "initialized" => {
                self.notify(
                    "window/logMessage",
                    json!({ "type": 3, "message": "mockls ready" }),
                )?;
                if self.args.ask_configuration {
                    self.request(
                        "workspace/configuration",
                        json!({ "items": [{ "section": "a" }, { "section": "b" }] }),
                    )?;
                    self.request("window/workDoneProgress/create", json!({ "token": "t" }))?;
                    self.request("mockls/unknownServerRequest", Value::Null)?;
                }
            }
            "textDocument/didOpen" => {
                let doc = &params["textDocument"];
                let uri = doc["uri"].as_str().unwrap_or_default().to_string();
                let text = doc["text"].as_str().unwrap_or_default().to_string();
                let version = doc["version"].as_i64().unwrap_or_default();
                let opens = self.documents.get(&uri).map_or(0, |d| d.opens) + 1;
                self.documents.insert(
                    uri.clone(),
                    Document {
                        version,
                        text,
                        open: true,
                        opens,
                    },
                );
                self.publish(&uri)?;
            }
            "textDocument/didChange" => {
                let uri = params
                    .pointer("/textDocument/uri")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let version = params
                    .pointer("/textDocument/version")
                    .and_then(Value::as_i64)
                    .unwrap_or_default();
                let text = params
                    .pointer("/contentChanges/0/text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if let Some(doc) = self.documents.get_mut(&uri) {
                    doc.version = version;
                    doc.text = text;
                }
                self.publish(&uri)?;
            }
            "textDocument/didClose" => {
                let uri = params
                    .pointer("/textDocument/uri")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if let Some(doc) = self.documents.get_mut(uri) {
                    doc.open = false;
                }
            }
            "exit" => {
                if self.args.no_exit {
                    eprintln!("mockls: ignoring exit");
                } else {
                    std::process::exit(if self.shutdown_requested { 0 } else { 1 });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn publish(&mut self, uri: &str) -> Result<()> {
        if self.args.no_diagnostics {
            return Ok(());
        }
        let Some(doc) = self.documents.get(uri) else {
            return Ok(());
        };
        let diagnostics = scan_diagnostics(&doc.text);
        let version = doc.version;
        self.notify(
            "textDocument/publishDiagnostics",
            json!({ "uri": uri, "version": version, "diagnostics": diagnostics }),
        )
    }
}

fn scan_diagnostics(text: &str) -> Vec<Value> {
    text.lines()
        .enumerate()
        .filter_map(|(line, content)| {
            let (marker, severity) = if let Some(at) = content.find("ERROR") {
                (at, 1)
            } else {
                (content.find("WARN")?, 2)
            };
            let word = if severity == 1 { "ERROR" } else { "WARN" };
            Some(json!({
                "range": {
                    "start": { "line": line, "character": marker },
                    "end": { "line": line, "character": marker + word.len() }
                },
                "severity": severity,
                "code": "E001",
                "source": "mockls",
                "message": format!("found {word}")
            }))
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    let fixture = match &args.fixture {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read fixture {}", path.display()))?;
            serde_json::from_str(&raw).context("invalid fixture")?
        }
        None => Fixture::default(),
    };
    eprintln!("mockls: started");

    let mut reader: FrameReader<AllowStdIo<BufReader<Stdin>>> =
        FrameReader::new(AllowStdIo::new(BufReader::new(std::io::stdin())));
    let no_exit = args.no_exit;
    let mut server = MockServer {
        args,
        fixture,
        writer: FrameWriter::new(AllowStdIo::new(std::io::stdout())),
        documents: HashMap::new(),
        last_position: Value::Null,
        replies: Vec::new(),
        next_id: FIRST_SERVER_REQUEST_ID,
        shutdown_requested: false,
    };

    loop {
        match block_on(reader.read_frame()) {
            Ok(Some(frame)) => server.handle(frame)?,
            Ok(None) => break,
            Err(e) if e.is_fatal() => {
                eprintln!("mockls: read failed: {e}");
                break;
            }
            Err(e) => eprintln!("mockls: skipping bad frame: {e}"),
        }
    }

    if no_exit {
        eprintln!("mockls: stdin closed, waiting to be killed");
        loop {
            std::thread::sleep(Duration::from_secs(3600));
        }
    }
    Ok(())
}
