//! Error types for the lsp-bridge runtime and tool layer.
//!
//! Errors are organized by how far they reach:
//! - [`TransportError`]: the child process and its byte streams. Fatal
//!   variants poison the whole client instance.
//! - [`LspError`]: a single request/notification exchange.
//! - [`ToolError`]: the tool layer built on top of the runtime.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the transport (child process + framed streams).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The language server process could not be spawned.
    #[error("failed to spawn language server '{command}': {reason}")]
    SpawnFailed {
        /// The command that was launched.
        command: String,
        /// Why the spawn failed.
        reason: String,
    },

    /// The peer closed its streams; no further messages can be exchanged.
    #[error("language server disconnected")]
    Disconnected,

    /// The stream ended in the middle of a frame.
    #[error("stream closed in the middle of a frame")]
    UnexpectedEof,

    /// A frame could not be parsed. The read loop drops it and continues.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Reading from or writing to the child's pipes failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Returns true when the error compromises the shared channel.
    ///
    /// Malformed frames are local to one message; everything else means the
    /// stream can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedFrame(_))
    }
}

/// Errors related to LSP client operations.
#[derive(Debug, Error)]
pub enum LspError {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The language server returned an error response.
    #[error("language server error: {message} (code: {code})")]
    ServerError {
        /// The JSON-RPC error code.
        code: i64,
        /// The error message from the language server.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// The connection was closed while the request was outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// A request to the language server timed out.
    #[error("language server request timed out after {0:?}")]
    Timeout(Duration),

    /// The initialize handshake failed.
    #[error("language server initialization failed: {0}")]
    InitializationFailed(String),

    /// A user-facing position was not 1-indexed.
    #[error("invalid position: line {line}, column {column} (both are 1-indexed)")]
    InvalidPosition {
        /// The line number.
        line: u32,
        /// The column number.
        column: u32,
    },

    /// The document was never opened, or cannot be read.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// The document was deliberately closed and is not reopened implicitly.
    #[error("document was closed: {0}")]
    DocumentClosed(String),

    /// A response could not be decoded into the expected shape.
    #[error("failed to decode language server response for {method}: {reason}")]
    ParseError {
        /// The request method.
        method: String,
        /// The decoding failure.
        reason: String,
    },
}

impl LspError {
    /// JSON-RPC code returned by servers for unknown methods.
    pub const METHOD_NOT_FOUND: i64 = -32601;

    /// Returns true if the server answered "method not found".
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, Self::ServerError { code, .. } if *code == Self::METHOD_NOT_FOUND)
    }
}

/// Errors related to tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid arguments provided to the tool.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The language server never declared support for the feature.
    #[error("{0} is not supported by this language server")]
    Unsupported(&'static str),

    /// Failed to read or write a file on disk.
    #[error("file error for {path}: {reason}")]
    File {
        /// The file path.
        path: String,
        /// The I/O failure.
        reason: String,
    },

    /// A server-produced edit that cannot be applied as given.
    #[error("cannot apply workspace edit: {0}")]
    Edit(String),

    /// LSP error during tool execution.
    #[error("LSP error: {0}")]
    Lsp(#[from] LspError),
}

/// A unified error type for the entire application.
#[derive(Debug, Error)]
pub enum Error {
    /// LSP-related error.
    #[error("LSP error: {0}")]
    Lsp(#[from] LspError),

    /// Transport-related error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Tool-related error.
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for lsp-bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = LspError::ServerError {
            code: -32601,
            message: "unhandled method textDocument/codeLens".to_string(),
            data: None,
        };
        assert_eq!(
            err.to_string(),
            "language server error: unhandled method textDocument/codeLens (code: -32601)"
        );
        assert!(err.is_method_not_found());
    }

    #[test]
    fn test_transport_error_fatality() {
        assert!(!TransportError::MalformedFrame("bad header".into()).is_fatal());
        assert!(TransportError::Disconnected.is_fatal());
        assert!(TransportError::UnexpectedEof.is_fatal());
    }

    #[test]
    fn test_error_conversion() {
        let err: LspError = TransportError::Disconnected.into();
        assert!(matches!(
            err,
            LspError::Transport(TransportError::Disconnected)
        ));

        let err: Error = LspError::ConnectionClosed.into();
        assert!(matches!(err, Error::Lsp(LspError::ConnectionClosed)));
    }

    #[test]
    fn test_tool_error_from_lsp_error() {
        let tool_err: ToolError = LspError::DocumentClosed("/tmp/a.rs".to_string()).into();
        assert!(matches!(tool_err, ToolError::Lsp(_)));
    }
}
