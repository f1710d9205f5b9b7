//! Request/response multiplexer over a single framed connection.
//!
//! Any number of tasks may [`call`](RpcEngine::call) concurrently. Every call
//! gets a fresh id and a pending slot; the single read loop
//! ([`RpcEngine::read_loop`]) completes slots as responses arrive and runs
//! notification handlers in arrival order.
//!
//! When the read loop ends, for whatever reason, every pending slot is
//! completed with [`LspError::ConnectionClosed`] and all later writes fail
//! fast with [`TransportError::Disconnected`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use futures::io::{AsyncBufRead, AsyncWrite};
use lsp_types::notification::Notification;
use lsp_types::request::Request;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, trace, warn};

use super::codec::{FrameReader, FrameWriter};
use super::protocol::{
    Incoming, NotificationMessage, RequestMessage, ResponseError, ResponseMessage, classify,
};
use super::{LspResult, lock, read, write};
use crate::error::{LspError, TransportError};

/// Callback invoked on the read loop for every matching notification.
pub type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type PendingTable = Mutex<HashMap<u64, oneshot::Sender<LspResult<Value>>>>;

/// The JSON-RPC engine shared by every caller of one client.
pub struct RpcEngine {
    writer: tokio::sync::Mutex<FrameWriter<BoxedWriter>>,
    next_id: AtomicU64,
    pending: PendingTable,
    handlers: RwLock<HashMap<String, Vec<NotificationHandler>>>,
    closed: AtomicBool,
    disconnected: watch::Sender<bool>,
    request_timeout: Duration,
}

impl std::fmt::Debug for RpcEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcEngine")
            .field("next_id", &self.next_id)
            .field("pending", &lock(&self.pending).len())
            .field("closed", &self.closed)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Removes a pending slot when its `call` future finishes or is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingTable,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

impl RpcEngine {
    /// Creates an engine writing to `writer`. Ids start at 1.
    pub fn new<W>(writer: W, request_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (disconnected, _) = watch::channel(false);
        Self {
            writer: tokio::sync::Mutex::new(FrameWriter::new(Box::new(writer))),
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            disconnected,
            request_timeout,
        }
    }

    /// Sends a request and waits for its response.
    ///
    /// Bounded by the engine's request timeout. Dropping the returned future
    /// abandons the request; a late response is then logged and dropped.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Disconnected`] if the connection is already gone
    /// - [`LspError::ServerError`] if the server answered with an error
    /// - [`LspError::ConnectionClosed`] if the connection closed while waiting
    /// - [`LspError::Timeout`] if no response arrived in time
    pub async fn call(&self, method: &str, params: Value) -> LspResult<Value> {
        self.call_with_timeout(method, params, self.request_timeout)
            .await
    }

    /// Like [`call`](Self::call) with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> LspResult<Value> {
        self.ensure_open()?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };
        // The read loop may have drained the table between the check above
        // and the insert.
        self.ensure_open()?;

        trace!(id, method, "sending request");
        self.send(&RequestMessage::new(id, method, params)).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LspError::ConnectionClosed),
            Err(_) => {
                debug!(id, method, ?timeout, "request timed out");
                Err(LspError::Timeout(timeout))
            }
        }
    }

    /// Sends a typed request and decodes the result.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call), plus [`LspError::ParseError`] when the
    /// result does not match `R::Result`.
    pub async fn request<R: Request>(&self, params: R::Params) -> LspResult<R::Result> {
        let params = encode(R::METHOD, &params)?;
        let value = self.call(R::METHOD, params).await?;
        serde_json::from_value(value).map_err(|e| LspError::ParseError {
            method: R::METHOD.to_string(),
            reason: e.to_string(),
        })
    }

    /// Sends a notification. Does not wait for anything but the write.
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::Disconnected`] once the connection is gone.
    pub async fn notify(&self, method: &str, params: Value) -> LspResult<()> {
        self.ensure_open()?;
        trace!(method, "sending notification");
        self.send(&NotificationMessage::new(method, params)).await
    }

    /// Sends a typed notification.
    ///
    /// # Errors
    ///
    /// Same as [`notify`](Self::notify).
    pub async fn notify_typed<N: Notification>(&self, params: N::Params) -> LspResult<()> {
        let params = encode(N::METHOD, &params)?;
        self.notify(N::METHOD, params).await
    }

    /// Registers a handler for notifications named `method`.
    ///
    /// Handlers run on the read loop, one after another, and must return
    /// quickly.
    pub fn on_notification<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        write(&self.handlers)
            .entry(method.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Returns true once the connection is known to be gone.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of calls still waiting for a response.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Resolves once the connection is gone.
    pub async fn disconnected(&self) {
        let mut rx = self.disconnected.subscribe();
        // The sender lives in `self`, so this only fails if we are dropped.
        let _ = rx.wait_for(|gone| *gone).await;
    }

    /// Marks the connection as gone and fails every pending call.
    ///
    /// Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.disconnected.send_replace(true);

        let drained: Vec<_> = lock(&self.pending).drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "failing pending requests");
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(LspError::ConnectionClosed));
        }
    }

    /// Closes the write half so the peer sees EOF on its stdin.
    pub async fn close_writer(&self) {
        if let Err(e) = self.writer.lock().await.close().await {
            trace!(error = %e, "closing writer failed");
        }
    }

    /// Reads and dispatches frames until the stream ends or breaks.
    ///
    /// Malformed frames are logged and skipped. On exit the engine is
    /// [closed](Self::close).
    pub async fn read_loop<R: AsyncBufRead + Unpin>(&self, mut reader: FrameReader<R>) {
        loop {
            match reader.read_frame().await {
                Ok(Some(frame)) => self.dispatch(frame).await,
                Ok(None) => {
                    debug!("language server closed its output");
                    break;
                }
                Err(e) if !e.is_fatal() => {
                    warn!(error = %e, "dropping malformed frame");
                }
                Err(e) => {
                    error!(error = %e, "transport failed");
                    break;
                }
            }
        }
        self.close();
    }

    /// Routes one decoded frame.
    pub async fn dispatch(&self, frame: Value) {
        match classify(frame) {
            Incoming::Response { id, outcome } => {
                let Some(tx) = lock(&self.pending).remove(&id) else {
                    warn!(id, "response for unknown request id");
                    return;
                };
                let result = outcome.map_err(|ResponseError { code, message, data }| {
                    LspError::ServerError {
                        code,
                        message,
                        data,
                    }
                });
                // The caller may have given up already.
                let _ = tx.send(result);
            }
            Incoming::Notification { method, params } => {
                let handlers = read(&self.handlers).get(&method).cloned();
                match handlers {
                    Some(handlers) => {
                        for handler in &handlers {
                            handler(params.clone());
                        }
                    }
                    None => trace!(method, "no handler for notification"),
                }
            }
            Incoming::Request { id, method, params } => {
                let reply = match server_request_result(&method, &params) {
                    Some(result) => ResponseMessage::ok(id, result),
                    None => {
                        debug!(method, "rejecting unsupported server request");
                        ResponseMessage::err(
                            id,
                            LspError::METHOD_NOT_FOUND,
                            format!("method not supported by client: {method}"),
                        )
                    }
                };
                if let Err(e) = self.send(&reply).await {
                    debug!(method, error = %e, "failed to answer server request");
                }
            }
            Incoming::Invalid(reason) => warn!(reason, "dropping unrecognized frame"),
        }
    }

    fn ensure_open(&self) -> LspResult<()> {
        if self.is_closed() {
            return Err(TransportError::Disconnected.into());
        }
        Ok(())
    }

    /// Writes one frame under the writer lock.
    async fn send<T: Serialize>(&self, message: &T) -> LspResult<()> {
        let mut writer = self.writer.lock().await;
        if self.is_closed() {
            return Err(TransportError::Disconnected.into());
        }
        match writer.write_frame(message).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => {
                drop(writer);
                warn!(error = %e, "write to language server failed");
                self.close();
                Err(TransportError::Disconnected.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Result for server-initiated requests the client knows how to answer.
fn server_request_result(method: &str, params: &Value) -> Option<Value> {
    match method {
        "workspace/configuration" => {
            let count = params
                .get("items")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            Some(Value::Array(vec![Value::Null; count]))
        }
        "client/registerCapability"
        | "client/unregisterCapability"
        | "window/workDoneProgress/create" => Some(Value::Null),
        _ => None,
    }
}

fn encode<T: Serialize>(method: &str, params: &T) -> LspResult<Value> {
    serde_json::to_value(params).map_err(|e| LspError::ParseError {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
