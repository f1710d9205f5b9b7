//! Process lifecycle: `Starting -> Ready -> ShuttingDown -> Closed`.
//!
//! [`Lifecycle::close`] may be called any number of times from any number of
//! tasks. The first call flips the state to `ShuttingDown` under the state
//! lock and spawns the one teardown task; every caller, the first included,
//! then waits for the outcome that task broadcasts.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_process::Child;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, Span, debug, info, warn};

use super::documents::DocumentSync;
use super::lock;
use super::rpc::RpcEngine;

/// Where a client is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Process spawned, handshake not finished.
    Starting,
    /// Handshake done; requests may be issued.
    Ready,
    /// Teardown running.
    ShuttingDown,
    /// Process gone, all resources released.
    Closed,
}

/// How the language server process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Exited within the grace period.
    Exited {
        /// Exit code, if the platform reported one.
        code: Option<i32>,
    },
    /// Had to be killed after the grace period.
    Killed,
    /// Could not be killed.
    KillFailed {
        /// The kill error.
        reason: String,
    },
}

impl CloseOutcome {
    /// Warning-level description for forced terminations.
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Exited { .. } => None,
            Self::Killed => {
                Some("language server did not exit within the grace period and was killed".into())
            }
            Self::KillFailed { reason } => {
                Some(format!("failed to kill language server: {reason}"))
            }
        }
    }

    /// True unless the server exited on its own within the grace period.
    pub fn was_forced(&self) -> bool {
        !matches!(self, Self::Exited { .. })
    }
}

/// Owns the child process and the background tasks of one client.
pub struct Lifecycle {
    state: Arc<Mutex<LifecycleState>>,
    outcome: watch::Sender<Option<CloseOutcome>>,
    child: Mutex<Option<Child>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    rpc: Arc<RpcEngine>,
    documents: Arc<DocumentSync>,
    grace: Duration,
    span: Span,
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("state", &self.state())
            .field("grace", &self.grace)
            .finish_non_exhaustive()
    }
}

impl Lifecycle {
    /// Takes ownership of the spawned `child`.
    ///
    /// Starts in [`LifecycleState::Starting`]; the client marks it ready after
    /// the handshake. `grace` bounds the whole shutdown sequence.
    pub fn new(
        child: Child,
        rpc: Arc<RpcEngine>,
        documents: Arc<DocumentSync>,
        grace: Duration,
        span: Span,
    ) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            state: Arc::new(Mutex::new(LifecycleState::Starting)),
            outcome,
            child: Mutex::new(Some(child)),
            tasks: Mutex::new(Vec::new()),
            rpc,
            documents,
            grace,
            span,
        }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *lock(&self.state)
    }

    /// Moves `Starting` to `Ready`. Returns false if shutdown already began.
    pub fn mark_ready(&self) -> bool {
        let mut state = lock(&self.state);
        if *state == LifecycleState::Starting {
            *state = LifecycleState::Ready;
            true
        } else {
            false
        }
    }

    /// Registers a background task to abort once teardown finishes.
    pub fn track(&self, task: JoinHandle<()>) {
        lock(&self.tasks).push(task);
    }

    /// Spawns the read loop for `reader`, reporting an unexpected disconnect.
    pub fn spawn_read_loop<R>(&self, reader: super::codec::FrameReader<R>)
    where
        R: futures::io::AsyncBufRead + Unpin + Send + 'static,
    {
        let rpc = self.rpc.clone();
        let state = self.state.clone();
        let task = tokio::spawn(
            async move {
                rpc.read_loop(reader).await;
                let state = *lock(&state);
                if matches!(state, LifecycleState::Starting | LifecycleState::Ready) {
                    warn!(?state, "language server disconnected unexpectedly");
                }
            }
            .instrument(self.span.clone()),
        );
        self.track(task);
    }

    /// Shuts the server down once and returns the shared outcome.
    ///
    /// The teardown runs on its own task, so dropping this future does not
    /// leave other callers waiting forever.
    pub async fn close(self: &Arc<Self>) -> CloseOutcome {
        let mut outcome = self.outcome.subscribe();

        let first = {
            let mut state = lock(&self.state);
            match *state {
                LifecycleState::Starting | LifecycleState::Ready => {
                    *state = LifecycleState::ShuttingDown;
                    true
                }
                LifecycleState::ShuttingDown | LifecycleState::Closed => false,
            }
        };

        if first {
            let this = Arc::clone(self);
            tokio::spawn(
                async move {
                    let result = this.teardown().await;
                    *lock(&this.state) = LifecycleState::Closed;
                    this.outcome.send_replace(Some(result));
                }
                .instrument(self.span.clone()),
            );
        }

        // `self` keeps the sender alive, so the wait only ends with a value.
        let _ = outcome.wait_for(Option::is_some).await;
        let result = outcome.borrow().clone();
        result.unwrap_or(CloseOutcome::Exited { code: None })
    }

    /// `shutdown`, `exit`, then wait for the process; kill it if the whole
    /// sequence does not finish before the grace deadline.
    async fn teardown(&self) -> CloseOutcome {
        let deadline = Instant::now() + self.grace;
        let child = lock(&self.child).take();

        let outcome = match child {
            Some(mut child) => {
                let graceful = async {
                    let closed = self.documents.close_all().await;
                    if closed > 0 {
                        debug!(closed, "closed open documents");
                    }
                    if let Err(e) = self.rpc.call("shutdown", Value::Null).await {
                        debug!(error = %e, "shutdown request failed");
                    }
                    if let Err(e) = self.rpc.notify("exit", Value::Null).await {
                        debug!(error = %e, "exit notification failed");
                    }
                    self.rpc.close_writer().await;
                    child.status().await
                };
                let finished = tokio::time::timeout_at(deadline, graceful).await;

                match finished {
                    Ok(Ok(status)) => {
                        info!(code = ?status.code(), "language server exited");
                        CloseOutcome::Exited {
                            code: status.code(),
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "waiting for language server failed, killing it");
                        self.kill(&mut child).await
                    }
                    Err(_) => {
                        warn!(grace = ?self.grace, "language server did not exit in time, killing it");
                        self.kill(&mut child).await
                    }
                }
            }
            None => CloseOutcome::Exited { code: None },
        };

        self.rpc.close();
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        outcome
    }

    async fn kill(&self, child: &mut Child) -> CloseOutcome {
        if let Err(e) = child.kill() {
            warn!(error = %e, "failed to kill language server");
            return CloseOutcome::KillFailed {
                reason: e.to_string(),
            };
        }
        match tokio::time::timeout(self.grace, child.status()).await {
            Ok(Ok(_)) => CloseOutcome::Killed,
            Ok(Err(e)) => CloseOutcome::KillFailed {
                reason: e.to_string(),
            },
            Err(_) => CloseOutcome::KillFailed {
                reason: "process still running after kill".to_string(),
            },
        }
    }
}
