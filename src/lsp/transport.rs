//! Child process ownership and its three standard streams.

use std::path::Path;
use std::process::Stdio;

use async_process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use futures::StreamExt;
use futures::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug};

use super::codec::FrameReader;
use crate::error::TransportError;

/// A spawned language server with its pipes split out.
///
/// stdin goes to the RPC engine's writer, stdout to the read loop, and
/// stderr is pumped into the log on its own task.
pub struct Transport {
    /// The server process.
    pub child: Child,
    /// Frames to the server.
    pub stdin: ChildStdin,
    /// Frames from the server.
    pub stdout: FrameReader<BufReader<ChildStdout>>,
    /// Task forwarding stderr lines to `debug!`.
    pub stderr_pump: JoinHandle<()>,
}

impl Transport {
    /// Spawns `command` with piped stdio in `cwd`.
    ///
    /// The child is killed if the returned [`Child`] is dropped without
    /// being reaped.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::SpawnFailed`] if the process cannot be
    /// started or a pipe is missing.
    pub fn spawn(
        command: &str,
        args: &[String],
        cwd: &Path,
        span: &Span,
    ) -> Result<Self, TransportError> {
        let spawn_failed = |reason: String| TransportError::SpawnFailed {
            command: command.to_string(),
            reason,
        };

        let mut child = Command::new(command)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_failed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_failed("stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_failed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_failed("stderr was not captured".to_string()))?;

        debug!(parent: span, command, ?args, pid = child.id(), "spawned language server");

        Ok(Self {
            child,
            stdin,
            stdout: FrameReader::new(BufReader::new(stdout)),
            stderr_pump: tokio::spawn(pump_stderr(stderr).instrument(span.clone())),
        })
    }
}

/// Forwards the server's stderr to the log, one line per event.
async fn pump_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => debug!(target: "lsp_bridge::server_stderr", "{line}"),
            Err(e) => {
                debug!(error = %e, "stopped reading language server stderr");
                break;
            }
        }
    }
}
