//! Content-Length framing for JSON-RPC over byte streams.
//!
//! Each message is a header block terminated by an empty line, followed by
//! exactly `Content-Length` bytes of JSON:
//!
//! ```text
//! Content-Length: 52\r\n
//! \r\n
//! {"jsonrpc":"2.0","id":1,"method":"shutdown"}
//! ```
//!
//! The child's pipes implement the `futures-io` traits, so the reader and
//! writer here are generic over those.

use futures::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use serde::Serialize;
use serde_json::Value;

use crate::error::TransportError;

/// Frames larger than this are drained and dropped instead of allocated.
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Reads framed JSON messages from a buffered reader.
pub struct FrameReader<R> {
    reader: R,
    line: Vec<u8>,
}

/// What the header block of one frame said.
struct Headers {
    content_length: Option<usize>,
    /// First thing wrong with the block; the frame is dropped if set.
    problem: Option<String>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    /// Wraps an already-buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
        }
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` on a clean EOF between frames. A
    /// [`TransportError::MalformedFrame`] means the frame was consumed and
    /// dropped; the caller may keep reading.
    pub async fn read_frame(&mut self) -> Result<Option<Value>, TransportError> {
        let Some(headers) = self.read_headers().await? else {
            return Ok(None);
        };

        let content_length = match (headers.content_length, headers.problem) {
            (Some(len), None) => len,
            (Some(len), Some(problem)) => {
                self.skip_body(len).await?;
                return Err(TransportError::MalformedFrame(problem));
            }
            (None, problem) => {
                return Err(TransportError::MalformedFrame(
                    problem.unwrap_or_else(|| "missing Content-Length header".to_string()),
                ));
            }
        };

        if content_length > MAX_FRAME_BYTES {
            self.skip_body(content_length).await?;
            return Err(TransportError::MalformedFrame(format!(
                "Content-Length {content_length} exceeds maximum {MAX_FRAME_BYTES}"
            )));
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => TransportError::UnexpectedEof,
                _ => TransportError::Io(e),
            })?;

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| TransportError::MalformedFrame(format!("invalid JSON body: {e}")))
    }

    /// Discards `len` body bytes without buffering them.
    async fn skip_body(&mut self, len: usize) -> Result<(), TransportError> {
        let skipped = futures::io::copy(
            (&mut self.reader).take(len as u64),
            &mut futures::io::sink(),
        )
        .await?;
        if skipped < len as u64 {
            return Err(TransportError::UnexpectedEof);
        }
        Ok(())
    }

    /// Parses headers up to the empty separator line.
    ///
    /// Header lines are read as bytes; a line that is not UTF-8 marks the
    /// frame as malformed but the block is still read to its end.
    async fn read_headers(&mut self) -> Result<Option<Headers>, TransportError> {
        let mut content_length = None;
        let mut problem = None;
        let mut saw_header_bytes = false;

        loop {
            self.line.clear();
            let read = self.reader.read_until(b'\n', &mut self.line).await?;
            if read == 0 {
                if saw_header_bytes {
                    return Err(TransportError::UnexpectedEof);
                }
                return Ok(None);
            }
            saw_header_bytes = true;

            let header = match std::str::from_utf8(&self.line) {
                Ok(header) => header.trim(),
                Err(e) => {
                    problem.get_or_insert_with(|| format!("header line is not UTF-8: {e}"));
                    continue;
                }
            };
            if header.is_empty() {
                break;
            }

            if let Some((name, value)) = header.split_once(':')
                && name.trim().eq_ignore_ascii_case("Content-Length")
            {
                match value.trim().parse::<usize>() {
                    Ok(len) => content_length = Some(len),
                    Err(e) => {
                        content_length = None;
                        problem.get_or_insert_with(|| {
                            format!("invalid Content-Length '{}': {e}", value.trim())
                        });
                    }
                }
            }
        }

        Ok(Some(Headers {
            content_length,
            problem,
        }))
    }
}

/// Writes framed JSON messages.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serializes `message` and writes it as one frame, then flushes.
    ///
    /// Header and body go out in a single buffer so a frame is never split
    /// across two writes.
    pub async fn write_frame<T: Serialize + ?Sized>(
        &mut self,
        message: &T,
    ) -> Result<(), TransportError> {
        let body = serde_json::to_vec(message)
            .map_err(|e| TransportError::MalformedFrame(format!("unserializable message: {e}")))?;
        let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        frame.extend_from_slice(&body);

        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Closes the underlying writer.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.writer.close().await?;
        Ok(())
    }
}
