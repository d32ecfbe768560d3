//! Bounded, forward-only response body
//!
//! Wraps a chunk stream with the fetch deadline and the byte ceiling. Chunks
//! are handed out as they arrive; nothing is buffered beyond one pending
//! chunk and nothing is sized from `Content-Length`.

use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, error, warn};

type ChunkStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// Result of pulling one chunk from the underlying stream
enum Pull {
    Chunk(Bytes),
    End,
    TimedOut,
    Failed(reqwest::Error),
}

/// Why the first read failed to produce a usable body
#[derive(Debug)]
pub(crate) enum PrimeError {
    /// Deadline expired before the first body byte
    TimedOut,
    /// Transport error before the first body byte
    Failed(reqwest::Error),
}

/// Single-consumer body stream bounded by a deadline and a byte ceiling
///
/// Once the ceiling is reached, the deadline expires, or the consumer calls
/// [`close`](Self::close), the underlying connection is dropped rather than
/// drained.
pub struct BodyStream {
    inner: Option<ChunkStream>,
    pending: Option<Bytes>,
    deadline: Instant,
    max_bytes: usize,
    bytes_read: usize,
    truncated: bool,
}

impl BodyStream {
    pub(crate) fn new(inner: ChunkStream, deadline: Instant, max_bytes: usize) -> Self {
        Self {
            inner: Some(inner),
            pending: None,
            deadline,
            max_bytes,
            bytes_read: 0,
            truncated: false,
        }
    }

    /// A body with no content
    pub fn empty() -> Self {
        Self {
            inner: None,
            pending: None,
            deadline: Instant::now(),
            max_bytes: 0,
            bytes_read: 0,
            truncated: false,
        }
    }

    /// Body over already-buffered chunks, still subject to the byte ceiling
    pub fn from_chunks<I>(chunks: I, max_bytes: usize) -> Self
    where
        I: IntoIterator<Item = Bytes>,
        I::IntoIter: Send + 'static,
    {
        let inner = stream::iter(chunks.into_iter().map(Ok::<_, reqwest::Error>)).boxed();
        // Buffered chunks never wait, any deadline far enough out will do
        let deadline = Instant::now() + std::time::Duration::from_secs(86_400);
        Self::new(inner, deadline, max_bytes)
    }

    /// Read the first chunk so the caller knows whether any body arrived
    ///
    /// An empty body (stream ends immediately) is a success.
    pub(crate) async fn prime(&mut self) -> Result<(), PrimeError> {
        match self.pull().await {
            Pull::Chunk(chunk) => {
                self.pending = Some(chunk);
                Ok(())
            }
            Pull::End => Ok(()),
            Pull::TimedOut => Err(PrimeError::TimedOut),
            Pull::Failed(err) => Err(PrimeError::Failed(err)),
        }
    }

    /// Next chunk of the body, or `None` when the body is exhausted
    ///
    /// Deadline expiry and transport errors after some bytes were read end
    /// the stream and mark it truncated.
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        if let Some(chunk) = self.pending.take() {
            return Some(chunk);
        }
        match self.pull().await {
            Pull::Chunk(chunk) => Some(chunk),
            Pull::End => None,
            Pull::TimedOut => {
                warn!(
                    bytes_read = self.bytes_read,
                    "Body deadline reached, returning partial content"
                );
                self.truncated = self.bytes_read > 0;
                None
            }
            Pull::Failed(err) => {
                error!("Error reading body chunk: {}", err);
                self.truncated = self.bytes_read > 0;
                None
            }
        }
    }

    async fn pull(&mut self) -> Pull {
        loop {
            let Some(stream) = self.inner.as_mut() else {
                return Pull::End;
            };

            let chunk = match tokio::time::timeout_at(self.deadline, stream.next()).await {
                Err(_) => {
                    self.inner = None;
                    return Pull::TimedOut;
                }
                Ok(None) => {
                    self.inner = None;
                    return Pull::End;
                }
                Ok(Some(Err(err))) => {
                    self.inner = None;
                    return Pull::Failed(err);
                }
                Ok(Some(Ok(chunk))) => chunk,
            };

            if chunk.is_empty() {
                continue;
            }
            return Pull::Chunk(self.admit(chunk));
        }
    }

    /// Count a chunk against the ceiling, cutting it and closing the stream
    /// once the ceiling is reached
    fn admit(&mut self, mut chunk: Bytes) -> Bytes {
        let remaining = self.max_bytes - self.bytes_read;
        if chunk.len() >= remaining {
            chunk.truncate(remaining);
            self.truncated = true;
            self.inner = None;
            debug!(max_bytes = self.max_bytes, "Byte ceiling reached, closing body");
        }
        self.bytes_read += chunk.len();
        chunk
    }

    /// Stop reading and drop the connection
    pub fn close(&mut self) {
        self.inner = None;
        self.pending = None;
    }

    /// True if the body was cut short by the ceiling or the deadline
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Body bytes handed out so far (including a pending first chunk)
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyStream")
            .field("open", &self.inner.is_some())
            .field("max_bytes", &self.max_bytes)
            .field("bytes_read", &self.bytes_read)
            .field("truncated", &self.truncated)
            .finish()
    }
}
