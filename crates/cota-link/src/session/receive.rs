//! Deadline-bounded reply accumulation.
//!
//! Replies carry no framing: a reply is complete when the bytes received so
//! far parse as one JSON document. Every parse failure, including genuinely
//! malformed input, is treated as "incomplete" and the loop keeps reading until
//! the deadline expires.
//!
//! A reply that misses its deadline may still arrive later. Nothing in the
//! stream ties it to its request, so the session discards whatever is already
//! buffered before the next write with [`discard_stale`]. A reply still in
//! flight at that point is read as the answer to the next request.

use std::io::{self, ErrorKind, Read};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use serde_json::Value;

const CHUNK_SIZE: usize = 32 * 1024;

/// A reader whose next blocking read can be bounded by a timeout.
pub(crate) trait DeadlineRead: Read {
    /// Bounds the next read to `remaining`.
    fn arm(&mut self, remaining: Duration) -> io::Result<()>;
}

impl DeadlineRead for TcpStream {
    fn arm(&mut self, remaining: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(remaining))
    }
}

/// Buffers received bytes until they form a complete JSON document.
#[derive(Debug, Default)]
pub(crate) struct DocumentAccumulator {
    buffer: Vec<u8>,
}

impl DocumentAccumulator {
    /// Appends `chunk` and returns the document once the buffer parses.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Option<Value> {
        self.buffer.extend_from_slice(chunk);
        match serde_json::from_slice(&self.buffer) {
            Ok(document) => {
                self.buffer.clear();
                Some(document)
            }
            Err(_) => None,
        }
    }

    /// Number of bytes buffered without forming a document.
    pub(crate) fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Outcome of a single receive.
#[derive(Debug)]
pub(crate) enum ReceiveOutcome {
    Document(Value),
    TimedOut { pending: usize },
    Closed,
    Failed(io::Error),
}

/// Reads from `reader` until a complete document arrives or `deadline` passes.
pub(crate) fn receive_document<R>(reader: &mut R, deadline: Instant) -> ReceiveOutcome
where
    R: DeadlineRead + ?Sized,
{
    let mut accumulator = DocumentAccumulator::default();
    let mut chunk = vec![0_u8; CHUNK_SIZE];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ReceiveOutcome::TimedOut {
                pending: accumulator.pending(),
            };
        }
        if let Err(error) = reader.arm(remaining) {
            return ReceiveOutcome::Failed(error);
        }
        match reader.read(&mut chunk) {
            Ok(0) => return ReceiveOutcome::Closed,
            Ok(read) => {
                let received = chunk.get(..read).unwrap_or_default();
                if let Some(document) = accumulator.push(received) {
                    return ReceiveOutcome::Document(document);
                }
            }
            Err(error) if is_transient(&error) => {}
            Err(error) => return ReceiveOutcome::Failed(error),
        }
    }
}

/// Drains bytes already received without blocking. Returns the count.
pub(crate) fn discard_stale(stream: &mut TcpStream) -> io::Result<usize> {
    stream.set_nonblocking(true)?;
    let mut chunk = [0_u8; 4096];
    let mut discarded = 0;
    let outcome = loop {
        match stream.read(&mut chunk) {
            Ok(0) => break Ok(discarded),
            Ok(read) => discarded += read,
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) if error.kind() == ErrorKind::WouldBlock => break Ok(discarded),
            Err(error) => break Err(error),
        }
    };
    stream.set_nonblocking(false)?;
    outcome
}

/// Errors that only mean "nothing arrived yet".
pub(crate) fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}
