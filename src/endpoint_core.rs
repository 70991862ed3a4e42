//! Shared logic for source and relay endpoints.
//!
//! Every adapter that reads sentences (serial, TCP client, file replay) goes
//! through [`EndpointCore`] and [`run_reader_loop`]: bytes are split into
//! complete lines by [`LineSplitter`], non-sentence lines are dropped, and the
//! rest are queued for the hub. Relay endpoints drain a queue of raw lines
//! with [`run_relay_writer`].

use crate::error::{LoggerError, Result};
use crate::router::{RawQueue, RawRecord, RelayQueue, SourceId};
use bytes::{Buf, Bytes, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

// A line longer than this is garbage; the buffer is cleared instead of growing.
const MAX_LINE_LEN: usize = 64 * 1024;

/// Exponential backoff helper for connection retries.
#[derive(Debug)]
pub struct ExponentialBackoff {
    current: Duration,
    min: Duration,
    max: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    /// Creates a new `ExponentialBackoff` instance.
    ///
    /// # Arguments
    ///
    /// * `min` - The minimum (initial) delay duration.
    /// * `max` - The maximum delay duration.
    /// * `multiplier` - The factor by which the delay increases after each call to `next()`.
    pub fn new(min: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            current: min,
            min,
            max,
            multiplier,
        }
    }

    /// Returns the delay to wait now and grows the next one (capped at `max`).
    pub fn next_backoff(&mut self) -> Duration {
        let wait = self.current;
        self.current = std::cmp::min(
            self.max,
            Duration::from_secs_f64(self.current.as_secs_f64() * self.multiplier),
        );
        wait
    }

    /// Resets the backoff delay to the minimum value.
    ///
    /// Call this once a connection is established.
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Splits a byte stream into newline-terminated lines.
///
/// Partial lines are kept across pushes, so a sentence split over two reads
/// comes out whole. `\r\n` and `\n` terminators are both accepted and
/// stripped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: BytesMut,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        if self.buffer.len() + data.len() > MAX_LINE_LEN {
            warn!("Line buffer exceeded {} bytes without a newline, clearing", MAX_LINE_LEN);
            self.buffer.clear();
        }
        self.buffer.extend_from_slice(data);
    }

    /// Returns the next complete line, if any.
    pub fn next_line(&mut self) -> Option<Bytes> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line = self.buffer.split_to(pos + 1);
        line.truncate(pos);
        if line.last() == Some(&b'\r') {
            line.truncate(pos - 1);
        }
        Some(line.freeze())
    }

    /// Bytes of the incomplete trailing line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.advance(self.buffer.len());
    }
}

/// Returns `true` for lines that look like AIS (`!`) or NMEA (`$`) sentences.
pub fn is_sentence(line: &[u8]) -> bool {
    matches!(line.first(), Some(b'!') | Some(b'$'))
}

/// Ingress side of a source endpoint.
#[derive(Clone, Debug)]
pub struct EndpointCore {
    /// Name the hub sees for records from this endpoint.
    pub source: SourceId,
    /// Hub inbound queue.
    pub inbound: RawQueue,
}

impl EndpointCore {
    pub fn new(source: SourceId, inbound: RawQueue) -> Self {
        Self { source, inbound }
    }

    /// Queues one line for the hub if it is a sentence.
    ///
    /// Returns `true` if the line was queued.
    pub fn handle_line(&self, line: Bytes) -> bool {
        let trimmed_len = line
            .iter()
            .rposition(|b| !b.is_ascii_whitespace())
            .map_or(0, |p| p + 1);
        let line = line.slice(..trimmed_len);
        if !is_sentence(&line) {
            trace!("{}: skipping non-sentence line ({} bytes)", self.source, line.len());
            return false;
        }
        if self.inbound.push(RawRecord::new(self.source.clone(), line)) {
            trace!("{}: hub queue full, oldest record dropped", self.source);
        }
        true
    }
}

/// How a reader loop ended without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Cancelled,
    Eof,
}

/// Reads `reader` until EOF, error or cancellation, queuing every complete
/// sentence line.
///
/// With `idle_timeout` set, a read that produces nothing for that long is
/// reported as an error so the caller can reopen the device.
pub async fn run_reader_loop<R>(
    mut reader: R,
    core: &EndpointCore,
    cancel_token: &CancellationToken,
    idle_timeout: Option<Duration>,
) -> Result<StreamEnd>
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::new();
    let mut buf = [0u8; 4096];

    loop {
        let read = async {
            match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, reader.read(&mut buf)).await {
                    Ok(res) => res,
                    Err(_) => Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("no data for {:?}", limit),
                    )),
                },
                None => reader.read(&mut buf).await,
            }
        };

        tokio::select! {
            _ = cancel_token.cancelled() => return Ok(StreamEnd::Cancelled),
            res = read => match res {
                Ok(0) => {
                    debug!("{}: end of stream", core.source);
                    return Ok(StreamEnd::Eof);
                }
                Ok(n) => {
                    splitter.push(&buf[..n]);
                    while let Some(line) = splitter.next_line() {
                        core.handle_line(line);
                    }
                }
                Err(e) => {
                    return Err(LoggerError::network(core.source.to_string(), e));
                }
            }
        }
    }
}

/// Drains `queue` into `writer`, one `\r\n`-terminated line per entry, until
/// cancelled or a write fails.
pub async fn run_relay_writer<W>(
    writer: W,
    queue: RelayQueue,
    cancel_token: CancellationToken,
    name: &str,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    loop {
        let line = tokio::select! {
            _ = cancel_token.cancelled() => return Ok(()),
            line = queue.pop() => line,
        };

        write_line(&mut writer, &line)
            .await
            .map_err(|e| LoggerError::network(name, e))?;

        // Batch whatever else is queued before flushing.
        const BATCH_SIZE: usize = 256;
        for _ in 0..BATCH_SIZE {
            match queue.try_pop() {
                Some(line) => write_line(&mut writer, &line)
                    .await
                    .map_err(|e| LoggerError::network(name, e))?,
                None => break,
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| LoggerError::network(name, e))?;
    }
}

pub(crate) async fn write_line<W>(writer: &mut W, line: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line).await?;
    writer.write_all(b"\r\n").await
}
