//! File replay: feeds a raw capture back through the hub.

use crate::endpoint_core::EndpointCore;
use crate::error::{LoggerError, Result};
use crate::router::{RawQueue, SourceId};
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Source name of replayed records.
pub const REPLAY_SOURCE: &str = "File";

/// Reads `path` line by line and queues every sentence under the `File`
/// source. Returns the number of lines queued.
///
/// Replay is paced against the hub: while the inbound queue is more than
/// half full the reader waits, so a large capture does not evict its own
/// earlier lines.
pub async fn run(path: impl AsRef<Path>, inbound: RawQueue, token: CancellationToken) -> Result<usize> {
    let path = path.as_ref();
    let file = File::open(path)
        .await
        .map_err(|e| LoggerError::storage(path.display().to_string(), e))?;
    info!("Replaying {}", path.display());

    let high_water = inbound.capacity() / 2;
    let core = EndpointCore::new(SourceId::new(REPLAY_SOURCE), inbound);
    let mut reader = BufReader::new(file);
    let mut line = Vec::with_capacity(128);
    let mut queued = 0usize;

    loop {
        if token.is_cancelled() {
            break;
        }
        while core.inbound.len() > high_water {
            tokio::select! {
                _ = token.cancelled() => return Ok(queued),
                _ = tokio::time::sleep(Duration::from_millis(5)) => {}
            }
        }

        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| LoggerError::storage(path.display().to_string(), e))?;
        if n == 0 {
            break;
        }
        if core.handle_line(Bytes::copy_from_slice(&line)) {
            queued += 1;
        }
    }

    info!("Replay of {} finished: {} lines", path.display(), queued);
    Ok(queued)
}
