use crate::queue::DropOldestQueue;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Name of a data source (serial `name`, network `host:port`, or `File`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(pub Arc<str>);

impl SourceId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of transport data as read from a source.
///
/// The payload keeps the line terminator stripped; relay sinks add `\r\n`
/// back when writing.
#[derive(Clone, Debug)]
pub struct RawRecord {
    /// Source the line was read from.
    pub source: SourceId,
    /// Line bytes without terminator.
    pub payload: Bytes,
    /// Arrival time.
    pub received_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(source: SourceId, payload: impl Into<Bytes>) -> Self {
        Self {
            source,
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }

    /// Payload as text, with invalid UTF-8 replaced.
    pub fn line(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Inbound queue of the hub, shared by every source adapter.
pub type RawQueue = Arc<DropOldestQueue<RawRecord>>;

/// Outbound queue feeding a relay sink with raw line bytes.
pub type RelayQueue = Arc<DropOldestQueue<Bytes>>;

/// Creates a shared drop-oldest queue with the given capacity.
///
/// ```
/// use aislogger::router;
///
/// let inbound: router::RawQueue = router::create_queue(10_000);
/// assert!(inbound.is_empty());
/// ```
pub fn create_queue<T>(capacity: usize) -> Arc<DropOldestQueue<T>> {
    Arc::new(DropOldestQueue::new(capacity))
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_delivers_records() {
        let queue: RawQueue = create_queue(16);
        queue.push(RawRecord::new(SourceId::new("gps"), &b"$GPRMC,,V*00"[..]));

        let received = queue.pop().await;
        assert_eq!(received.source.as_str(), "gps");
        assert_eq!(received.line(), "$GPRMC,,V*00");
    }
}
