//! Storage seam under the worker, producer and DLQ.
//!
//! [`RedisStreamBackend`] speaks XADD / XREADGROUP / XACK / XPENDING / XCLAIM;
//! [`InMemoryStreamBackend`] mirrors consumer-group semantics for tests and local runs.

mod memory;
mod redis_streams;

pub use self::memory::InMemoryStreamBackend;
pub use self::redis_streams::RedisStreamBackend;

use crate::error::StreamError;
use async_trait::async_trait;

/// One stream entry: its id and field/value pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

impl StreamMessage {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Which entries a group read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFrom {
    /// Entries already delivered to this consumer but not acknowledged (id `0`).
    Pending,
    /// Never-delivered entries (id `>`), optionally blocking.
    New { block_ms: Option<u64> },
}

#[async_trait]
pub trait StreamBackend: Send + Sync {
    /// Create the consumer group (and the stream) if missing. Starts from the first entry.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), StreamError>;

    /// Append an entry, trimming the stream to roughly `max_len`. Returns the entry id.
    async fn append(
        &self,
        stream: &str,
        max_len: i64,
        fields: &[(&str, &str)],
    ) -> Result<String, StreamError>;

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        from: ReadFrom,
    ) -> Result<Vec<StreamMessage>, StreamError>;

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), StreamError>;

    /// Take over entries pending on other consumers for at least `min_idle_ms`.
    async fn claim_idle(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError>;

    /// Oldest-first entries, for inspection.
    async fn range(&self, stream: &str, count: usize) -> Result<Vec<StreamMessage>, StreamError>;
}
