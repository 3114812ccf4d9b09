use super::{ReadFrom, StreamBackend, StreamMessage};
use crate::error::StreamError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Default)]
struct MemoryStream {
    entries: Vec<StreamMessage>,
    groups: HashMap<String, MemoryGroup>,
}

#[derive(Default)]
struct MemoryGroup {
    /// Index of the next never-delivered entry.
    next: usize,
    /// Delivered, unacknowledged entries in delivery order.
    pending: Vec<PendingEntry>,
}

struct PendingEntry {
    id: String,
    consumer: String,
    delivered_at: Instant,
}

/// Process-local stream store with consumer-group semantics.
///
/// Entries are never trimmed. Appends to a stream can be made to fail with
/// [`InMemoryStreamBackend::fail_appends`].
#[derive(Default)]
pub struct InMemoryStreamBackend {
    streams: Mutex<HashMap<String, MemoryStream>>,
    failing_appends: Mutex<HashSet<String>>,
    seq: Mutex<u64>,
}

impl InMemoryStreamBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn streams(&self) -> MutexGuard<'_, HashMap<String, MemoryStream>> {
        self.streams.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every append to `stream` fail (or succeed again).
    pub fn fail_appends(&self, stream: &str, fail: bool) {
        let mut failing = self
            .failing_appends
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if fail {
            failing.insert(stream.to_string());
        } else {
            failing.remove(stream);
        }
    }

    pub fn stream_len(&self, stream: &str) -> usize {
        self.streams().get(stream).map_or(0, |s| s.entries.len())
    }

    pub fn pending_count(&self, stream: &str, group: &str) -> usize {
        self.streams()
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map_or(0, |g| g.pending.len())
    }

    fn next_id(&self) -> String {
        let mut seq = self.seq.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *seq += 1;
        format!("{}-0", *seq)
    }
}

fn no_group(stream: &str, group: &str) -> StreamError {
    StreamError::Backend(format!(
        "NOGROUP No such key '{}' or consumer group '{}'",
        stream, group
    ))
}

fn lookup(entries: &[StreamMessage], id: &str) -> Option<StreamMessage> {
    entries.iter().find(|e| e.id == id).cloned()
}

#[async_trait]
impl StreamBackend for InMemoryStreamBackend {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), StreamError> {
        self.streams()
            .entry(stream.to_string())
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn append(
        &self,
        stream: &str,
        _max_len: i64,
        fields: &[(&str, &str)],
    ) -> Result<String, StreamError> {
        let failing = self
            .failing_appends
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(stream);
        if failing {
            return Err(StreamError::Backend(format!("append to '{}' refused", stream)));
        }

        let id = self.next_id();
        self.streams()
            .entry(stream.to_string())
            .or_default()
            .entries
            .push(StreamMessage {
                id: id.clone(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
        Ok(id)
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        from: ReadFrom,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let mut streams = self.streams();
        let state = streams.get_mut(stream).ok_or_else(|| no_group(stream, group))?;
        let MemoryStream { entries, groups } = state;
        let g = groups.get_mut(group).ok_or_else(|| no_group(stream, group))?;

        match from {
            ReadFrom::Pending => Ok(g
                .pending
                .iter()
                .filter(|p| p.consumer == consumer)
                .filter_map(|p| lookup(entries, &p.id))
                .take(count)
                .collect()),
            ReadFrom::New { .. } => {
                let end = (g.next + count).min(entries.len());
                let batch: Vec<StreamMessage> = entries[g.next..end].to_vec();
                g.next = end;
                let now = Instant::now();
                g.pending.extend(batch.iter().map(|m| PendingEntry {
                    id: m.id.clone(),
                    consumer: consumer.to_string(),
                    delivered_at: now,
                }));
                Ok(batch)
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), StreamError> {
        let mut streams = self.streams();
        if let Some(g) = streams.get_mut(stream).and_then(|s| s.groups.get_mut(group)) {
            g.pending.retain(|p| p.id != id);
        }
        Ok(())
    }

    async fn claim_idle(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        count: usize,
    ) -> Result<Vec<StreamMessage>, StreamError> {
        let mut streams = self.streams();
        let state = streams.get_mut(stream).ok_or_else(|| no_group(stream, group))?;
        let MemoryStream { entries, groups } = state;
        let g = groups.get_mut(group).ok_or_else(|| no_group(stream, group))?;

        let min_idle = Duration::from_millis(min_idle_ms);
        let now = Instant::now();
        let mut claimed = Vec::new();

        for p in g.pending.iter_mut() {
            if claimed.len() >= count {
                break;
            }
            if p.consumer != consumer && now.duration_since(p.delivered_at) >= min_idle {
                p.consumer = consumer.to_string();
                p.delivered_at = now;
                if let Some(m) = lookup(entries, &p.id) {
                    claimed.push(m);
                }
            }
        }
        Ok(claimed)
    }

    async fn range(&self, stream: &str, count: usize) -> Result<Vec<StreamMessage>, StreamError> {
        Ok(self
            .streams()
            .get(stream)
            .map(|s| s.entries.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }
}
