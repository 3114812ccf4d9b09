//! Dead-letter stream handling.

use crate::backend::StreamBackend;
use crate::error::StreamError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// What gets written to the dead-letter stream under the `data` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    /// Job id, or the stream entry id when the payload could not be parsed.
    pub job_id: String,
    /// The payload as JSON, or as a JSON string when it was not valid JSON.
    pub job_data: serde_json::Value,
    pub error: String,
    pub original_stream_id: String,
    /// Processing attempts made before giving up.
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DlqManager {
    backend: Arc<dyn StreamBackend>,
    dlq_stream: String,
    max_length: i64,
}

impl DlqManager {
    pub fn new(backend: Arc<dyn StreamBackend>, dlq_stream: impl Into<String>) -> Self {
        Self {
            backend,
            dlq_stream: dlq_stream.into(),
            max_length: 10_000,
        }
    }

    pub fn dlq_stream(&self) -> &str {
        &self.dlq_stream
    }

    pub async fn move_to_dlq(&self, entry: &DlqEntry) -> Result<String, StreamError> {
        let data = serde_json::to_string(entry)?;

        let dlq_id = self
            .backend
            .append(&self.dlq_stream, self.max_length, &[("data", &data)])
            .await?;

        info!(
            job_id = %entry.job_id,
            dlq_id = %dlq_id,
            error = %entry.error,
            attempts = entry.attempts,
            "Moved job to DLQ"
        );
        Ok(dlq_id)
    }

    /// Oldest-first; entries that fail to parse are skipped.
    pub async fn list(&self, count: usize) -> Result<Vec<DlqEntry>, StreamError> {
        let messages = self.backend.range(&self.dlq_stream, count).await?;

        Ok(messages
            .into_iter()
            .filter_map(|m| {
                let data = m.field("data")?;
                serde_json::from_str(data)
                    .inspect_err(|e| warn!(dlq_id = %m.id, error = %e, "Unreadable DLQ entry"))
                    .ok()
            })
            .collect())
    }
}
