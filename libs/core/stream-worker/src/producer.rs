//! Stream producer.
//!
//! ```rust,ignore
//! let producer = StreamProducer::from_stream_def::<UserLifecycleStream>(backend);
//! let message_id = producer.send(&event).await?;
//! ```

use crate::backend::StreamBackend;
use crate::error::StreamError;
use crate::registry::StreamDef;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Appends JSON payloads to one stream under the `job` field.
#[derive(Clone)]
pub struct StreamProducer {
    backend: Arc<dyn StreamBackend>,
    stream_name: String,
    max_length: i64,
}

impl StreamProducer {
    pub fn new(backend: Arc<dyn StreamBackend>, stream_name: impl Into<String>) -> Self {
        Self {
            backend,
            stream_name: stream_name.into(),
            max_length: 100_000,
        }
    }

    /// Producer whose stream key and MAXLEN match the workers of `S`.
    pub fn from_stream_def<S: StreamDef>(backend: Arc<dyn StreamBackend>) -> Self {
        Self {
            backend,
            stream_name: S::stream_key(),
            max_length: S::MAX_LENGTH,
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Returns the stream entry id.
    pub async fn send<J: Serialize>(&self, job: &J) -> Result<String, StreamError> {
        let job_json = serde_json::to_string(job)?;

        let stream_id = self
            .backend
            .append(&self.stream_name, self.max_length, &[("job", &job_json)])
            .await?;

        debug!(stream = %self.stream_name, stream_id = %stream_id, "Enqueued job");
        Ok(stream_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryStreamBackend;

    struct Deleted;
    impl StreamDef for Deleted {
        const EXCHANGE: &'static str = "user_events";
        const ROUTING_KEY: &'static str = "user.deleted";
        const QUEUE: &'static str = "products.user_deleted";
    }

    #[tokio::test]
    async fn test_send_writes_job_field() {
        let backend = Arc::new(InMemoryStreamBackend::new());
        let producer = StreamProducer::from_stream_def::<Deleted>(backend.clone());

        producer
            .send(&serde_json::json!({"userId": "u1"}))
            .await
            .unwrap();

        let entries = backend.range("user_events:user.deleted", 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        let job: serde_json::Value =
            serde_json::from_str(entries[0].field("job").unwrap()).unwrap();
        assert_eq!(job["userId"], "u1");
    }
}
