use async_trait::async_trait;
use std::sync::Arc;
use stream_worker::{StreamBackend, StreamError, StreamProducer};
use tracing::info;

use crate::channels::UserLifecycleStream;
use crate::models::{UserDeletedEvent, UserLifecycleEvent, UserStatusChangedEvent};

/// Outbound side of the user lifecycle channel.
///
/// Both methods return the stream entry id.
#[async_trait]
pub trait UserEventPublisher: Send + Sync {
    async fn user_deleted(&self, event: &UserDeletedEvent) -> Result<String, StreamError>;

    async fn user_status_changed(
        &self,
        event: &UserStatusChangedEvent,
    ) -> Result<String, StreamError>;
}

/// Publishes onto the Redis Streams channel (or any other [`StreamBackend`]).
#[derive(Clone)]
pub struct StreamUserEventPublisher {
    producer: StreamProducer,
}

impl StreamUserEventPublisher {
    pub fn new(backend: Arc<dyn StreamBackend>) -> Self {
        Self {
            producer: StreamProducer::from_stream_def::<UserLifecycleStream>(backend),
        }
    }

    async fn publish(&self, event: UserLifecycleEvent) -> Result<String, StreamError> {
        let id = self.producer.send(&event).await?;
        info!(
            user_id = %event.user_id(),
            event_id = %event.event_id(),
            stream_id = %id,
            "Published {}",
            event.event_type()
        );
        Ok(id)
    }
}

#[async_trait]
impl UserEventPublisher for StreamUserEventPublisher {
    async fn user_deleted(&self, event: &UserDeletedEvent) -> Result<String, StreamError> {
        self.publish(event.clone().into()).await
    }

    async fn user_status_changed(
        &self,
        event: &UserStatusChangedEvent,
    ) -> Result<String, StreamError> {
        self.publish(event.clone().into()).await
    }
}
