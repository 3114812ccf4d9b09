//! Stream consumers that feed user lifecycle events into the coordinator.

use async_trait::async_trait;
use domain_events::{UserLifecycleEvent, UserLifecycleStream};
use std::sync::Arc;
use stream_worker::{
    RetryPolicy, StreamBackend, StreamError, StreamProcessor, StreamWorker, SubscriberRegistry,
    WorkerConfig,
};
use tracing::debug;

use crate::coordinator::ConsistencyCoordinator;
use crate::error::ProductError;

fn to_stream_error(err: ProductError) -> StreamError {
    if err.is_transient() {
        StreamError::transient(err.to_string())
    } else {
        StreamError::permanent(err.to_string())
    }
}

/// Applies user lifecycle events to the user's products.
///
/// `user.deleted` deactivates everything; `user.status_changed` deactivates or reactivates
/// according to `is_active`.
pub struct UserLifecycleProcessor {
    coordinator: ConsistencyCoordinator,
}

impl UserLifecycleProcessor {
    pub fn new(coordinator: ConsistencyCoordinator) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl StreamProcessor<UserLifecycleEvent> for UserLifecycleProcessor {
    async fn process(&self, event: &UserLifecycleEvent) -> Result<(), StreamError> {
        debug!(
            event_id = %event.event_id(),
            user_id = %event.user_id(),
            "Handling {}",
            event.event_type()
        );
        let result = match event {
            UserLifecycleEvent::Deleted(e) => self.coordinator.deactivate_all(e.user_id).await,
            UserLifecycleEvent::StatusChanged(e) => {
                self.coordinator.apply_status(e.user_id, e.is_active).await
            }
        };
        result.map(|_| ()).map_err(to_stream_error)
    }

    fn name(&self) -> &'static str {
        "user_lifecycle"
    }
}

/// Register the user lifecycle consumer.
pub fn register_user_event_consumers(
    registry: &mut SubscriberRegistry,
    backend: Arc<dyn StreamBackend>,
    coordinator: ConsistencyCoordinator,
    retry: RetryPolicy,
) -> Result<(), StreamError> {
    registry.register(StreamWorker::new(
        backend,
        Arc::new(UserLifecycleProcessor::new(coordinator)),
        WorkerConfig::from_stream_def::<UserLifecycleStream>().with_retry(retry),
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateProduct, Product, ProductFilter};
    use crate::repository::{InMemoryProductStore, MockProductStore, ProductStore};
    use domain_events::{
        StreamUserEventPublisher, UserDeletedEvent, UserEventPublisher, UserStatusChangedEvent,
    };
    use rust_decimal::Decimal;
    use stream_worker::{DeliveryOutcome, DlqManager, InMemoryStreamBackend, StreamDef};
    use uuid::Uuid;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig::from_stream_def::<UserLifecycleStream>()
            .with_consumer_id("test")
            .with_blocking(None)
            .with_retry(fast_retry())
    }

    async fn backend_with_groups() -> Arc<InMemoryStreamBackend> {
        let backend = Arc::new(InMemoryStreamBackend::new());
        backend
            .ensure_group(&UserLifecycleStream::stream_key(), UserLifecycleStream::QUEUE)
            .await
            .unwrap();
        backend
    }

    async fn store_with(owner: Uuid, count: usize) -> InMemoryProductStore {
        let store = InMemoryProductStore::new();
        for i in 0..count {
            store
                .add(Product::new(
                    owner,
                    CreateProduct {
                        name: format!("P{}", i),
                        description: None,
                        price: Decimal::from(3),
                        is_available: true,
                    },
                ))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_deleted_event_soft_deletes_and_redelivery_is_noop() {
        let owner = Uuid::new_v4();
        let store = store_with(owner, 2).await;
        let backend = backend_with_groups().await;
        let coordinator = ConsistencyCoordinator::new(Arc::new(store.clone()));
        let worker = StreamWorker::new(
            backend.clone(),
            Arc::new(UserLifecycleProcessor::new(coordinator)),
            config(),
        );
        let publisher = StreamUserEventPublisher::new(backend.clone());

        let event = UserDeletedEvent::new(owner);
        publisher.user_deleted(&event).await.unwrap();
        // At-least-once: the same event again
        publisher.user_deleted(&event).await.unwrap();

        let outcomes = worker.poll_once().await.unwrap();
        assert_eq!(outcomes, vec![DeliveryOutcome::Acked, DeliveryOutcome::Acked]);
        assert!(store.list(ProductFilter::for_owner(owner)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_events_toggle_products() {
        let owner = Uuid::new_v4();
        let store = store_with(owner, 2).await;
        let backend = backend_with_groups().await;
        let worker = StreamWorker::new(
            backend.clone(),
            Arc::new(UserLifecycleProcessor::new(ConsistencyCoordinator::new(
                Arc::new(store.clone()),
            ))),
            config(),
        );
        let publisher = StreamUserEventPublisher::new(backend.clone());

        publisher
            .user_status_changed(&UserStatusChangedEvent::new(owner, false))
            .await
            .unwrap();
        worker.poll_once().await.unwrap();
        assert!(store.list(ProductFilter::for_owner(owner)).await.unwrap().is_empty());

        publisher
            .user_status_changed(&UserStatusChangedEvent::new(owner, true))
            .await
            .unwrap();
        worker.poll_once().await.unwrap();
        assert_eq!(store.list(ProductFilter::for_owner(owner)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_restore_after_delete_is_applied_in_publish_order() {
        let owner = Uuid::new_v4();
        let store = store_with(owner, 2).await;
        let backend = backend_with_groups().await;
        let worker = StreamWorker::new(
            backend.clone(),
            Arc::new(UserLifecycleProcessor::new(ConsistencyCoordinator::new(
                Arc::new(store.clone()),
            ))),
            config(),
        );
        let publisher = StreamUserEventPublisher::new(backend.clone());

        // Delete then restore, both queued before the consumer runs
        publisher
            .user_deleted(&UserDeletedEvent::new(owner))
            .await
            .unwrap();
        publisher
            .user_status_changed(&UserStatusChangedEvent::new(owner, true))
            .await
            .unwrap();

        let outcomes = worker.poll_once().await.unwrap();
        assert_eq!(outcomes, vec![DeliveryOutcome::Acked, DeliveryOutcome::Acked]);
        assert_eq!(store.list(ProductFilter::for_owner(owner)).await.unwrap().len(), 2);

        // And the reverse order leaves them hidden
        publisher
            .user_status_changed(&UserStatusChangedEvent::new(owner, true))
            .await
            .unwrap();
        publisher
            .user_deleted(&UserDeletedEvent::new(owner))
            .await
            .unwrap();
        worker.poll_once().await.unwrap();
        assert!(store.list(ProductFilter::for_owner(owner)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_outage_dead_letters_after_retries() {
        let mut store = MockProductStore::new();
        store
            .expect_set_deleted_by_owner()
            .times(3)
            .returning(|_, _| Err(ProductError::Database("connection refused".into())));

        let backend = backend_with_groups().await;
        let worker = StreamWorker::new(
            backend.clone(),
            Arc::new(UserLifecycleProcessor::new(ConsistencyCoordinator::new(Arc::new(store)))),
            config(),
        );
        StreamUserEventPublisher::new(backend.clone())
            .user_deleted(&UserDeletedEvent::new(Uuid::new_v4()))
            .await
            .unwrap();

        let outcomes = worker.poll_once().await.unwrap();
        assert_eq!(outcomes, vec![DeliveryOutcome::DeadLettered]);

        let dlq = DlqManager::new(backend.clone(), UserLifecycleStream::dlq_key())
            .list(10)
            .await
            .unwrap();
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].attempts, 3);
        assert_eq!(
            backend.pending_count(&UserLifecycleStream::stream_key(), UserLifecycleStream::QUEUE),
            0
        );
    }

    #[test]
    fn test_registration_rejects_duplicates() {
        let backend: Arc<dyn StreamBackend> = Arc::new(InMemoryStreamBackend::new());
        let coordinator = ConsistencyCoordinator::new(Arc::new(InMemoryProductStore::new()));
        let mut registry = SubscriberRegistry::new();

        register_user_event_consumers(&mut registry, backend.clone(), coordinator.clone(), fast_retry())
            .unwrap();
        assert_eq!(registry.len(), 1);

        let again = register_user_event_consumers(&mut registry, backend, coordinator, fast_retry());
        assert!(matches!(again, Err(StreamError::AlreadyRegistered { .. })));
    }

    #[test]
    fn test_error_classification() {
        assert!(to_stream_error(ProductError::Database("x".into())).category().should_retry());
        assert!(!to_stream_error(ProductError::Validation("x".into())).category().should_retry());
    }
}
