//! Job traits and the generic `StreamWorker` loop.

use crate::backend::{ReadFrom, StreamBackend, StreamMessage};
use crate::config::WorkerConfig;
use crate::dlq::{DlqEntry, DlqManager};
use crate::error::StreamError;
use crate::metrics::StreamMetrics;
use crate::registry::Subscriber;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Payload carried in the `job` field of a stream entry.
pub trait StreamJob: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Stable id for logs and dead-letter entries.
    fn job_id(&self) -> String;
}

/// Domain handler for one job type.
///
/// Handlers must be idempotent: a delivery can be processed more than once.
#[async_trait]
pub trait StreamProcessor<J: StreamJob>: Send + Sync {
    async fn process(&self, job: &J) -> Result<(), StreamError>;

    fn name(&self) -> &'static str;
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Processed and acknowledged.
    Acked,
    /// Failed, written to the dead-letter stream, then acknowledged.
    DeadLettered,
    /// Left unacknowledged; it will be read again from the pending list.
    Pending,
}

/// Consumer-group worker for one stream.
///
/// Each delivery is attempted once plus up to `retry.max_retries` in-process retries with
/// exponential backoff. Permanent errors skip the retries. A delivery is acknowledged only
/// after success or after its dead-letter entry has been written.
pub struct StreamWorker<J, P>
where
    J: StreamJob,
    P: StreamProcessor<J>,
{
    backend: Arc<dyn StreamBackend>,
    processor: Arc<P>,
    dlq: DlqManager,
    metrics: StreamMetrics,
    config: WorkerConfig,
    _job: PhantomData<fn() -> J>,
}

impl<J, P> StreamWorker<J, P>
where
    J: StreamJob + 'static,
    P: StreamProcessor<J> + 'static,
{
    pub fn new(backend: Arc<dyn StreamBackend>, processor: Arc<P>, config: WorkerConfig) -> Self {
        let dlq = DlqManager::new(backend.clone(), config.dlq_stream.clone());
        let metrics = StreamMetrics::new(config.stream_name.clone(), processor.name());
        Self {
            backend,
            processor,
            dlq,
            metrics,
            config,
            _job: PhantomData,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            consumer_id = %self.config.consumer_id,
            stream = %self.config.stream_name,
            group = %self.config.consumer_group,
            processor = %self.processor.name(),
            "Starting stream worker"
        );

        self.backend
            .ensure_group(&self.config.stream_name, &self.config.consumer_group)
            .await?;

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let claim_interval = Duration::from_millis(self.config.claim_idle_ms / 2);
        let mut last_claim = Instant::now();
        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                batch = self.next_batch() => batch,
            };

            let pause = match batch {
                Ok(messages) if messages.is_empty() => {
                    consecutive_errors = 0;
                    Some(poll_interval)
                }
                Ok(messages) => {
                    if consecutive_errors > 0 {
                        info!(consecutive_errors, "Stream connection recovered");
                        consecutive_errors = 0;
                    }
                    let outcomes = self.handle_all(&messages).await;
                    // Back off before the stuck entries are read again.
                    outcomes
                        .contains(&DeliveryOutcome::Pending)
                        .then(|| self.config.retry.delay_for(0))
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if e.is_no_group() {
                        warn!("Consumer group missing, recreating");
                        if let Err(create_err) = self
                            .backend
                            .ensure_group(&self.config.stream_name, &self.config.consumer_group)
                            .await
                        {
                            error!(error = %create_err, "Failed to recreate consumer group");
                        }
                    } else {
                        error!(error = %e, consecutive_errors, "Error reading stream");
                    }
                    Some(self.config.retry.delay_for(consecutive_errors.min(6)))
                }
            };

            if last_claim.elapsed() >= claim_interval {
                last_claim = Instant::now();
                match self.claim_abandoned().await {
                    Ok(claimed) if !claimed.is_empty() => {
                        self.handle_all(&claimed).await;
                    }
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "Error claiming abandoned messages"),
                }
            }

            if let Some(delay) = pause {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        info!(stream = %self.config.stream_name, "Stream worker stopped");
        Ok(())
    }

    /// Read one batch (own pending entries first, then new ones) and handle it.
    pub async fn poll_once(&self) -> Result<Vec<DeliveryOutcome>, StreamError> {
        let messages = self.next_batch().await?;
        Ok(self.handle_all(&messages).await)
    }

    async fn next_batch(&self) -> Result<Vec<StreamMessage>, StreamError> {
        let pending = self
            .backend
            .read_group(
                &self.config.stream_name,
                &self.config.consumer_group,
                &self.config.consumer_id,
                self.config.batch_size,
                ReadFrom::Pending,
            )
            .await?;

        if !pending.is_empty() {
            debug!(count = pending.len(), "Re-reading pending messages");
            return Ok(pending);
        }

        self.backend
            .read_group(
                &self.config.stream_name,
                &self.config.consumer_group,
                &self.config.consumer_id,
                self.config.batch_size,
                ReadFrom::New {
                    block_ms: self.config.block_timeout_ms,
                },
            )
            .await
    }

    async fn claim_abandoned(&self) -> Result<Vec<StreamMessage>, StreamError> {
        let claimed = self
            .backend
            .claim_idle(
                &self.config.stream_name,
                &self.config.consumer_group,
                &self.config.consumer_id,
                self.config.claim_idle_ms,
                self.config.batch_size,
            )
            .await?;
        if !claimed.is_empty() {
            self.metrics.message_claimed(claimed.len());
        }
        Ok(claimed)
    }

    async fn handle_all(&self, messages: &[StreamMessage]) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(messages.len());
        for message in messages {
            outcomes.push(self.handle_delivery(message).await);
        }
        outcomes
    }

    /// Process one delivery through retry, dead-letter and acknowledgement.
    pub async fn handle_delivery(&self, message: &StreamMessage) -> DeliveryOutcome {
        self.metrics.job_received();

        let raw = message.field("job");
        let parsed: Result<J, StreamError> = match raw {
            Some(json) => serde_json::from_str(json).map_err(StreamError::from),
            None => Err(StreamError::permanent("missing 'job' field")),
        };

        let (job_id, job_data, attempts, failure) = match parsed {
            Ok(job) => match self.process_with_retry(&job, &message.id).await {
                Ok(()) => return self.ack(message, DeliveryOutcome::Acked).await,
                Err((e, attempts)) => (
                    job.job_id(),
                    serde_json::to_value(&job).unwrap_or(serde_json::Value::Null),
                    attempts,
                    e,
                ),
            },
            Err(e) => {
                warn!(stream_id = %message.id, error = %e, "Unreadable job payload");
                let data = raw
                    .map(|r| {
                        serde_json::from_str(r)
                            .unwrap_or_else(|_| serde_json::Value::String(r.to_string()))
                    })
                    .unwrap_or(serde_json::Value::Null);
                (message.id.clone(), data, 1, e)
            }
        };

        self.metrics.job_failed(failure.category().as_str());

        let entry = DlqEntry {
            job_id,
            job_data,
            error: failure.to_string(),
            original_stream_id: message.id.clone(),
            attempts,
            failed_at: Utc::now(),
        };

        match self.dlq.move_to_dlq(&entry).await {
            Ok(_) => {
                self.metrics.job_moved_to_dlq();
                self.ack(message, DeliveryOutcome::DeadLettered).await
            }
            Err(e) => {
                error!(
                    stream_id = %message.id,
                    job_id = %entry.job_id,
                    error = %e,
                    "Dead-letter write failed, leaving message pending"
                );
                DeliveryOutcome::Pending
            }
        }
    }

    /// Returns the last error and the number of attempts made.
    async fn process_with_retry(&self, job: &J, stream_id: &str) -> Result<(), (StreamError, u32)> {
        let policy = self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let started = Instant::now();

            let error = match self.processor.process(job).await {
                Ok(()) => {
                    self.metrics.job_processed(started.elapsed());
                    debug!(stream_id = %stream_id, job_id = %job.job_id(), attempt, "Processed job");
                    return Ok(());
                }
                Err(e) => e,
            };

            let retries_used = attempt - 1;
            let category = error.category();
            if !category.should_retry() || retries_used >= policy.max_retries {
                warn!(
                    stream_id = %stream_id,
                    job_id = %job.job_id(),
                    attempts = attempt,
                    error = %error,
                    error_category = category.as_str(),
                    "Job failed, giving up"
                );
                return Err((error, attempt));
            }

            let delay = policy.delay_for(retries_used);
            self.metrics.job_retried();
            warn!(
                stream_id = %stream_id,
                job_id = %job.job_id(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Job failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn ack(&self, message: &StreamMessage, outcome: DeliveryOutcome) -> DeliveryOutcome {
        match self
            .backend
            .ack(&self.config.stream_name, &self.config.consumer_group, &message.id)
            .await
        {
            Ok(()) => outcome,
            Err(e) => {
                error!(stream_id = %message.id, error = %e, "Failed to ACK message");
                DeliveryOutcome::Pending
            }
        }
    }
}

#[async_trait]
impl<J, P> Subscriber for StreamWorker<J, P>
where
    J: StreamJob + 'static,
    P: StreamProcessor<J> + 'static,
{
    fn stream(&self) -> &str {
        &self.config.stream_name
    }

    fn group(&self) -> &str {
        &self.config.consumer_group
    }

    async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        StreamWorker::run(self, shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryStreamBackend;
    use crate::config::RetryPolicy;
    use crate::registry::StreamDef;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Deleted;
    impl StreamDef for Deleted {
        const EXCHANGE: &'static str = "user_events";
        const ROUTING_KEY: &'static str = "user.deleted";
        const QUEUE: &'static str = "products.user_deleted";
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Job {
        id: String,
    }

    impl StreamJob for Job {
        fn job_id(&self) -> String {
            self.id.clone()
        }
    }

    /// Fails the first `failures` calls with the given category.
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        permanent: bool,
    }

    impl Flaky {
        fn new(failures: u32, permanent: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                failures,
                permanent,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StreamProcessor<Job> for Flaky {
        async fn process(&self, _job: &Job) -> Result<(), StreamError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                if self.permanent {
                    return Err(StreamError::permanent("rejected"));
                }
                return Err(StreamError::transient("store unavailable"));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn config() -> WorkerConfig {
        WorkerConfig::from_stream_def::<Deleted>()
            .with_consumer_id("test-consumer")
            .with_blocking(None)
            .with_poll_interval_ms(5)
            .with_retry(RetryPolicy {
                max_retries: 3,
                base_delay_ms: 1,
                max_delay_ms: 4,
            })
    }

    async fn setup(
        processor: Arc<Flaky>,
    ) -> (Arc<InMemoryStreamBackend>, StreamWorker<Job, Flaky>) {
        let backend = Arc::new(InMemoryStreamBackend::new());
        let worker = StreamWorker::new(backend.clone(), processor, config());
        backend
            .ensure_group(&Deleted::stream_key(), Deleted::QUEUE)
            .await
            .unwrap();
        (backend, worker)
    }

    async fn publish(backend: &InMemoryStreamBackend, payload: &str) {
        backend
            .append(&Deleted::stream_key(), 100, &[("job", payload)])
            .await
            .unwrap();
    }

    async fn dlq_entries(backend: &Arc<InMemoryStreamBackend>) -> Vec<DlqEntry> {
        DlqManager::new(backend.clone(), Deleted::dlq_key())
            .list(10)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_success_is_acked() {
        let processor = Flaky::new(0, false);
        let (backend, worker) = setup(processor.clone()).await;
        publish(&backend, r#"{"id":"a"}"#).await;

        let outcomes = worker.poll_once().await.unwrap();

        assert_eq!(outcomes, vec![DeliveryOutcome::Acked]);
        assert_eq!(backend.pending_count(&Deleted::stream_key(), Deleted::QUEUE), 0);
        assert!(dlq_entries(&backend).await.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_in_process() {
        let processor = Flaky::new(2, false);
        let (backend, worker) = setup(processor.clone()).await;
        publish(&backend, r#"{"id":"a"}"#).await;

        let outcomes = worker.poll_once().await.unwrap();

        assert_eq!(outcomes, vec![DeliveryOutcome::Acked]);
        assert_eq!(processor.calls(), 3);
        assert!(dlq_entries(&backend).await.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_dead_letter_then_ack() {
        let processor = Flaky::new(u32::MAX, false);
        let (backend, worker) = setup(processor.clone()).await;
        publish(&backend, r#"{"id":"a"}"#).await;

        let outcomes = worker.poll_once().await.unwrap();

        assert_eq!(outcomes, vec![DeliveryOutcome::DeadLettered]);
        assert_eq!(processor.calls(), 4);
        assert_eq!(backend.pending_count(&Deleted::stream_key(), Deleted::QUEUE), 0);

        let dlq = dlq_entries(&backend).await;
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].job_id, "a");
        assert_eq!(dlq[0].attempts, 4);
        assert_eq!(dlq[0].job_data["id"], "a");
        assert!(dlq[0].error.contains("store unavailable"));
    }

    #[tokio::test]
    async fn test_permanent_error_skips_retries() {
        let processor = Flaky::new(u32::MAX, true);
        let (backend, worker) = setup(processor.clone()).await;
        publish(&backend, r#"{"id":"a"}"#).await;

        let outcomes = worker.poll_once().await.unwrap();

        assert_eq!(outcomes, vec![DeliveryOutcome::DeadLettered]);
        assert_eq!(processor.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload_dead_lettered_without_processing() {
        let processor = Flaky::new(0, false);
        let (backend, worker) = setup(processor.clone()).await;
        publish(&backend, "not json").await;

        let outcomes = worker.poll_once().await.unwrap();

        assert_eq!(outcomes, vec![DeliveryOutcome::DeadLettered]);
        assert_eq!(processor.calls(), 0);
        let dlq = dlq_entries(&backend).await;
        assert_eq!(dlq[0].job_data, serde_json::json!("not json"));
    }

    #[tokio::test]
    async fn test_failed_dead_letter_write_leaves_message_pending() {
        let processor = Flaky::new(u32::MAX, true);
        let (backend, worker) = setup(processor.clone()).await;
        publish(&backend, r#"{"id":"a"}"#).await;

        backend.fail_appends(&Deleted::dlq_key(), true);
        let outcomes = worker.poll_once().await.unwrap();
        assert_eq!(outcomes, vec![DeliveryOutcome::Pending]);
        assert_eq!(backend.pending_count(&Deleted::stream_key(), Deleted::QUEUE), 1);

        // Redelivered from the pending list once the DLQ accepts writes again.
        backend.fail_appends(&Deleted::dlq_key(), false);
        let outcomes = worker.poll_once().await.unwrap();
        assert_eq!(outcomes, vec![DeliveryOutcome::DeadLettered]);
        assert_eq!(backend.pending_count(&Deleted::stream_key(), Deleted::QUEUE), 0);
        assert_eq!(dlq_entries(&backend).await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_processes_until_shutdown() {
        let processor = Flaky::new(0, false);
        let (backend, worker) = setup(processor.clone()).await;
        publish(&backend, r#"{"id":"a"}"#).await;
        publish(&backend, r#"{"id":"b"}"#).await;

        let (tx, rx) = watch::channel(false);
        let worker = Arc::new(worker);
        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(rx).await })
        };

        tokio::time::timeout(Duration::from_secs(2), async {
            while processor.calls() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(backend.pending_count(&Deleted::stream_key(), Deleted::QUEUE), 0);
    }
}
