//! Stream Worker Framework
//!
//! Consumer-group workers over Redis Streams with in-process retries and a dead-letter
//! stream.
//!
//! - **Channels**: [`StreamDef`] names an exchange, routing key and queue
//! - **Worker**: [`StreamWorker`] retries with backoff, dead-letters, then acknowledges
//! - **Registry**: [`SubscriberRegistry`] registers each `(stream, group)` once at startup
//! - **Backends**: [`RedisStreamBackend`], plus [`InMemoryStreamBackend`] for tests
//! - **Metrics**: Prometheus counters and a duration histogram
//!
//! ```ignore
//! let backend: Arc<dyn StreamBackend> = Arc::new(RedisStreamBackend::new(redis));
//!
//! let mut registry = SubscriberRegistry::new();
//! registry.register(StreamWorker::new(
//!     backend.clone(),
//!     processor,
//!     WorkerConfig::from_stream_def::<UserLifecycleStream>(),
//! ))?;
//!
//! let workers = registry.spawn_all(shutdown.subscribe());
//! ```

mod backend;
mod config;
mod dlq;
mod error;
pub mod metrics;
mod producer;
mod registry;
mod worker;

pub use backend::{InMemoryStreamBackend, ReadFrom, RedisStreamBackend, StreamBackend, StreamMessage};
pub use config::{RetryPolicy, WorkerConfig};
pub use dlq::{DlqEntry, DlqManager};
pub use error::{ErrorCategory, StreamError};
pub use metrics::{StreamMetrics, init_metrics, render_metrics};
pub use producer::StreamProducer;
pub use registry::{StreamDef, Subscriber, SubscriberRegistry};
pub use worker::{DeliveryOutcome, StreamJob, StreamProcessor, StreamWorker};
