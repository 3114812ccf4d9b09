//! Stream definitions and the process-wide subscriber registry.

use crate::error::StreamError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::info;

/// A named event channel: exchange, routing key and consuming queue.
///
/// The Redis stream key is `{EXCHANGE}:{ROUTING_KEY}`, the consumer group is `QUEUE`,
/// and failed deliveries land in `{EXCHANGE}:{ROUTING_KEY}:dlq`.
///
/// ```rust,ignore
/// pub struct UserLifecycleStream;
///
/// impl StreamDef for UserLifecycleStream {
///     const EXCHANGE: &'static str = "user_events";
///     const ROUTING_KEY: &'static str = "user.lifecycle";
///     const QUEUE: &'static str = "products.user_lifecycle";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    const EXCHANGE: &'static str;
    const ROUTING_KEY: &'static str;
    const QUEUE: &'static str;

    /// MAXLEN used on XADD (approximate trim).
    const MAX_LENGTH: i64 = 100_000;

    fn stream_key() -> String {
        format!("{}:{}", Self::EXCHANGE, Self::ROUTING_KEY)
    }

    fn dlq_key() -> String {
        format!("{}:dlq", Self::stream_key())
    }
}

/// A long-running consumer that can be registered once and spawned at startup.
#[async_trait]
pub trait Subscriber: Send + Sync {
    fn stream(&self) -> &str;
    fn group(&self) -> &str;
    async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), StreamError>;
}

/// Collects subscribers at startup and rejects a second registration for the same
/// `(stream, group)`.
#[derive(Default)]
pub struct SubscriberRegistry {
    keys: HashSet<(String, String)>,
    subscribers: Vec<Arc<dyn Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S>(&mut self, subscriber: S) -> Result<&mut Self, StreamError>
    where
        S: Subscriber + 'static,
    {
        let key = (subscriber.stream().to_string(), subscriber.group().to_string());
        if self.keys.contains(&key) {
            return Err(StreamError::AlreadyRegistered {
                stream: key.0,
                group: key.1,
            });
        }

        info!(stream = %key.0, group = %key.1, "Registered stream subscriber");
        self.keys.insert(key);
        self.subscribers.push(Arc::new(subscriber));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Spawn every subscriber; each stops when `shutdown` flips to `true`.
    pub fn spawn_all(self, shutdown: watch::Receiver<bool>) -> JoinSet<Result<(), StreamError>> {
        let mut set = JoinSet::new();
        for subscriber in self.subscribers {
            let rx = shutdown.clone();
            set.spawn(async move { subscriber.run(rx).await });
        }
        set
    }
}
