//! Worker configuration.

use crate::registry::StreamDef;
use std::time::Duration;
use uuid::Uuid;

/// In-process retry policy for a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry `retry` (0-based): `base * 2^retry`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub stream_name: String,
    pub consumer_group: String,
    /// Unique per process.
    pub consumer_id: String,
    pub dlq_stream: String,
    pub max_length: i64,
    pub batch_size: usize,
    /// XREADGROUP BLOCK in milliseconds; `None` reads without blocking.
    pub block_timeout_ms: Option<u64>,
    /// Sleep between empty reads.
    pub poll_interval_ms: u64,
    /// Pending entries idle this long are claimed from other (dead) consumers.
    pub claim_idle_ms: u64,
    pub retry: RetryPolicy,
}

impl WorkerConfig {
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            stream_name: S::stream_key(),
            consumer_group: S::QUEUE.to_string(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            dlq_stream: S::dlq_key(),
            max_length: S::MAX_LENGTH,
            batch_size: 10,
            block_timeout_ms: Some(5_000),
            poll_interval_ms: 100,
            claim_idle_ms: 60_000,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_blocking(mut self, timeout_ms: Option<u64>) -> Self {
        self.block_timeout_ms = timeout_ms;
        self
    }

    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
