use super::{ReadFrom, StreamBackend, StreamMessage};
use crate::error::StreamError;
use async_trait::async_trait;
use redis::RedisResult;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

type Entries = Vec<(String, Vec<(String, String)>)>;
type ReadReply = Vec<(String, Entries)>;

/// Redis Streams backend over a shared `ConnectionManager`.
#[derive(Clone)]
pub struct RedisStreamBackend {
    redis: ConnectionManager,
}

impl RedisStreamBackend {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

fn into_messages(entries: Entries) -> Vec<StreamMessage> {
    entries
        .into_iter()
        .map(|(id, fields)| StreamMessage { id, fields })
        .collect()
}

#[async_trait]
impl StreamBackend for RedisStreamBackend {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result.map_err(StreamError::from) {
            Ok(()) => {
                info!(stream = %stream, group = %group, "Created consumer group");
                Ok(())
            }
            Err(e) if e.is_busy_group() => {
                debug!(stream = %stream, group = %group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn append(
        &self,
        stream: &str,
        max_len: i64,
        fields: &[(&str, &str)],
    ) -> Result<String, StreamError> {
        let mut conn = self.redis.clone();

        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("MAXLEN").arg("~").arg(max_len).arg("*");
        for (key, value) in fields {
            cmd.arg(*key).arg(*value);
        }

        let id: String = cmd.query_async(&mut conn).await?;
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
        let mut conn = self.redis.clone();

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP").arg(group).arg(consumer);
        if let ReadFrom::New {
            block_ms: Some(block),
        } = from
        {
            cmd.arg("BLOCK").arg(block);
        }
        cmd.arg("COUNT").arg(count).arg("STREAMS").arg(stream);
        cmd.arg(match from {
            ReadFrom::Pending => "0",
            ReadFrom::New { .. } => ">",
        });

        // Nil when a blocking read times out.
        let reply: Option<ReadReply> = cmd.query_async(&mut conn).await?;

        Ok(reply
            .unwrap_or_default()
            .into_iter()
            .flat_map(|(_, entries)| into_messages(entries))
            .collect())
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), StreamError> {
        let mut conn = self.redis.clone();
        let _: i64 = redis::cmd("XACK")
            .arg(stream)
            .arg(group)
            .arg(id)
            .query_async(&mut conn)
            .await?;
        debug!(stream_id = %id, "Acknowledged message");
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
        let mut conn = self.redis.clone();

        // (id, consumer, idle ms, delivery count)
        let pending: Vec<(String, String, u64, u64)> = redis::cmd("XPENDING")
            .arg(stream)
            .arg(group)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        let ids: Vec<String> = pending
            .into_iter()
            .filter(|(_, owner, idle, _)| owner != consumer && *idle >= min_idle_ms)
            .map(|(id, _, _, _)| id)
            .collect();

        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(stream).arg(group).arg(consumer).arg(min_idle_ms);
        for id in &ids {
            cmd.arg(id);
        }

        let entries: Entries = cmd.query_async(&mut conn).await?;
        if !entries.is_empty() {
            warn!(count = entries.len(), stream = %stream, "Claimed abandoned messages");
        }
        Ok(into_messages(entries))
    }

    async fn range(&self, stream: &str, count: usize) -> Result<Vec<StreamMessage>, StreamError> {
        let mut conn = self.redis.clone();
        let entries: Entries = redis::cmd("XRANGE")
            .arg(stream)
            .arg("-")
            .arg("+")
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(into_messages(entries))
    }
}
