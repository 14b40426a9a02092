//! FIFO work queue adapter: a ready list for due jobs and a delayed ZSET for
//! jobs scheduled with a future delay, both backed by Redis.
//!
//! Delivery is at-least-once: a crash between `BRPOP` and the caller
//! finishing its work can redeliver a message. The delivery worker tolerates
//! this by idempotently re-checking the delivery's status before doing any
//! side effect (see `crates/worker`).

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use webhook_common::error::{Error, Result};

const READY_KEY: &str = "delivery_queue";
const DELAYED_KEY: &str = "delivery_queue:delayed";

/// The message carried through the queue: the delivery to act on, and how
/// many times it has already been attempted (0 on first dispatch).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct QueueMessage {
    delivery_id: Uuid,
    attempt_count: u32,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue `delivery_id` for dispatch. `delay_secs = 0` pushes directly
    /// onto the ready list; otherwise the job becomes due after `delay_secs`.
    async fn enqueue(&self, delivery_id: Uuid, attempt_count: u32, delay_secs: u64)
    -> Result<()>;

    /// Block up to `timeout_secs` for a ready job; `Ok(None)` on timeout.
    async fn consume(&self, timeout_secs: u64) -> Result<Option<(Uuid, u32)>>;

    /// Move delayed jobs whose delay has elapsed onto the ready list.
    /// Returns the number promoted. Intended to be called on a fixed
    /// interval by the worker process.
    async fn promote_due(&self) -> Result<u64>;

    /// Approximate length of the ready list, for metrics.
    async fn ready_len(&self) -> Result<u64>;
}

#[derive(Clone)]
pub struct RedisWorkQueue {
    manager: ConnectionManager,
}

impl RedisWorkQueue {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn enqueue(
        &self,
        delivery_id: Uuid,
        attempt_count: u32,
        delay_secs: u64,
    ) -> Result<()> {
        let message = QueueMessage {
            delivery_id,
            attempt_count,
        };
        let payload = serde_json::to_string(&message)?;
        let mut conn = self.manager.clone();

        if delay_secs == 0 {
            conn.lpush::<_, _, ()>(READY_KEY, payload)
                .await
                .map_err(|e| Error::Queue(e.to_string()))?;
        } else {
            let ready_at = (Utc::now().timestamp() as u64 + delay_secs) as f64;
            conn.zadd::<_, _, _, ()>(DELAYED_KEY, payload, ready_at)
                .await
                .map_err(|e| Error::Queue(e.to_string()))?;
        }
        Ok(())
    }

    async fn consume(&self, timeout_secs: u64) -> Result<Option<(Uuid, u32)>> {
        let mut conn = self.manager.clone();
        let result: Option<(String, String)> = conn
            .brpop(READY_KEY, timeout_secs as f64)
            .await
            .map_err(|e| Error::Queue(e.to_string()))?;

        let Some((_key, payload)) = result else {
            return Ok(None);
        };

        let message: QueueMessage = serde_json::from_str(&payload)?;
        Ok(Some((message.delivery_id, message.attempt_count)))
    }

    async fn promote_due(&self) -> Result<u64> {
        let mut conn = self.manager.clone();
        let now = Utc::now().timestamp() as f64;

        let due: Vec<String> = conn
            .zrangebyscore(DELAYED_KEY, f64::NEG_INFINITY, now)
            .await
            .map_err(|e| Error::Queue(e.to_string()))?;

        if due.is_empty() {
            return Ok(0);
        }

        for payload in &due {
            conn.lpush::<_, _, ()>(READY_KEY, payload)
                .await
                .map_err(|e| Error::Queue(e.to_string()))?;
            conn.zrem::<_, _, ()>(DELAYED_KEY, payload)
                .await
                .map_err(|e| Error::Queue(e.to_string()))?;
        }

        Ok(due.len() as u64)
    }

    async fn ready_len(&self) -> Result<u64> {
        let mut conn = self.manager.clone();
        let len: u64 = conn
            .llen(READY_KEY)
            .await
            .map_err(|e| Error::Queue(e.to_string()))?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_queue() -> Option<RedisWorkQueue> {
        let url = std::env::var("REDIS_URL").ok()?;
        let manager = webhook_common::open_connection_manager(&url).await.ok()?;
        Some(RedisWorkQueue::new(manager))
    }

    #[tokio::test]
    #[ignore] // requires a live Redis
    async fn test_enqueue_then_consume_roundtrip() {
        let Some(queue) = test_queue().await else {
            return;
        };
        let id = Uuid::new_v4();
        queue.enqueue(id, 0, 0).await.unwrap();

        let consumed = queue.consume(1).await.unwrap();
        assert_eq!(consumed, Some((id, 0)));
    }

    #[tokio::test]
    #[ignore]
    async fn test_consume_times_out_when_empty() {
        let Some(queue) = test_queue().await else {
            return;
        };
        let consumed = queue.consume(1).await.unwrap();
        assert_eq!(consumed, None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_delayed_enqueue_is_not_immediately_ready() {
        let Some(queue) = test_queue().await else {
            return;
        };
        let id = Uuid::new_v4();
        queue.enqueue(id, 1, 60).await.unwrap();

        let consumed = queue.consume(1).await.unwrap();
        assert_eq!(consumed, None, "delayed job should not be on the ready list yet");

        let promoted = queue.promote_due().await.unwrap();
        assert_eq!(promoted, 0, "job isn't due for 60s");
    }
}
