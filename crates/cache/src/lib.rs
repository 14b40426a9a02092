//! TTL-bounded subscription cache backed by Redis.
//!
//! The cache is an optimization, never a source of truth: every operation
//! degrades gracefully to a miss/no-op on Redis unavailability, and a
//! deserialization failure deletes the offending key rather than surfacing an
//! error to the caller.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;
use uuid::Uuid;
use webhook_domain::Subscription;

fn cache_key(id: Uuid) -> String {
    format!("subscription:{id}")
}

#[async_trait]
pub trait SubscriptionCache: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<Subscription>;
    async fn set(&self, subscription: &Subscription);
    async fn delete(&self, id: Uuid);
}

#[derive(Clone)]
pub struct RedisSubscriptionCache {
    manager: ConnectionManager,
    ttl_secs: u64,
}

impl RedisSubscriptionCache {
    pub fn new(manager: ConnectionManager, ttl_secs: u64) -> Self {
        Self { manager, ttl_secs }
    }
}

#[async_trait]
impl SubscriptionCache for RedisSubscriptionCache {
    async fn get(&self, id: Uuid) -> Option<Subscription> {
        let mut conn = self.manager.clone();
        let key = cache_key(id);

        let raw: Option<String> = match conn.get(&key).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "cache get failed, treating as miss");
                return None;
            }
        };

        let raw = raw?;
        match serde_json::from_str::<Subscription>(&raw) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(error = %e, %id, "cache entry failed to deserialize, deleting");
                let _ = conn.del::<_, ()>(&key).await;
                None
            }
        }
    }

    async fn set(&self, subscription: &Subscription) {
        let mut conn = self.manager.clone();
        let key = cache_key(subscription.id);

        let Ok(payload) = serde_json::to_string(subscription) else {
            return;
        };

        if let Err(e) = conn
            .set_ex::<_, _, ()>(&key, payload, self.ttl_secs)
            .await
        {
            warn!(error = %e, "cache set failed, continuing without caching");
        }
    }

    async fn delete(&self, id: Uuid) {
        let mut conn = self.manager.clone();
        if let Err(e) = conn.del::<_, ()>(cache_key(id)).await {
            warn!(error = %e, %id, "cache delete failed");
        }
    }
}
