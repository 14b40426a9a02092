//! In-memory fakes for the store/queue/cache adapters, shared by the
//! scenario tests. Deliberately simple: no persistence, no real delay
//! scheduling (re-enqueues with a delay become immediately ready, since
//! these tests assert on attempt counts and ordering, not wall-clock time).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use webhook_cache::SubscriptionCache;
use webhook_common::Result;
use webhook_domain::{
    ActivityItem, ActivityKind, DeliveryAttempt, DeliveryStatus, NewDeliveryAttempt, Subscription,
    SystemStats, WebhookDelivery,
};
use webhook_queue::WorkQueue;
use webhook_store::StoreAdapter;

pub struct FakeStore {
    subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    deliveries: Mutex<HashMap<Uuid, WebhookDelivery>>,
    attempts: Mutex<HashMap<Uuid, Vec<DeliveryAttempt>>>,
    next_attempt_id: AtomicI64,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            deliveries: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            next_attempt_id: AtomicI64::new(1),
        }
    }

    pub async fn delivery_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }
}

#[async_trait]
impl StoreAdapter for FakeStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_delivery(
        &self,
        subscription_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<WebhookDelivery> {
        let delivery = WebhookDelivery {
            id: Uuid::new_v4(),
            subscription_id,
            payload,
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
            last_attempt_at: None,
        };
        self.deliveries
            .lock()
            .unwrap()
            .insert(delivery.id, delivery.clone());
        Ok(delivery)
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>> {
        Ok(self.deliveries.lock().unwrap().get(&id).cloned())
    }

    async fn update_delivery_status(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        last_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let Some(delivery) = self.deliveries.lock().unwrap().get_mut(&id) {
            delivery.status = status;
            if let Some(at) = last_attempt_at {
                delivery.last_attempt_at = Some(at);
            }
        }
        Ok(())
    }

    async fn insert_attempt(&self, attempt: NewDeliveryAttempt) -> Result<DeliveryAttempt> {
        let row = DeliveryAttempt {
            id: self.next_attempt_id.fetch_add(1, Ordering::SeqCst),
            delivery_id: attempt.delivery_id,
            attempt_number: attempt.attempt_number,
            outcome: attempt.outcome,
            status_code: attempt.status_code,
            response_body: attempt.response_body,
            error_message: attempt.error_message,
            timestamp: Utc::now(),
        };
        self.attempts
            .lock()
            .unwrap()
            .entry(attempt.delivery_id)
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn delete_attempts_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut deleted = 0u64;
        for rows in self.attempts.lock().unwrap().values_mut() {
            let before = rows.len();
            rows.retain(|a| a.timestamp >= cutoff);
            deleted += (before - rows.len()) as u64;
        }
        Ok(deleted)
    }

    async fn get_attempts_for_delivery(&self, delivery_id: Uuid) -> Result<Vec<DeliveryAttempt>> {
        let mut rows = self
            .attempts
            .lock()
            .unwrap()
            .get(&delivery_id)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|a| a.attempt_number);
        Ok(rows)
    }

    async fn get_recent_attempts_for_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
    ) -> Result<Vec<DeliveryAttempt>> {
        let delivery_ids: Vec<Uuid> = self
            .deliveries
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.subscription_id == subscription_id)
            .map(|d| d.id)
            .collect();

        let attempts = self.attempts.lock().unwrap();
        let mut rows: Vec<DeliveryAttempt> = delivery_ids
            .iter()
            .filter_map(|id| attempts.get(id))
            .flatten()
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        Ok(self.subscriptions.lock().unwrap().get(&id).cloned())
    }

    async fn insert_subscription(
        &self,
        target_url: String,
        secret_key: Option<String>,
    ) -> Result<Subscription> {
        let subscription = Subscription {
            id: Uuid::new_v4(),
            target_url,
            secret_key,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn update_subscription(
        &self,
        id: Uuid,
        target_url: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Option<Subscription>> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let Some(subscription) = subscriptions.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(url) = target_url {
            subscription.target_url = url;
        }
        if let Some(secret) = secret_key {
            subscription.secret_key = if secret.is_empty() { None } else { Some(secret) };
        }
        subscription.updated_at = Utc::now();
        Ok(Some(subscription.clone()))
    }

    async fn delete_subscription(&self, id: Uuid) -> Result<bool> {
        Ok(self.subscriptions.lock().unwrap().remove(&id).is_some())
    }

    async fn list_subscriptions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Subscription>, i64)> {
        let subscriptions = self.subscriptions.lock().unwrap();
        let total_count = subscriptions.len() as i64;
        let mut all: Vec<Subscription> = subscriptions.values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        let page = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total_count))
    }

    async fn get_dashboard_stats(&self) -> Result<SystemStats> {
        let total_subscriptions = self.subscriptions.lock().unwrap().len() as i64;
        let deliveries = self.deliveries.lock().unwrap();
        let recent_success_count = deliveries
            .values()
            .filter(|d| d.status == DeliveryStatus::Success)
            .count() as i64;
        let recent_failed_count = deliveries
            .values()
            .filter(|d| d.status == DeliveryStatus::Failed)
            .count() as i64;
        Ok(SystemStats {
            total_subscriptions,
            recent_success_count,
            recent_failed_count,
        })
    }

    async fn get_recent_activity(&self, limit: i64) -> Result<Vec<ActivityItem>> {
        let mut items: Vec<ActivityItem> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .map(|s| ActivityItem {
                kind: ActivityKind::SubscriptionCreated,
                subject_id: s.id,
                summary: format!("subscribed: {}", s.target_url),
                timestamp: s.created_at,
            })
            .collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }
}

pub struct FakeQueue {
    ready: Mutex<VecDeque<(Uuid, u32)>>,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
        }
    }

    /// Pop the next ready job, if any — the test-side equivalent of a
    /// worker's `consume`, without the blocking timeout.
    pub async fn pop_ready(&self) -> Option<(Uuid, u32)> {
        self.ready.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl WorkQueue for FakeQueue {
    async fn enqueue(
        &self,
        delivery_id: Uuid,
        attempt_count: u32,
        _delay_secs: u64,
    ) -> Result<()> {
        self.ready
            .lock()
            .unwrap()
            .push_back((delivery_id, attempt_count));
        Ok(())
    }

    async fn consume(&self, _timeout_secs: u64) -> Result<Option<(Uuid, u32)>> {
        Ok(self.ready.lock().unwrap().pop_front())
    }

    async fn promote_due(&self) -> Result<u64> {
        Ok(0)
    }

    async fn ready_len(&self) -> Result<u64> {
        Ok(self.ready.lock().unwrap().len() as u64)
    }
}

pub struct FakeCache {
    entries: Mutex<HashMap<Uuid, Subscription>>,
}

impl FakeCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SubscriptionCache for FakeCache {
    async fn get(&self, id: Uuid) -> Option<Subscription> {
        self.entries.lock().unwrap().get(&id).cloned()
    }

    async fn set(&self, subscription: &Subscription) {
        self.entries
            .lock()
            .unwrap()
            .insert(subscription.id, subscription.clone());
    }

    async fn delete(&self, id: Uuid) {
        self.entries.lock().unwrap().remove(&id);
    }
}
