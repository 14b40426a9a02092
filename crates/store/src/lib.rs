//! Typed CRUD over `subscriptions`, `webhook_deliveries`, and
//! `delivery_attempts`, backed by PostgreSQL via sqlx.
//!
//! Status writes are append-only and monotonic by construction: the worker
//! never issues a write that would leave a terminal delivery (`success` /
//! `failed`), so no compare-and-set is needed here — correctness rests on the
//! queue's per-delivery single-in-flight property (see the worker crate).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use webhook_domain::{
    ActivityItem, ActivityKind, DeliveryAttempt, DeliveryStatus, NewDeliveryAttempt, Subscription,
    SystemStats, WebhookDelivery,
};

use webhook_common::error::Result;

#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Cheap connectivity probe for readiness endpoints.
    async fn ping(&self) -> Result<()>;

    // -- deliveries --
    async fn insert_delivery(
        &self,
        subscription_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<WebhookDelivery>;
    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>>;
    async fn update_delivery_status(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        last_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    // -- attempts --
    async fn insert_attempt(&self, attempt: NewDeliveryAttempt) -> Result<DeliveryAttempt>;
    async fn delete_attempts_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
    async fn get_attempts_for_delivery(&self, delivery_id: Uuid) -> Result<Vec<DeliveryAttempt>>;
    async fn get_recent_attempts_for_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
    ) -> Result<Vec<DeliveryAttempt>>;

    // -- subscriptions --
    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>>;
    async fn insert_subscription(
        &self,
        target_url: String,
        secret_key: Option<String>,
    ) -> Result<Subscription>;
    async fn update_subscription(
        &self,
        id: Uuid,
        target_url: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Option<Subscription>>;
    async fn delete_subscription(&self, id: Uuid) -> Result<bool>;
    async fn list_subscriptions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Subscription>, i64)>;

    // -- analytics --
    async fn get_dashboard_stats(&self) -> Result<SystemStats>;
    /// Most recent `limit` items across subscription creations and delivery
    /// attempts, newest first.
    async fn get_recent_activity(&self, limit: i64) -> Result<Vec<ActivityItem>>;
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StoreAdapter for PostgresStore {
    async fn ping(&self) -> Result<()> {
        webhook_common::db::health_check(&self.pool).await
    }

    async fn insert_delivery(
        &self,
        subscription_id: Uuid,
        payload: serde_json::Value,
    ) -> Result<WebhookDelivery> {
        let delivery = sqlx::query_as::<_, WebhookDelivery>(
            r#"
            INSERT INTO webhook_deliveries (subscription_id, payload, status)
            VALUES ($1, $2, 'pending')
            RETURNING id, subscription_id, payload, status, created_at, last_attempt_at
            "#,
        )
        .bind(subscription_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(delivery)
    }

    async fn get_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>> {
        let delivery = sqlx::query_as::<_, WebhookDelivery>(
            r#"
            SELECT id, subscription_id, payload, status, created_at, last_attempt_at
            FROM webhook_deliveries WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(delivery)
    }

    async fn update_delivery_status(
        &self,
        id: Uuid,
        status: DeliveryStatus,
        last_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = $2,
                last_attempt_at = COALESCE($3, last_attempt_at)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(last_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_attempt(&self, attempt: NewDeliveryAttempt) -> Result<DeliveryAttempt> {
        let row = sqlx::query_as::<_, DeliveryAttempt>(
            r#"
            INSERT INTO delivery_attempts
                (delivery_id, attempt_number, outcome, status_code, response_body, error_message, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING id, delivery_id, attempt_number, outcome, status_code, response_body, error_message, timestamp
            "#,
        )
        .bind(attempt.delivery_id)
        .bind(attempt.attempt_number)
        .bind(attempt.outcome)
        .bind(attempt.status_code)
        .bind(attempt.response_body)
        .bind(attempt.error_message)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_attempts_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM delivery_attempts WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn get_attempts_for_delivery(&self, delivery_id: Uuid) -> Result<Vec<DeliveryAttempt>> {
        let rows = sqlx::query_as::<_, DeliveryAttempt>(
            r#"
            SELECT id, delivery_id, attempt_number, outcome, status_code, response_body, error_message, timestamp
            FROM delivery_attempts
            WHERE delivery_id = $1
            ORDER BY attempt_number ASC
            "#,
        )
        .bind(delivery_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Two-phase fetch matching the reference implementation: find the
    /// subscription's `limit*2` most recently created deliveries, then the
    /// `limit` most recent attempts among those deliveries. This is an
    /// approximation — kept for parity rather than rewritten as a single
    /// join (see DESIGN.md open question (c)).
    async fn get_recent_attempts_for_subscription(
        &self,
        subscription_id: Uuid,
        limit: i64,
    ) -> Result<Vec<DeliveryAttempt>> {
        let delivery_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM webhook_deliveries
            WHERE subscription_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(subscription_id)
        .bind(limit * 2)
        .fetch_all(&self.pool)
        .await?;

        if delivery_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, DeliveryAttempt>(
            r#"
            SELECT id, delivery_id, attempt_number, outcome, status_code, response_body, error_message, timestamp
            FROM delivery_attempts
            WHERE delivery_id = ANY($1)
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(&delivery_ids[..])
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_subscription(&self, id: Uuid) -> Result<Option<Subscription>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            "SELECT id, target_url, secret_key, created_at, updated_at FROM subscriptions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    async fn insert_subscription(
        &self,
        target_url: String,
        secret_key: Option<String>,
    ) -> Result<Subscription> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (target_url, secret_key)
            VALUES ($1, $2)
            RETURNING id, target_url, secret_key, created_at, updated_at
            "#,
        )
        .bind(target_url)
        .bind(secret_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(subscription)
    }

    async fn update_subscription(
        &self,
        id: Uuid,
        target_url: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Option<Subscription>> {
        // An explicit empty string clears the secret, matching the reference
        // implementation's `secret_key == '' -> None` normalization.
        let secret_key = secret_key.map(|s| if s.is_empty() { None } else { Some(s) });

        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET target_url = COALESCE($2, target_url),
                secret_key = CASE WHEN $3::bool THEN $4 ELSE secret_key END,
                updated_at = now()
            WHERE id = $1
            RETURNING id, target_url, secret_key, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(target_url)
        .bind(secret_key.is_some())
        .bind(secret_key.flatten())
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    async fn delete_subscription(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_subscriptions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Subscription>, i64)> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, target_url, secret_key, created_at, updated_at
            FROM subscriptions
            ORDER BY created_at DESC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let total_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&self.pool)
            .await?;

        Ok((subscriptions, total_count))
    }

    async fn get_dashboard_stats(&self) -> Result<SystemStats> {
        let total_subscriptions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&self.pool)
            .await?;

        let recent_success_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM webhook_deliveries
            WHERE status = $1 AND created_at >= now() - interval '24 hours'
            "#,
        )
        .bind(DeliveryStatus::Success)
        .fetch_one(&self.pool)
        .await?;

        let recent_failed_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM webhook_deliveries
            WHERE status = $1 AND created_at >= now() - interval '24 hours'
            "#,
        )
        .bind(DeliveryStatus::Failed)
        .fetch_one(&self.pool)
        .await?;

        Ok(SystemStats {
            total_subscriptions,
            recent_success_count,
            recent_failed_count,
        })
    }

    /// Fetches the `limit` most recent subscriptions and the `limit` most
    /// recent attempts independently, then merges and truncates in memory —
    /// matching the reference implementation's two-query-then-merge shape
    /// rather than a single UNION query.
    async fn get_recent_activity(&self, limit: i64) -> Result<Vec<ActivityItem>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, target_url, secret_key, created_at, updated_at
            FROM subscriptions
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let attempts = sqlx::query_as::<_, DeliveryAttempt>(
            r#"
            SELECT id, delivery_id, attempt_number, outcome, status_code, response_body, error_message, timestamp
            FROM delivery_attempts
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut items: Vec<ActivityItem> = subscriptions
            .into_iter()
            .map(|s| ActivityItem {
                kind: ActivityKind::SubscriptionCreated,
                subject_id: s.id,
                summary: format!("subscribed: {}", truncate(&s.target_url, 50)),
                timestamp: s.created_at,
            })
            .chain(attempts.into_iter().map(|a| ActivityItem {
                kind: ActivityKind::DeliveryAttempt,
                subject_id: a.delivery_id,
                summary: format!(
                    "delivery {}... attempt #{} - {:?}",
                    &a.delivery_id.to_string()[..8],
                    a.attempt_number,
                    a.outcome
                ),
                timestamp: a.timestamp,
            }))
            .collect();

        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(limit.max(0) as usize);
        Ok(items)
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        PgPool::connect(&url).await.ok()
    }

    #[tokio::test]
    async fn test_insert_and_get_subscription_roundtrip() {
        let Some(pool) = test_pool().await else {
            println!("skipping: DATABASE_URL not set");
            return;
        };
        let store = PostgresStore::new(pool);
        let created = store
            .insert_subscription("https://example.com/hook".to_string(), None)
            .await
            .unwrap();
        let fetched = store.get_subscription(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.target_url, "https://example.com/hook");
        store.delete_subscription(created.id).await.unwrap();
    }
}
