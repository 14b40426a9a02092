use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `D.status`. `Success` and `Failed` are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Processing,
    FailedAttempt,
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// `A.outcome` for a single delivery attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeliveryAttempt {
    pub id: i64,
    pub delivery_id: Uuid,
    pub attempt_number: i32,
    pub outcome: AttemptOutcome,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A newly-completed attempt, not yet assigned an id/timestamp by the store.
#[derive(Debug, Clone)]
pub struct NewDeliveryAttempt {
    pub delivery_id: Uuid,
    pub attempt_number: i32,
    pub outcome: AttemptOutcome,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeliveryStatusResponse {
    pub delivery: WebhookDelivery,
    pub attempts: Vec<DeliveryAttempt>,
}

#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub total_subscriptions: i64,
    pub recent_success_count: i64,
    pub recent_failed_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    SubscriptionCreated,
    DeliveryAttempt,
}

#[derive(Debug, Serialize)]
pub struct ActivityItem {
    pub kind: ActivityKind,
    pub subject_id: Uuid,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(DeliveryStatus::Success.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(!DeliveryStatus::Processing.is_terminal());
        assert!(!DeliveryStatus::FailedAttempt.is_terminal());
    }
}
