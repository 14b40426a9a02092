use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub target_url: String,
    pub secret_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Validate, Deserialize)]
pub struct CreateSubscriptionRequest {
    #[validate(url)]
    pub target_url: String,

    #[validate(length(min = 1, max = 255))]
    pub secret_key: Option<String>,
}

#[derive(Debug, Validate, Deserialize)]
pub struct UpdateSubscriptionRequest {
    #[validate(url)]
    pub target_url: Option<String>,

    /// An explicit empty string clears the secret; `None` leaves it unchanged.
    pub secret_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub id: Uuid,
    pub target_url: String,
    pub has_secret: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(subscription: Subscription) -> Self {
        Self {
            id: subscription.id,
            target_url: subscription.target_url,
            has_secret: subscription.secret_key.is_some(),
            created_at: subscription.created_at,
            updated_at: subscription.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginatedSubscriptions {
    pub total_count: i64,
    pub subscriptions: Vec<SubscriptionResponse>,
}
