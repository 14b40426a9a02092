pub mod delivery;
pub mod subscription;

pub use delivery::{
    ActivityItem, ActivityKind, AttemptOutcome, DeliveryAttempt, DeliveryStatus,
    DeliveryStatusResponse, NewDeliveryAttempt, SystemStats, WebhookDelivery,
};
pub use subscription::{
    CreateSubscriptionRequest, PaginatedSubscriptions, Subscription, SubscriptionResponse,
    UpdateSubscriptionRequest,
};
