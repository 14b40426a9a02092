use std::sync::Arc;

use webhook_cache::SubscriptionCache;
use webhook_store::StoreAdapter;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreAdapter>,
    pub cache: Arc<dyn SubscriptionCache>,
}
