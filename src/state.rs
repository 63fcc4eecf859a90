use std::sync::Arc;

use crate::config::AppConfig;
use crate::lifecycle::TaskLifecycle;
use crate::matching::dispatcher::Dispatcher;
use crate::matching::recommender::Recommender;
use crate::store::MarketStore;

/// Shared by every worker thread of the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
    pub dispatcher: Dispatcher,
    pub recommender: Recommender,
    pub lifecycle: TaskLifecycle,
}

impl AppState {
    pub fn new(store: Arc<dyn MarketStore>, config: &AppConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(store.clone(), config.dispatch_fan_out),
            recommender: Recommender::new(store.clone(), config.recommender_mode),
            lifecycle: TaskLifecycle::new(store.clone()),
            store,
        }
    }
}
