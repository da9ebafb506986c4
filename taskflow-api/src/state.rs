//! Shared handler state: the task store and broker client every task
//! endpoint reads or writes through.

use std::sync::Arc;

use taskflow_shared::broker::BrokerClient;
use taskflow_shared::store::TaskStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub broker: Arc<BrokerClient>,
}
