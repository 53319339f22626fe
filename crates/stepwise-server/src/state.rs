use std::sync::Arc;

use stepwise_core::{ExecutionStore, Workflow};

pub type AppState = Arc<AppStateInner>;

/// Shared, read-only server state.
pub struct AppStateInner {
    pub workflow: Arc<Workflow>,
    pub store: ExecutionStore,
}

impl AppStateInner {
    pub fn new(workflow: Arc<Workflow>, store: ExecutionStore) -> Self {
        Self { workflow, store }
    }
}
