use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::QueryExecutor;

/// Shared, immutable request context: configuration plus the query executor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub executor: Arc<dyn QueryExecutor>,
}

impl AppState {
    pub fn new(config: AppConfig, executor: Arc<dyn QueryExecutor>) -> Self {
        Self { config: Arc::new(config), executor }
    }

    pub fn executor(&self) -> &dyn QueryExecutor {
        self.executor.as_ref()
    }
}
