//! Application state for connection service.

use std::sync::Arc;

use common::config::AppConfig;
use connection_service::ConnectionManager;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub manager: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            manager: Arc::new(ConnectionManager::new(&config)),
            config,
        }
    }

    #[cfg(test)]
    pub fn with_manager(config: AppConfig, manager: ConnectionManager) -> Self {
        Self {
            config,
            manager: Arc::new(manager),
        }
    }
}
