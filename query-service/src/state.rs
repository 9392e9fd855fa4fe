//! Application state for query service.

use std::sync::Arc;

use common::config::AppConfig;
use connection_service::ConnectionManager;

use crate::dispatcher::{Dispatcher, QueryExecutor};
use crate::persistence::{MongoSavedSearchStore, SavedSearchStore};
use crate::refresh::RefreshTracker;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub connections: Arc<ConnectionManager>,
    pub executor: Arc<dyn QueryExecutor>,
    pub saved_searches: Arc<dyn SavedSearchStore>,
    pub refresh: Arc<RefreshTracker>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let connections = Arc::new(ConnectionManager::new(&config));
        let executor = Arc::new(Dispatcher::new(connections.clone(), config.query_timeout()));
        let saved_searches = Arc::new(MongoSavedSearchStore::new(
            connections.clone(),
            config.saved_search_collection.clone(),
        ));
        Self {
            config,
            connections,
            executor,
            saved_searches,
            refresh: Arc::new(RefreshTracker::new()),
        }
    }

    #[cfg(test)]
    pub fn with_backends(
        config: AppConfig,
        connections: ConnectionManager,
        executor: Arc<dyn QueryExecutor>,
        saved_searches: Arc<dyn SavedSearchStore>,
    ) -> Self {
        Self {
            config,
            connections: Arc::new(connections),
            executor,
            saved_searches,
            refresh: Arc::new(RefreshTracker::new()),
        }
    }
}
