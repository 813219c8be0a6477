//! Application state for the database service.

use std::sync::Arc;

use common::config::AppConfig;

use crate::pool::PoolSettings;
use crate::registry::ConnectionRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Creates a new application state with an empty registry.
    pub fn new(config: AppConfig) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new(PoolSettings::from_config(&config))),
            config,
        }
    }
}
