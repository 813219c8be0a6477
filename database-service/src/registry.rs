//! In-memory registry of live database connections.
//!
//! Maps a deterministic handle to the submitted parameters and the open
//! client. Nothing is persisted; entries live until closed or shutdown.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use common::errors::{AppError, AppResult};
use common::models::{ConnectionItem, ConnectionParams, DbType};
use common::utils::IdGenerator;
use tokio::sync::RwLock;

use crate::pool::{DatabaseClient, DatabasePool, PoolSettings};

/// A registered connection.
#[derive(Clone)]
pub struct ConnectionEntry {
    pub handle: String,
    pub db_type: DbType,
    pub params: Arc<ConnectionParams>,
    pub client: Arc<dyn DatabaseClient>,
}

impl ConnectionEntry {
    /// Credential-free summary for listings.
    pub fn summary(&self) -> ConnectionItem {
        ConnectionItem {
            connection_id: self.handle.clone(),
            database_type: self.db_type.label().to_string(),
            host: self.params.host.clone(),
            port: self.params.port,
            database: self.params.database.clone(),
        }
    }
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("handle", &self.handle)
            .field("db_type", &self.db_type)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Registry of open connections, shared by all requests.
pub struct ConnectionRegistry {
    settings: PoolSettings,
    entries: RwLock<HashMap<String, ConnectionEntry>>,
}

impl ConnectionRegistry {
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            settings,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a pool for `params` and registers it.
    ///
    /// Returns the handle derived from `(db_type, host, port, database)`.
    /// The pool is opened eagerly; failures are not retried.
    pub async fn register(&self, params: ConnectionParams) -> AppResult<String> {
        let db_type = params.parsed_db_type()?;
        tracing::info!(url = %params.redacted_url(db_type), "Opening database pool");

        let pool = DatabasePool::connect(db_type, &params, &self.settings).await?;
        Ok(self.insert(db_type, params, Arc::new(pool)).await)
    }

    /// Stores an already opened client.
    ///
    /// An existing entry under the same handle is replaced and its client closed.
    pub(crate) async fn insert(
        &self,
        db_type: DbType,
        params: ConnectionParams,
        client: Arc<dyn DatabaseClient>,
    ) -> String {
        let handle =
            IdGenerator::connection_handle(db_type, &params.host, params.port, &params.database);
        let entry = ConnectionEntry {
            handle: handle.clone(),
            db_type,
            params: Arc::new(params),
            client,
        };

        let previous = self.entries.write().await.insert(handle.clone(), entry);
        if let Some(previous) = previous {
            tracing::warn!(handle = %handle, "Connection re-registered, closing replaced pool");
            previous.client.close().await;
        }

        tracing::info!(handle = %handle, "Connection registered");
        handle
    }

    /// Resolves a handle to its entry.
    pub async fn lookup(&self, handle: &str) -> AppResult<ConnectionEntry> {
        self.entries
            .read()
            .await
            .get(handle)
            .cloned()
            .ok_or_else(|| AppError::ConnectionNotFound(handle.to_string()))
    }

    /// Summaries of every live connection, sorted by handle.
    pub async fn list(&self) -> Vec<ConnectionItem> {
        let mut items: Vec<ConnectionItem> = self
            .entries
            .read()
            .await
            .values()
            .map(ConnectionEntry::summary)
            .collect();
        items.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));
        items
    }

    /// Removes a connection and closes its client.
    pub async fn close(&self, handle: &str) -> AppResult<()> {
        let entry = self
            .entries
            .write()
            .await
            .remove(handle)
            .ok_or_else(|| AppError::ConnectionNotFound(handle.to_string()))?;

        entry.client.close().await;
        tracing::info!(handle = %handle, "Connection closed");
        Ok(())
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Closes every client; used on shutdown.
    pub async fn close_all(&self) {
        let entries: Vec<ConnectionEntry> =
            self.entries.write().await.drain().map(|(_, e)| e).collect();
        for entry in &entries {
            entry.client.close().await;
        }
        tracing::info!(count = entries.len(), "All connections closed");
    }
}
