//! Live database clients.
//!
//! Each registered connection owns one sqlx pool, used through the
//! [`DatabaseClient`] trait so the registry and the query service do not
//! care which engine sits behind a handle.

use std::time::Duration;

use async_trait::async_trait;
use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{ColumnInfo, ConnectionParams, DbType, Record};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Executor, MySqlPool, PgPool, Row, Statement};

use crate::row_mapper;

/// Rows materialized from a single statement.
#[derive(Debug, Default)]
pub struct FetchedRows {
    pub columns: Vec<ColumnInfo>,
    pub records: Vec<Record>,
}

/// An open, shareable client for one target database.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Engine behind this client.
    fn db_type(&self) -> DbType;

    /// Runs one statement and materializes every row.
    async fn fetch_all(&self, sql: &str) -> AppResult<FetchedRows>;

    /// Releases the underlying connections.
    async fn close(&self);
}

/// Pool options applied to every registered connection.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Connection pool wrapper for supported database types.
#[derive(Clone)]
pub enum DatabasePool {
    /// MySQL connection pool.
    MySQL(MySqlPool),
    /// PostgreSQL connection pool.
    Postgres(PgPool),
}

impl DatabasePool {
    /// Opens a pool and verifies it by acquiring a first connection.
    pub async fn connect(
        db_type: DbType,
        params: &ConnectionParams,
        settings: &PoolSettings,
    ) -> AppResult<Self> {
        match db_type {
            DbType::MySQL => {
                let options = MySqlConnectOptions::new()
                    .host(&params.host)
                    .port(params.port)
                    .username(&params.username)
                    .password(&params.password)
                    .database(&params.database);
                let pool = MySqlPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.connect_timeout)
                    .connect_with(options)
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
                Ok(DatabasePool::MySQL(pool))
            }
            DbType::Postgres => {
                let options = PgConnectOptions::new()
                    .host(&params.host)
                    .port(params.port)
                    .username(&params.username)
                    .password(&params.password)
                    .database(&params.database);
                let pool = PgPoolOptions::new()
                    .max_connections(settings.max_connections)
                    .acquire_timeout(settings.connect_timeout)
                    .connect_with(options)
                    .await
                    .map_err(|e| AppError::DatabaseConnection(e.to_string()))?;
                Ok(DatabasePool::Postgres(pool))
            }
        }
    }
}

fn query_error(e: sqlx::Error) -> AppError {
    AppError::DatabaseQuery(e.to_string())
}

#[async_trait]
impl DatabaseClient for DatabasePool {
    fn db_type(&self) -> DbType {
        match self {
            DatabasePool::MySQL(_) => DbType::MySQL,
            DatabasePool::Postgres(_) => DbType::Postgres,
        }
    }

    // Statements are prepared without caching: ad-hoc text would otherwise
    // pile up in every connection's statement cache.
    async fn fetch_all(&self, sql: &str) -> AppResult<FetchedRows> {
        match self {
            DatabasePool::MySQL(pool) => {
                let rows = sqlx::query(sql)
                    .persistent(false)
                    .fetch_all(pool)
                    .await
                    .map_err(query_error)?;
                let columns = match rows.first() {
                    Some(row) => row_mapper::column_info(row.columns()),
                    None => {
                        let statement = pool.prepare(sql).await.map_err(query_error)?;
                        row_mapper::column_info(statement.columns())
                    }
                };
                let records = rows
                    .iter()
                    .map(row_mapper::mysql_record)
                    .collect::<AppResult<Vec<_>>>()?;
                Ok(FetchedRows { columns, records })
            }
            DatabasePool::Postgres(pool) => {
                let rows = sqlx::query(sql)
                    .persistent(false)
                    .fetch_all(pool)
                    .await
                    .map_err(query_error)?;
                let columns = match rows.first() {
                    Some(row) => row_mapper::column_info(row.columns()),
                    None => {
                        let statement = pool.prepare(sql).await.map_err(query_error)?;
                        row_mapper::column_info(statement.columns())
                    }
                };
                let records = rows
                    .iter()
                    .map(row_mapper::postgres_record)
                    .collect::<AppResult<Vec<_>>>()?;
                Ok(FetchedRows { columns, records })
            }
        }
    }

    async fn close(&self) {
        match self {
            DatabasePool::MySQL(pool) => pool.close().await,
            DatabasePool::Postgres(pool) => pool.close().await,
        }
    }
}
