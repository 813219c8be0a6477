//! Connection registration models.
//!
//! Contains the request body for registering a database and the payloads
//! returned by the connection endpoints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::AppError;

/// Database type enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// PostgreSQL database.
    Postgres,
    /// MySQL database.
    MySQL,
}

impl DbType {
    /// URI scheme used in connection strings.
    pub fn scheme(&self) -> &'static str {
        match self {
            DbType::Postgres => "postgres",
            DbType::MySQL => "mysql",
        }
    }

    /// Upper-case label used in listings and messages.
    pub fn label(&self) -> &'static str {
        match self {
            DbType::Postgres => "POSTGRES",
            DbType::MySQL => "MYSQL",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for DbType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" => Ok(DbType::Postgres),
            "mysql" => Ok(DbType::MySQL),
            _ => Err(AppError::UnsupportedDatabaseType(s.to_string())),
        }
    }
}

fn default_db_type() -> String {
    DbType::Postgres.to_string()
}

/// Request body for registering a database connection.
///
/// `db_type` stays a plain string so that unknown engines surface as
/// [`AppError::UnsupportedDatabaseType`] instead of a body rejection.
#[derive(Clone, Deserialize, Validate, ToSchema)]
pub struct ConnectionParams {
    /// Database type ("postgres" or "mysql").
    #[serde(default = "default_db_type")]
    pub db_type: String,
    /// Database host.
    #[validate(length(min = 1, message = "Host is required"))]
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    #[validate(length(min = 1, message = "Database name is required"))]
    pub database: String,
    /// Database username.
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    /// Database password.
    pub password: String,
}

impl ConnectionParams {
    /// Parses the requested database type.
    pub fn parsed_db_type(&self) -> Result<DbType, AppError> {
        self.db_type.parse()
    }

    /// Connection URI with the password masked, safe for logs.
    pub fn redacted_url(&self, db_type: DbType) -> String {
        format!(
            "{}://{}:***@{}:{}/{}",
            db_type.scheme(),
            self.username,
            self.host,
            self.port,
            self.database
        )
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Summary of a live connection (excludes credentials).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionItem {
    /// Connection handle.
    pub connection_id: String,
    /// Upper-case database type.
    pub database_type: String,
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    pub database: String,
}

/// Response for a successful registration.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectResponse {
    pub status: String,
    pub message: String,
    pub connection_id: String,
}

/// Response listing live connections.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionListResponse {
    pub status: String,
    /// Number of live connections.
    pub active_connections: usize,
    pub connections: Vec<ConnectionItem>,
}

/// Response for a closed connection.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CloseConnectionResponse {
    pub status: String,
    pub message: String,
    pub connection_id: String,
}
