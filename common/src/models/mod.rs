//! Shared data models.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{
    CloseConnectionResponse, ConnectResponse, ConnectionItem, ConnectionListResponse,
    ConnectionParams, DbType,
};
pub use query::{ColumnInfo, QueryMetadata, QueryRequest, QueryResult, Record};
