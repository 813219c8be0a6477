//! Identifier generation.
//!
//! Connection handles are deterministic; request IDs are random.

use uuid::Uuid;

use crate::models::DbType;

/// Generates identifiers for various entities.
pub struct IdGenerator;

impl IdGenerator {
    /// Derives the handle for a connection endpoint.
    ///
    /// The same `(db_type, host, port, database)` always yields the same
    /// handle, regardless of credentials.
    pub fn connection_handle(db_type: DbType, host: &str, port: u16, database: &str) -> String {
        format!("{}_{}_{}_{}", db_type, host, port, database)
    }

    /// Generates a unique request ID.
    pub fn request_id() -> String {
        Uuid::new_v4().to_string()
    }
}
