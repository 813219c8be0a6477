//! SQL query models.
//!
//! Contains models for read-only query execution.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One result row: column name → value, in driver column order.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Request body for executing a SQL query.
///
/// Not validated up front: the handle is resolved first, and empty text is
/// rejected by the read-only check.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryRequest {
    /// Handle returned when the connection was registered.
    pub connection_id: String,

    /// SQL statement to execute.
    pub query: String,

    /// Maximum number of rows to return; appended as a LIMIT clause when absent from the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Result of a SQL query execution.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    pub status: String,

    /// Connection handle the query ran on.
    pub connection_id: String,

    /// Target database name.
    pub database: String,

    /// Query text as submitted.
    pub query: String,

    /// Number of rows in `data`.
    pub row_count: usize,

    /// Result rows.
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<Record>,

    pub metadata: QueryMetadata,
}

impl QueryResult {
    /// Creates a successful result; `row_count` is derived from `data`.
    pub fn new(
        connection_id: impl Into<String>,
        database: impl Into<String>,
        query: impl Into<String>,
        data: Vec<Record>,
        metadata: QueryMetadata,
    ) -> Self {
        Self {
            status: "success".to_string(),
            connection_id: connection_id.into(),
            database: database.into(),
            query: query.into(),
            row_count: data.len(),
            data,
            metadata,
        }
    }
}

/// Execution details attached to a query result.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QueryMetadata {
    /// Columns in result order.
    pub columns: Vec<ColumnInfo>,

    /// Statement actually sent to the database.
    pub executed_query: String,

    /// Whether a LIMIT clause was appended.
    pub limit_applied: bool,

    /// Round trip time in milliseconds.
    pub execution_time_ms: u64,
}

/// Column information in query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Driver type name (e.g. "INT4", "VARCHAR").
    pub data_type: String,

    /// Zero-based position in the result.
    pub ordinal: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_limit_is_optional() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"connection_id":"pg","query":"select 1"}"#).unwrap();
        assert_eq!(req.limit, None);
    }

    #[test]
    fn test_row_count_matches_data() {
        let mut row = Record::new();
        row.insert("id".into(), json!(1));
        let result = QueryResult::new(
            "pg",
            "sales",
            "select id from t",
            vec![row.clone(), row],
            QueryMetadata {
                columns: vec![],
                executed_query: "select id from t".into(),
                limit_applied: false,
                execution_time_ms: 0,
            },
        );
        assert_eq!(result.row_count, 2);
        assert_eq!(result.status, "success");
    }

    #[test]
    fn test_record_preserves_column_order() {
        let mut row = Record::new();
        row.insert("zeta".into(), json!(1));
        row.insert("alpha".into(), json!(2));
        let text = serde_json::to_string(&row).unwrap();
        assert_eq!(text, r#"{"zeta":1,"alpha":2}"#);
    }
}
