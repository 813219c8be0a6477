//! Application error types.
//!
//! Every failure a request can hit maps to one [`AppError`] variant, which
//! carries its HTTP status and a stable error code for clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ApiResponse;

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced to API callers.
#[derive(Debug, Error)]
pub enum AppError {
    /// The requested `db_type` is neither postgres nor mysql.
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),

    /// The driver could not open a connection pool.
    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    /// No live connection is registered under the given handle.
    #[error("Connection not found: {0}. Connect to a database first.")]
    ConnectionNotFound(String),

    /// The statement is not a read-only (SELECT) query.
    #[error("Only read-only (SELECT) queries are allowed: {0}")]
    WriteQueryRejected(String),

    /// The driver failed while executing a query or decoding its rows.
    #[error("Query execution error: {0}")]
    DatabaseQuery(String),

    /// The request body failed validation.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// HTTP status returned for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnsupportedDatabaseType(_)
            | AppError::WriteQueryRejected(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseConnection(_) | AppError::DatabaseQuery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::UnsupportedDatabaseType(_) => "UNSUPPORTED_DATABASE_TYPE",
            AppError::DatabaseConnection(_) => "CONNECTION_ERROR",
            AppError::ConnectionNotFound(_) => "CONNECTION_NOT_FOUND",
            AppError::WriteQueryRejected(_) => "WRITE_QUERY_REJECTED",
            AppError::DatabaseQuery(_) => "QUERY_EXECUTION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %message, "请求处理失败");
        } else {
            tracing::warn!(code = self.error_code(), error = %message, "请求被拒绝");
        }

        (status, Json(ApiResponse::err(self.error_code(), message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_follow_error_kind() {
        assert_eq!(
            AppError::UnsupportedDatabaseType("oracle".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::ConnectionNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::WriteQueryRejected("delete".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::DatabaseConnection("refused".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::DatabaseQuery("syntax".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_message_keeps_driver_detail() {
        let err = AppError::DatabaseQuery("relation \"t\" does not exist".into());
        assert!(err.to_string().contains("relation \"t\" does not exist"));
        assert_eq!(err.error_code(), "QUERY_EXECUTION_ERROR");
    }

    #[test]
    fn test_into_response_sets_status() {
        let response = AppError::ConnectionNotFound("pg_x".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
