//! SQL statement validator.
//!
//! Best-effort guard for the query endpoint: a prefix check, not a parser.
//! It does not see statements chained after a semicolon or DDL nested in a
//! CTE.

use crate::errors::AppError;

/// Validates SQL statements and prepares them for execution.
pub struct SqlValidator;

/// Statement text to send, after row limiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitedQuery {
    /// Text sent to the database.
    pub sql: String,
    /// Whether a LIMIT clause was appended.
    pub limit_applied: bool,
}

impl SqlValidator {
    /// Trimmed, lower-cased copy used for inspection only.
    pub fn normalize(sql: &str) -> String {
        sql.trim().to_lowercase()
    }

    /// Checks if the SQL is a SELECT query.
    pub fn is_select(sql: &str) -> bool {
        Self::normalize(sql).starts_with("select")
    }

    /// Rejects anything that does not start with an allowed read-only keyword.
    ///
    /// # Errors
    /// Returns `AppError::WriteQueryRejected` naming the leading keyword.
    pub fn ensure_read_only(sql: &str) -> Result<(), AppError> {
        if Self::is_select(sql) {
            return Ok(());
        }

        let keyword = Self::normalize(sql)
            .split_whitespace()
            .next()
            .unwrap_or("<empty>")
            .to_string();
        Err(AppError::WriteQueryRejected(keyword))
    }

    /// Appends `LIMIT n` to a SELECT that does not mention `limit` yet.
    ///
    /// A missing or zero limit leaves the statement untouched. Trailing
    /// semicolons are dropped before the clause is appended.
    pub fn apply_row_limit(sql: &str, limit: Option<u32>) -> LimitedQuery {
        match limit.filter(|n| *n > 0) {
            Some(n) if Self::is_select(sql) && !Self::normalize(sql).contains("limit") => {
                let base = sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace());
                LimitedQuery {
                    sql: format!("{} LIMIT {}", base, n),
                    limit_applied: true,
                }
            }
            _ => LimitedQuery {
                sql: sql.to_string(),
                limit_applied: false,
            },
        }
    }
}
