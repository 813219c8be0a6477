//! 查询执行服务模块

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::errors::{AppError, AppResult};
use common::models::query::{QueryMetadata, QueryRequest, QueryResult};
use common::utils::SqlValidator;

use crate::pool::{DatabaseClient, FetchedRows};
use crate::registry::ConnectionRegistry;

/// 只读 SQL 查询执行服务
pub struct QueryService {
    registry: Arc<ConnectionRegistry>,
    query_timeout: Option<Duration>,
}

impl QueryService {
    /// 创建新的查询服务实例
    pub fn new(registry: Arc<ConnectionRegistry>, query_timeout: Option<Duration>) -> Self {
        Self {
            registry,
            query_timeout,
        }
    }

    /// 执行只读查询
    ///
    /// 依次完成：解析连接句柄、只读校验、按需追加 LIMIT、执行并整理结果。
    /// 任何一步失败都不会返回部分结果。
    pub async fn execute(&self, req: QueryRequest) -> AppResult<QueryResult> {
        let entry = self.registry.lookup(&req.connection_id).await?;

        SqlValidator::ensure_read_only(&req.query)?;
        let limited = SqlValidator::apply_row_limit(&req.query, req.limit);

        tracing::debug!(
            handle = %entry.handle,
            db_type = %entry.client.db_type(),
            sql = %limited.sql,
            "执行查询"
        );
        let start = Instant::now();
        let fetched = self.run(entry.client.as_ref(), &limited.sql).await?;
        let execution_time_ms = elapsed_ms(start.elapsed());

        tracing::info!(
            handle = %entry.handle,
            rows = fetched.records.len(),
            elapsed_ms = execution_time_ms,
            "查询完成"
        );

        let metadata = QueryMetadata {
            columns: fetched.columns,
            executed_query: limited.sql,
            limit_applied: limited.limit_applied,
            execution_time_ms,
        };
        Ok(QueryResult::new(
            entry.handle,
            entry.params.database.clone(),
            req.query,
            fetched.records,
            metadata,
        ))
    }

    async fn run(&self, client: &dyn DatabaseClient, sql: &str) -> AppResult<FetchedRows> {
        match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, client.fetch_all(sql))
                .await
                .map_err(|_| {
                    AppError::DatabaseQuery(format!(
                        "query timed out after {} ms",
                        limit.as_millis()
                    ))
                })?,
            None => client.fetch_all(sql).await,
        }
    }
}

/// Milliseconds, saturating at `u64::MAX`.
fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{ConnectionParams, DbType};

    use crate::pool::testing::StaticClient;
    use crate::pool::PoolSettings;

    fn params() -> ConnectionParams {
        ConnectionParams {
            db_type: "postgres".into(),
            host: "db.local".into(),
            port: 5432,
            database: "sales".into(),
            username: "reader".into(),
            password: "secret".into(),
        }
    }

    fn request(handle: &str, query: &str, limit: Option<u32>) -> QueryRequest {
        QueryRequest {
            connection_id: handle.to_string(),
            query: query.to_string(),
            limit,
        }
    }

    async fn setup(client: Arc<StaticClient>) -> (QueryService, String) {
        let registry = Arc::new(ConnectionRegistry::new(PoolSettings {
            max_connections: 1,
            connect_timeout: Duration::from_secs(1),
        }));
        let handle = registry.insert(DbType::Postgres, params(), client).await;
        (QueryService::new(registry, None), handle)
    }

    #[tokio::test]
    async fn test_unknown_handle_fails_for_any_text() {
        let (service, _) = setup(Arc::new(StaticClient::with_rows(DbType::Postgres, 3))).await;
        for text in ["select 1", "DELETE FROM t", ""] {
            let err = service
                .execute(request("mysql_nowhere_1_x", text, None))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::ConnectionNotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_write_query_rejected_before_execution() {
        let client = Arc::new(StaticClient::with_rows(DbType::Postgres, 3));
        let (service, handle) = setup(client.clone()).await;

        let err = service
            .execute(request(&handle, "DELETE FROM t", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::WriteQueryRejected(_)));
        assert!(client.executed().is_empty());
    }

    #[tokio::test]
    async fn test_mixed_case_select_with_whitespace() {
        let client = Arc::new(StaticClient::with_rows(DbType::Postgres, 2));
        let (service, handle) = setup(client.clone()).await;

        let result = service
            .execute(request(&handle, "   SeLeCt * from t", None))
            .await
            .unwrap();
        assert_eq!(result.row_count, 2);
        assert_eq!(result.database, "sales");
        assert_eq!(result.query, "   SeLeCt * from t");
        assert_eq!(client.executed(), vec!["   SeLeCt * from t".to_string()]);
    }

    #[tokio::test]
    async fn test_row_limit_applied() {
        let client = Arc::new(StaticClient::with_rows(DbType::Postgres, 10));
        let (service, handle) = setup(client.clone()).await;

        let result = service
            .execute(request(&handle, "select * from t", Some(5)))
            .await
            .unwrap();
        assert!(result.row_count <= 5);
        assert_eq!(result.row_count, result.data.len());
        assert!(result.metadata.limit_applied);
        assert_eq!(result.metadata.executed_query, "select * from t LIMIT 5");
        // The submitted text is echoed back unchanged.
        assert_eq!(result.query, "select * from t");
    }

    #[tokio::test]
    async fn test_existing_limit_kept() {
        let client = Arc::new(StaticClient::with_rows(DbType::Postgres, 10));
        let (service, handle) = setup(client.clone()).await;

        let result = service
            .execute(request(&handle, "select * from t limit 3", Some(5)))
            .await
            .unwrap();
        assert_eq!(result.row_count, 3);
        assert!(!result.metadata.limit_applied);
        assert_eq!(client.executed(), vec!["select * from t limit 3".to_string()]);
    }

    #[tokio::test]
    async fn test_rows_keep_column_order_and_metadata() {
        let (service, handle) = setup(Arc::new(StaticClient::with_rows(DbType::Postgres, 1))).await;

        let result = service
            .execute(request(&handle, "select id, name from t", None))
            .await
            .unwrap();
        let keys: Vec<_> = result.data[0].keys().cloned().collect();
        assert_eq!(keys, ["id", "name"]);
        assert_eq!(result.metadata.columns.len(), 2);
        assert_eq!(result.metadata.columns[1].name, "name");
    }

    #[tokio::test]
    async fn test_driver_failure_is_query_error() {
        let client = Arc::new(StaticClient::failing(DbType::Postgres, "relation \"t\" does not exist"));
        let (service, handle) = setup(client).await;

        let err = service
            .execute(request(&handle, "select * from t", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseQuery(ref m) if m.contains("does not exist")));
    }

    #[tokio::test]
    async fn test_closed_handle_is_not_found() {
        let registry = Arc::new(ConnectionRegistry::new(PoolSettings {
            max_connections: 1,
            connect_timeout: Duration::from_secs(1),
        }));
        let handle = registry
            .insert(
                DbType::Postgres,
                params(),
                Arc::new(StaticClient::with_rows(DbType::Postgres, 1)),
            )
            .await;
        let service = QueryService::new(registry.clone(), None);

        registry.close(&handle).await.unwrap();
        let err = service
            .execute(request(&handle, "select 1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConnectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_query_timeout() {
        let registry = Arc::new(ConnectionRegistry::new(PoolSettings {
            max_connections: 1,
            connect_timeout: Duration::from_secs(1),
        }));
        let handle = registry
            .insert(
                DbType::Postgres,
                params(),
                Arc::new(StaticClient::slow(DbType::Postgres, Duration::from_secs(5))),
            )
            .await;
        let service = QueryService::new(registry, Some(Duration::from_millis(50)));

        let err = service
            .execute(request(&handle, "select 1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DatabaseQuery(ref m) if m.contains("timed out")));
    }

    #[test]
    fn test_elapsed_ms_saturates() {
        assert_eq!(elapsed_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(elapsed_ms(Duration::MAX), u64::MAX);
    }
}
