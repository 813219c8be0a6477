//! Handler模块

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use common::errors::AppError;
use common::models::connection::{
    CloseConnectionResponse, ConnectResponse, ConnectionListResponse, ConnectionParams,
};
use common::models::query::{QueryRequest, QueryResult};
use common::response::ApiResponse;
use crate::service::QueryService;
use crate::state::AppState;

const STATUS_SUCCESS: &str = "success";

/// 注册数据库连接（支持 PostgreSQL 与 MySQL）
#[utoipa::path(
    post,
    path = "/database/connection",
    tag = "database",
    request_body = ConnectionParams,
    responses(
        (status = 200, description = "连接成功", body = ConnectResponse),
        (status = 400, description = "不支持的数据库类型或参数无效"),
        (status = 500, description = "无法连接到数据库")
    )
)]
pub async fn create_connection(
    State(state): State<AppState>,
    Json(params): Json<ConnectionParams>,
) -> Result<Json<ConnectResponse>, AppError> {
    let db_type = params.parsed_db_type()?;
    params.validate()?;
    let database = params.database.clone();

    let connection_id = state.registry.register(params).await?;

    Ok(Json(ConnectResponse {
        status: STATUS_SUCCESS.to_string(),
        message: format!("Connected to database {} ({})", database, db_type.label()),
        connection_id,
    }))
}

/// 在已注册的连接上执行只读查询（仅允许 SELECT）
#[utoipa::path(
    post,
    path = "/database/query",
    tag = "database",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "查询结果", body = QueryResult),
        (status = 400, description = "非只读查询"),
        (status = 404, description = "连接未找到"),
        (status = 500, description = "查询执行失败")
    )
)]
pub async fn execute_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResult>, AppError> {
    let service = QueryService::new(state.registry, state.config.query_timeout());
    let result = service.execute(req).await?;
    Ok(Json(result))
}

/// 列出所有活跃连接
#[utoipa::path(
    get,
    path = "/database/connections",
    tag = "database",
    responses(
        (status = 200, description = "活跃连接列表", body = ConnectionListResponse)
    )
)]
pub async fn list_connections(State(state): State<AppState>) -> Json<ConnectionListResponse> {
    let connections = state.registry.list().await;
    Json(ConnectionListResponse {
        status: STATUS_SUCCESS.to_string(),
        active_connections: connections.len(),
        connections,
    })
}

/// 关闭一个活跃连接
#[utoipa::path(
    delete,
    path = "/database/connection/{connection_id}",
    tag = "database",
    params(
        ("connection_id" = String, Path, description = "连接 ID")
    ),
    responses(
        (status = 200, description = "连接已关闭", body = CloseConnectionResponse),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn close_connection(
    State(state): State<AppState>,
    Path(connection_id): Path<String>,
) -> Result<Json<CloseConnectionResponse>, AppError> {
    state.registry.close(&connection_id).await?;
    Ok(Json(CloseConnectionResponse {
        status: STATUS_SUCCESS.to_string(),
        message: format!("Connection {} closed", connection_id),
        connection_id,
    }))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = ApiResponse<HealthResponse>)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let health = HealthResponse {
        status: "healthy".to_string(),
        app_name: state.config.app_name.clone(),
        version: state.config.app_version.clone(),
        debug: state.config.debug,
        timestamp: Utc::now(),
        connections: state.registry.connection_count().await,
    };
    Json(ApiResponse::ok_with_service(health, state.config.service_name.clone()))
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 应用名称
    pub app_name: String,
    /// 应用版本
    pub version: String,
    /// 是否开启调试模式
    pub debug: bool,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
    /// 活跃连接数
    pub connections: usize,
}
