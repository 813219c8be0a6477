//! 数据库服务路由模块

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// 创建数据库连接与查询路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/database/connection", post(handlers::create_connection))
        .route(
            "/database/connection/{connection_id}",
            delete(handlers::close_connection),
        )
        .route("/database/connections", get(handlers::list_connections))
        .route("/database/query", post(handlers::execute_query))
        .route("/health", get(handlers::health_check))
}
