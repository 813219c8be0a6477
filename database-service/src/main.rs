//! 数据库查询服务
//!
//! 提供以下功能：
//! - 注册 PostgreSQL / MySQL 连接并维护连接池
//! - 在已注册的连接上执行只读 SELECT 查询
//! - 列出与关闭活跃连接

mod handlers;
mod pool;
mod registry;
mod routes;
mod row_mapper;
mod service;
mod state;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_id_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "database-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "数据库查询服务 API",
        version = "0.0.1",
        description = "数据库连接注册与只读查询微服务"
    ),
    paths(
        handlers::create_connection,
        handlers::execute_query,
        handlers::list_connections,
        handlers::close_connection,
        handlers::health_check,
    ),
    components(schemas(
        common::models::ConnectionParams,
        common::models::ConnectResponse,
        common::models::ConnectionListResponse,
        common::models::ConnectionItem,
        common::models::CloseConnectionResponse,
        common::models::QueryRequest,
        common::models::QueryResult,
        common::models::QueryMetadata,
        common::models::ColumnInfo,
        common::models::DbType,
        handlers::HealthResponse,
    )),
    tags(
        (name = "database", description = "连接与查询端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .init();

    let state = AppState::new(config.clone());
    let registry = state.registry.clone();
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_addr();
    info!(
        service = SERVICE_NAME,
        app = %config.app_name,
        version = %config.app_version,
        address = %addr,
        "启动服务"
    );

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务运行失败")?;

    // 关闭所有连接池
    registry.close_all().await;
    info!(service = SERVICE_NAME, "服务已停止");
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "无法监听关闭信号");
        std::future::pending::<()>().await;
    }
    info!("收到关闭信号");
}
