//! 学术数据查询协调服务
//!
//! 在 MySQL、Neo4j、MongoDB 之上提供仪表盘所需的查询能力：
//! - 关键词 / 教师检索与结果采样
//! - 各类小部件查询，跨库合并与单库回退
//! - 检索结果保存、列表、查看与删除

mod combine;
mod dispatcher;
mod handlers;
mod persistence;
mod refresh;
mod routes;
mod sampling;
mod search;
mod service;
mod state;
mod summary;
mod widgets;

#[cfg(test)]
mod testing;

use axum::{middleware, routing::get, Json, Router};
use common::config::{load_dotenv, AppConfig};
use common::middleware::request_context_middleware;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

const SERVICE_NAME: &str = "query-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "查询服务 API",
        version = "0.1.0",
        description = "学术数据多库查询、合并与检索保存微服务"
    ),
    paths(
        handlers::search,
        handlers::list_publications,
        handlers::compare_keywords,
        handlers::list_universities,
        handlers::university_keywords,
        handlers::faculty_publications,
        handlers::faculty_overview,
        handlers::faculty_profile,
        handlers::collaborators,
        handlers::publication_trend,
        handlers::save_search,
        handlers::list_saved_searches,
        handlers::get_saved_search,
        handlers::delete_saved_search,
        handlers::list_connections,
        handlers::health_check,
    ),
    components(schemas(
        common::models::WidgetResult,
        common::models::WidgetOutcome,
        common::models::SearchRequest,
        common::models::SearchKind,
        common::models::SampleSize,
        common::models::YearRange,
        common::models::KeywordComparisonRequest,
        common::models::SaveSearchRequest,
        common::models::SavedSearchDocument,
        common::models::SavedSearchSummary,
        common::models::ConflictPolicy,
        common::models::BackendKind,
        common::models::ConnectionStatus,
        common::models::ConnectionReport,
        handlers::HealthResponse,
    )),
    tags(
        (name = "search", description = "检索端点"),
        (name = "widgets", description = "仪表盘小部件端点"),
        (name = "faculty", description = "教师相关端点"),
        (name = "saved-searches", description = "检索结果保存端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::load_with_service(SERVICE_NAME);
    info!(policy = ?config.conflict_policy, timeout = ?config.query_timeout(), "加载配置");
    let state = AppState::new(config.clone());

    // 后端不可用时服务照常启动，查询结果中会说明
    for report in state.connections.connect_all().await {
        info!(kind = %report.kind, status = ?report.status, "后端初始状态");
    }

    let connections = state.connections.clone();
    let app = create_router(state);

    let addr = config.bind_addr();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    connections.shutdown().await;
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
        .layer(middleware::from_fn(request_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "无法监听退出信号");
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，正在关闭");
}
