//! Handler模块

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::middleware::RequestContext;
use common::models::ConnectionReport;
use common::response::ApiResponse;
use crate::service::{ConnectionService, ConnectionServiceTrait};
use crate::state::AppState;

const SERVICE_NAME: &str = "connection-service";

/// 列出三个后端的连接状态
#[utoipa::path(
    get,
    path = "/api/connections",
    tag = "connections",
    responses(
        (status = 200, description = "后端状态列表", body = ApiResponse<Vec<ConnectionReport>>)
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Json<ApiResponse<Vec<ConnectionReport>>> {
    let service = ConnectionService::new(state.manager);
    let data = service.list().await;
    Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_context(&ctx))
}

/// 查询单个后端状态
#[utoipa::path(
    get,
    path = "/api/connections/{kind}",
    tag = "connections",
    params(
        ("kind" = String, Path, description = "后端类型：relational / graph / document")
    ),
    responses(
        (status = 200, description = "后端状态", body = ApiResponse<ConnectionReport>),
        (status = 400, description = "未知后端类型")
    )
)]
pub async fn get_connection(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(kind): Path<String>,
) -> Result<Json<ApiResponse<ConnectionReport>>, AppError> {
    let service = ConnectionService::new(state.manager);
    let data = service.get(&kind).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_context(&ctx)))
}

/// 获取连接（惰性连接，失败时重连一次）
#[utoipa::path(
    post,
    path = "/api/connections/{kind}/acquire",
    tag = "connections",
    params(
        ("kind" = String, Path, description = "后端类型")
    ),
    responses(
        (status = 200, description = "获取结果，连接失败体现在状态中", body = ApiResponse<ConnectionReport>),
        (status = 400, description = "未知后端类型")
    )
)]
pub async fn acquire_connection(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(kind): Path<String>,
) -> Result<Json<ApiResponse<ConnectionReport>>, AppError> {
    let service = ConnectionService::new(state.manager);
    let data = service.acquire(&kind).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME).with_context(&ctx)))
}

/// 断开并销毁连接句柄
#[utoipa::path(
    delete,
    path = "/api/connections/{kind}",
    tag = "connections",
    params(
        ("kind" = String, Path, description = "后端类型")
    ),
    responses(
        (status = 200, description = "是否存在被销毁的句柄", body = ApiResponse<bool>),
        (status = 400, description = "未知后端类型")
    )
)]
pub async fn reset_connection(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(kind): Path<String>,
) -> Result<Json<ApiResponse<bool>>, AppError> {
    let service = ConnectionService::new(state.manager);
    let removed = service.reset(&kind).await?;
    Ok(Json(ApiResponse::ok_with_service(removed, SERVICE_NAME).with_context(&ctx)))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行状态", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backends = state.manager.status_all().await;
    let connected = backends.iter().filter(|r| r.status.is_connected()).count();
    Json(HealthResponse {
        status: if connected == backends.len() { "healthy" } else { "degraded" }.to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        connected,
        backends,
    })
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// 已连接的后端数量
    pub connected: usize,
    pub backends: Vec<ConnectionReport>,
}
