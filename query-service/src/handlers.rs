//! Handler模块

use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::middleware::RequestContext;
use common::models::{
    ConnectionReport, KeywordComparisonRequest, SaveSearchRequest, SavedSearchDocument,
    SavedSearchSummary, SearchRequest, WidgetResult,
};
use common::response::ApiResponse;
use crate::service::{QueryService, QueryServiceTrait, WidgetQuery};
use crate::state::AppState;

const SERVICE_NAME: &str = "query-service";

type WidgetResponse = Result<Json<ApiResponse<WidgetResult>>, AppError>;

fn respond<T: Serialize>(data: T, ctx: &RequestContext, started: Instant) -> Json<ApiResponse<T>> {
    Json(
        ApiResponse::ok_with_service(data, SERVICE_NAME)
            .with_context(ctx)
            .with_duration(started.elapsed().as_millis() as u64),
    )
}

/// 关键词 / 教师检索
#[utoipa::path(
    post,
    path = "/api/search",
    tag = "search",
    request_body = SearchRequest,
    params(
        ("X-Widget-Id" = Option<String>, Header, description = "小部件 ID，用于最后请求生效")
    ),
    responses(
        (status = 200, description = "检索结果（后端故障体现在状态中）", body = ApiResponse<WidgetResult>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn search(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<SearchRequest>,
) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service.search(ctx.widget_or("search"), req).await?;
    Ok(respond(result, &ctx, started))
}

/// 全部论文（采样展示）
#[utoipa::path(
    get,
    path = "/api/publications",
    tag = "search",
    params(WidgetQuery),
    responses(
        (status = 200, description = "论文样本", body = ApiResponse<WidgetResult>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn list_publications(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<WidgetQuery>,
) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service.publications(ctx.widget_or("publications"), query).await?;
    Ok(respond(result, &ctx, started))
}

/// 关键词对比（2-5 个）
#[utoipa::path(
    post,
    path = "/api/keywords/compare",
    tag = "widgets",
    request_body = KeywordComparisonRequest,
    responses(
        (status = 200, description = "每个关键词一行统计", body = ApiResponse<WidgetResult>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn compare_keywords(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<KeywordComparisonRequest>,
) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service
        .compare_keywords(ctx.widget_or("keyword-comparison"), req)
        .await?;
    Ok(respond(result, &ctx, started))
}

/// 大学列表
#[utoipa::path(
    get,
    path = "/api/universities",
    tag = "widgets",
    responses(
        (status = 200, description = "大学列表", body = ApiResponse<WidgetResult>)
    )
)]
pub async fn list_universities(State(state): State<AppState>, ctx: RequestContext) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service.universities(ctx.widget_or("universities")).await?;
    Ok(respond(result, &ctx, started))
}

/// 大学热门关键词（前 10）
#[utoipa::path(
    get,
    path = "/api/universities/{name}/keywords",
    tag = "widgets",
    params(
        ("name" = String, Path, description = "大学名称"),
        WidgetQuery
    ),
    responses(
        (status = 200, description = "关键词及提及次数", body = ApiResponse<WidgetResult>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn university_keywords(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(name): Path<String>,
    Query(query): Query<WidgetQuery>,
) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service
        .university_keywords(ctx.widget_or("university-keywords"), &name, query)
        .await?;
    Ok(respond(result, &ctx, started))
}

/// 教师论文列表及统计
#[utoipa::path(
    get,
    path = "/api/faculty/{name}/publications",
    tag = "faculty",
    params(
        ("name" = String, Path, description = "教师姓名，可为部分姓名"),
        WidgetQuery
    ),
    responses(
        (status = 200, description = "论文列表，状态中包含 h 指数等统计", body = ApiResponse<WidgetResult>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn faculty_publications(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(name): Path<String>,
    Query(query): Query<WidgetQuery>,
) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service
        .faculty_publications(ctx.widget_or("faculty-publications"), &name, query)
        .await?;
    Ok(respond(result, &ctx, started))
}

/// 跨库引用汇总
#[utoipa::path(
    get,
    path = "/api/faculty/{name}/overview",
    tag = "faculty",
    params(
        ("name" = String, Path, description = "教师姓名")
    ),
    responses(
        (status = 200, description = "三库合并结果", body = ApiResponse<WidgetResult>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn faculty_overview(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(name): Path<String>,
) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service
        .faculty_overview(ctx.widget_or("faculty-overview"), &name)
        .await?;
    Ok(respond(result, &ctx, started))
}

/// 跨库人员信息
#[utoipa::path(
    get,
    path = "/api/faculty/{name}/profile",
    tag = "faculty",
    params(
        ("name" = String, Path, description = "教师姓名")
    ),
    responses(
        (status = 200, description = "三库合并的人员信息", body = ApiResponse<WidgetResult>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn faculty_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(name): Path<String>,
) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service
        .faculty_profile(ctx.widget_or("faculty-profile"), &name)
        .await?;
    Ok(respond(result, &ctx, started))
}

/// 合作者（图数据库）
#[utoipa::path(
    get,
    path = "/api/faculty/{name}/collaborators",
    tag = "faculty",
    params(
        ("name" = String, Path, description = "教师姓名")
    ),
    responses(
        (status = 200, description = "合作者及合作论文数", body = ApiResponse<WidgetResult>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn collaborators(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(name): Path<String>,
) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service
        .collaborators(ctx.widget_or("collaborators"), &name)
        .await?;
    Ok(respond(result, &ctx, started))
}

/// 年度发表趋势（MySQL → MongoDB → Neo4j 依次回退）
#[utoipa::path(
    get,
    path = "/api/trend",
    tag = "widgets",
    params(WidgetQuery),
    responses(
        (status = 200, description = "每年论文数", body = ApiResponse<WidgetResult>),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn publication_trend(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<WidgetQuery>,
) -> WidgetResponse {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let result = service.trend(ctx.widget_or("trend"), query).await?;
    Ok(respond(result, &ctx, started))
}

/// 保存检索结果
///
/// `rows` 中每个单元格为带类型标记的值，与检索结果的格式一致：
/// `{"type":"int","value":2020}`、`{"type":"text","value":"VLDB"}`、`{"type":"null"}`。
/// 同一行内字段名不可重复，各行字段须一致。
#[utoipa::path(
    post,
    path = "/api/saved-searches",
    tag = "saved-searches",
    request_body = SaveSearchRequest,
    responses(
        (status = 200, description = "保存成功", body = ApiResponse<SavedSearchDocument>),
        (status = 400, description = "参数校验失败"),
        (status = 422, description = "结果行字段不一致"),
        (status = 503, description = "文档库不可用")
    )
)]
pub async fn save_search(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(req): Json<SaveSearchRequest>,
) -> Result<Json<ApiResponse<SavedSearchDocument>>, AppError> {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let saved = service.save_search(req).await?;
    Ok(respond(saved, &ctx, started))
}

/// 已保存检索列表
#[utoipa::path(
    get,
    path = "/api/saved-searches",
    tag = "saved-searches",
    responses(
        (status = 200, description = "摘要列表，新的在前", body = ApiResponse<Vec<SavedSearchSummary>>),
        (status = 503, description = "文档库不可用")
    )
)]
pub async fn list_saved_searches(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<ApiResponse<Vec<SavedSearchSummary>>>, AppError> {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let list = service.list_saved().await?;
    Ok(respond(list, &ctx, started))
}

/// 查看已保存检索
#[utoipa::path(
    get,
    path = "/api/saved-searches/{id}",
    tag = "saved-searches",
    params(
        ("id" = String, Path, description = "保存记录 ID")
    ),
    responses(
        (status = 200, description = "保存的文档", body = ApiResponse<SavedSearchDocument>),
        (status = 404, description = "记录不存在")
    )
)]
pub async fn get_saved_search(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SavedSearchDocument>>, AppError> {
    let started = Instant::now();
    let service = QueryService::new(&state);
    let document = service.view_saved(&id).await?;
    Ok(respond(document, &ctx, started))
}

/// 删除已保存检索（不可恢复）
#[utoipa::path(
    delete,
    path = "/api/saved-searches/{id}",
    tag = "saved-searches",
    params(
        ("id" = String, Path, description = "保存记录 ID")
    ),
    responses(
        (status = 200, description = "删除成功"),
        (status = 404, description = "记录不存在")
    )
)]
pub async fn delete_saved_search(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, AppError> {
    let started = Instant::now();
    let service = QueryService::new(&state);
    service.delete_saved(&id).await?;
    Ok(respond(id, &ctx, started))
}

/// 后端连接状态
#[utoipa::path(
    get,
    path = "/api/connections",
    tag = "health",
    responses(
        (status = 200, description = "后端状态列表", body = ApiResponse<Vec<ConnectionReport>>)
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Json<ApiResponse<Vec<ConnectionReport>>> {
    let started = Instant::now();
    let reports = state.connections.status_all().await;
    respond(reports, &ctx, started)
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
    let backends = state.connections.status_all().await;
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
