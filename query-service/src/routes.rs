//! 查询服务路由模块

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// 创建查询、小部件与检索保存路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/search", post(handlers::search))
        .route("/api/publications", get(handlers::list_publications))
        .route("/api/keywords/compare", post(handlers::compare_keywords))
        .route("/api/universities", get(handlers::list_universities))
        .route(
            "/api/universities/{name}/keywords",
            get(handlers::university_keywords),
        )
        .route(
            "/api/faculty/{name}/publications",
            get(handlers::faculty_publications),
        )
        .route("/api/faculty/{name}/overview", get(handlers::faculty_overview))
        .route("/api/faculty/{name}/profile", get(handlers::faculty_profile))
        .route(
            "/api/faculty/{name}/collaborators",
            get(handlers::collaborators),
        )
        .route("/api/trend", get(handlers::publication_trend))
        .route(
            "/api/saved-searches",
            get(handlers::list_saved_searches).post(handlers::save_search),
        )
        .route(
            "/api/saved-searches/{id}",
            get(handlers::get_saved_search).delete(handlers::delete_saved_search),
        )
        .route("/api/connections", get(handlers::list_connections))
        .route("/api/health", get(handlers::health_check))
}
