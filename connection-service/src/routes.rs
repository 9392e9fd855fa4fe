//! 连接服务路由模块

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    acquire_connection, get_connection, health_check, list_connections, reset_connection,
};
use crate::state::AppState;

/// 创建连接管理路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/connections", get(list_connections))
        .route(
            "/api/connections/{kind}",
            get(get_connection).delete(reset_connection),
        )
        .route("/api/connections/{kind}/acquire", post(acquire_connection))
        .route("/api/health", get(health_check))
}
