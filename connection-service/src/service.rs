//! 连接管理服务模块

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use common::errors::{AppError, AppResult};
use common::models::{BackendKind, ConnectionReport};
use connection_service::ConnectionManager;

/// 连接服务 Trait
#[async_trait]
pub trait ConnectionServiceTrait: Send + Sync {
    /// 列出全部后端状态
    async fn list(&self) -> Vec<ConnectionReport>;

    /// 查询单个后端状态（不触发连接）
    async fn get(&self, kind: &str) -> AppResult<ConnectionReport>;

    /// 获取连接（按需连接或重连）
    async fn acquire(&self, kind: &str) -> AppResult<ConnectionReport>;

    /// 断开并销毁连接句柄
    async fn reset(&self, kind: &str) -> AppResult<bool>;
}

/// 后端连接管理服务
pub struct ConnectionService {
    manager: Arc<ConnectionManager>,
}

impl ConnectionService {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

fn parse_kind(kind: &str) -> AppResult<BackendKind> {
    kind.parse::<BackendKind>().map_err(AppError::Validation)
}

#[async_trait]
impl ConnectionServiceTrait for ConnectionService {
    async fn list(&self) -> Vec<ConnectionReport> {
        self.manager.status_all().await
    }

    async fn get(&self, kind: &str) -> AppResult<ConnectionReport> {
        let kind = parse_kind(kind)?;
        Ok(self.manager.handle(kind).await.report(None))
    }

    async fn acquire(&self, kind: &str) -> AppResult<ConnectionReport> {
        let kind = parse_kind(kind)?;
        let started = Instant::now();
        let handle = self.manager.acquire(kind).await;
        let report = handle.report(Some(started.elapsed().as_millis() as u64));
        tracing::info!(kind = %kind, connected = handle.is_live(), "连接获取完成");
        Ok(report)
    }

    async fn reset(&self, kind: &str) -> AppResult<bool> {
        let kind = parse_kind(kind)?;
        let removed = self.manager.reset(kind).await;
        tracing::info!(kind = %kind, removed, "连接已重置");
        Ok(removed)
    }
}
