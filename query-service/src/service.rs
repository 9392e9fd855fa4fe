//! 查询协调服务模块
//!
//! 组合检索、小部件与检索结果保存，并为每次小部件刷新发放票据
//! （最后一次请求生效）。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use common::errors::{AppError, AppResult};
use common::models::{
    KeywordComparisonRequest, SampleSize, SaveSearchRequest, SavedSearchDocument,
    SavedSearchSummary, SearchRequest, WidgetResult, YearRange,
};

use crate::persistence::PersistenceWorkflow;
use crate::refresh::RefreshTracker;
use crate::search::SearchEngine;
use crate::state::AppState;
use crate::widgets::Widgets;

/// 小部件通用查询参数
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WidgetQuery {
    /// 起始年份（含）
    pub from: Option<i32>,
    /// 结束年份（含）
    pub to: Option<i32>,
    /// 展示样本量：10 / 20 / 50 / 100 / all
    #[param(value_type = Option<String>)]
    pub sample: Option<SampleSize>,
}

impl WidgetQuery {
    pub fn years(&self) -> AppResult<YearRange> {
        let years = YearRange::new(self.from, self.to);
        if let (Some(from), Some(to)) = (years.from, years.to) {
            if from > to {
                return Err(AppError::Validation(format!(
                    "year range is inverted: {} > {}",
                    from, to
                )));
            }
        }
        Ok(years)
    }

    pub fn sample(&self) -> SampleSize {
        self.sample.unwrap_or_default()
    }
}

/// 路径中的教师姓名或大学名称
fn subject(value: &str, what: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() || value.chars().count() > 200 {
        return Err(AppError::Validation(format!(
            "{} must be 1-200 characters",
            what
        )));
    }
    Ok(value.to_string())
}

/// 查询服务 Trait
#[async_trait]
pub trait QueryServiceTrait: Send + Sync {
    /// 关键词或教师检索
    async fn search(&self, widget: &str, req: SearchRequest) -> AppResult<WidgetResult>;

    /// 全部论文（采样）
    async fn publications(&self, widget: &str, query: WidgetQuery) -> AppResult<WidgetResult>;

    /// 关键词对比
    async fn compare_keywords(
        &self,
        widget: &str,
        req: KeywordComparisonRequest,
    ) -> AppResult<WidgetResult>;

    /// 大学列表
    async fn universities(&self, widget: &str) -> AppResult<WidgetResult>;

    /// 大学热门关键词
    async fn university_keywords(
        &self,
        widget: &str,
        university: &str,
        query: WidgetQuery,
    ) -> AppResult<WidgetResult>;

    /// 教师论文列表及统计
    async fn faculty_publications(
        &self,
        widget: &str,
        name: &str,
        query: WidgetQuery,
    ) -> AppResult<WidgetResult>;

    /// 跨库引用汇总
    async fn faculty_overview(&self, widget: &str, name: &str) -> AppResult<WidgetResult>;

    /// 跨库人员信息
    async fn faculty_profile(&self, widget: &str, name: &str) -> AppResult<WidgetResult>;

    /// 合作者
    async fn collaborators(&self, widget: &str, name: &str) -> AppResult<WidgetResult>;

    /// 年度发表趋势
    async fn trend(&self, widget: &str, query: WidgetQuery) -> AppResult<WidgetResult>;

    /// 保存检索结果
    async fn save_search(&self, req: SaveSearchRequest) -> AppResult<SavedSearchDocument>;

    /// 已保存检索列表（新的在前）
    async fn list_saved(&self) -> AppResult<Vec<SavedSearchSummary>>;

    /// 查看已保存检索
    async fn view_saved(&self, id: &str) -> AppResult<SavedSearchDocument>;

    /// 删除已保存检索
    async fn delete_saved(&self, id: &str) -> AppResult<()>;
}

/// 查询协调服务
pub struct QueryService {
    search: SearchEngine,
    widgets: Widgets,
    saved: PersistenceWorkflow,
    refresh: Arc<RefreshTracker>,
}

impl QueryService {
    pub fn new(state: &AppState) -> Self {
        Self {
            search: SearchEngine::new(state.executor.clone()),
            widgets: Widgets::new(state.executor.clone(), state.config.conflict_policy),
            saved: PersistenceWorkflow::new(state.saved_searches.clone()),
            refresh: state.refresh.clone(),
        }
    }

    /// 在票据内执行刷新，结束时若已被更新的请求取代则标记为过期
    async fn tracked<F>(&self, widget: &str, refresh: F) -> WidgetResult
    where
        F: std::future::Future<Output = WidgetResult> + Send,
    {
        let ticket = self.refresh.begin(widget);
        let result = refresh.await;
        let stale = self.refresh.finish(&ticket);
        tracing::info!(
            widget = %widget,
            outcome = ?result.outcome,
            rows = result.rows.len(),
            stale,
            "小部件刷新完成"
        );
        result.with_stale(stale)
    }
}

#[async_trait]
impl QueryServiceTrait for QueryService {
    async fn search(&self, widget: &str, req: SearchRequest) -> AppResult<WidgetResult> {
        req.validate()?;
        if req.query.trim().is_empty() {
            return Err(AppError::Validation("query must not be blank".into()));
        }
        Ok(self.tracked(widget, self.search.search(&req)).await)
    }

    async fn publications(&self, widget: &str, query: WidgetQuery) -> AppResult<WidgetResult> {
        let years = query.years()?;
        Ok(self
            .tracked(widget, self.search.all_publications(years, query.sample()))
            .await)
    }

    async fn compare_keywords(
        &self,
        widget: &str,
        req: KeywordComparisonRequest,
    ) -> AppResult<WidgetResult> {
        req.validate()?;
        if req.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(AppError::Validation("keywords must not be blank".into()));
        }
        Ok(self
            .tracked(widget, self.widgets.keyword_comparison(&req.keywords, req.years))
            .await)
    }

    async fn universities(&self, widget: &str) -> AppResult<WidgetResult> {
        Ok(self.tracked(widget, self.widgets.universities()).await)
    }

    async fn university_keywords(
        &self,
        widget: &str,
        university: &str,
        query: WidgetQuery,
    ) -> AppResult<WidgetResult> {
        let university = subject(university, "university")?;
        let years = query.years()?;
        Ok(self
            .tracked(widget, self.widgets.university_keywords(&university, years))
            .await)
    }

    async fn faculty_publications(
        &self,
        widget: &str,
        name: &str,
        query: WidgetQuery,
    ) -> AppResult<WidgetResult> {
        let name = subject(name, "name")?;
        let years = query.years()?;
        Ok(self
            .tracked(widget, self.widgets.faculty_publications(&name, years))
            .await)
    }

    async fn faculty_overview(&self, widget: &str, name: &str) -> AppResult<WidgetResult> {
        let name = subject(name, "name")?;
        Ok(self.tracked(widget, self.widgets.faculty_overview(&name)).await)
    }

    async fn faculty_profile(&self, widget: &str, name: &str) -> AppResult<WidgetResult> {
        let name = subject(name, "name")?;
        Ok(self.tracked(widget, self.widgets.faculty_profile(&name)).await)
    }

    async fn collaborators(&self, widget: &str, name: &str) -> AppResult<WidgetResult> {
        let name = subject(name, "name")?;
        Ok(self.tracked(widget, self.widgets.collaborators(&name)).await)
    }

    async fn trend(&self, widget: &str, query: WidgetQuery) -> AppResult<WidgetResult> {
        let years = query.years()?;
        Ok(self.tracked(widget, self.widgets.publication_trend(years)).await)
    }

    async fn save_search(&self, req: SaveSearchRequest) -> AppResult<SavedSearchDocument> {
        req.validate()?;
        Ok(self.saved.save(req).await?)
    }

    async fn list_saved(&self) -> AppResult<Vec<SavedSearchSummary>> {
        Ok(self.saved.list().await?)
    }

    async fn view_saved(&self, id: &str) -> AppResult<SavedSearchDocument> {
        Ok(self.saved.view(id.trim()).await?)
    }

    async fn delete_saved(&self, id: &str) -> AppResult<()> {
        Ok(self.saved.delete(id.trim()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::oneshot;

    use common::models::{BackendKind, Statement, WidgetOutcome};

    use crate::testing::{publication, MemoryExecutor, MemoryStore};

    fn service(executor: MemoryExecutor) -> QueryService {
        let executor = Arc::new(executor);
        QueryService {
            search: SearchEngine::new(executor.clone()),
            widgets: Widgets::new(executor, Default::default()),
            saved: PersistenceWorkflow::new(Arc::new(MemoryStore::default())),
            refresh: Arc::new(RefreshTracker::new()),
        }
    }

    #[test]
    fn test_inverted_query_years_are_rejected() {
        let query = WidgetQuery {
            from: Some(2022),
            to: Some(2018),
            sample: None,
        };
        assert!(matches!(query.years(), Err(AppError::Validation(_))));
        assert_eq!(query.sample(), SampleSize::Twenty);
    }

    #[tokio::test]
    async fn test_superseded_refresh_is_stale() {
        let service = service(MemoryExecutor::new());
        let (release, wait) = oneshot::channel::<()>();

        let slow = service.tracked("trend", async {
            let _ = wait.await;
            WidgetResult::empty("slow", vec![])
        });
        let fast = async {
            // Let the slow refresh take its ticket first.
            tokio::time::sleep(Duration::from_millis(10)).await;
            let result = service
                .tracked("trend", async { WidgetResult::empty("fast", vec![]) })
                .await;
            let _ = release.send(());
            result
        };

        let (slow, fast) = tokio::join!(slow, fast);
        assert!(slow.stale);
        assert!(!fast.stale);
    }

    #[tokio::test]
    async fn test_search_validates_request() {
        let service = service(MemoryExecutor::new());
        let err = service
            .search("search", SearchRequest::keyword("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_blank_path_name_is_rejected() {
        let service = service(MemoryExecutor::new());
        assert!(matches!(
            service.collaborators("profile", "   ").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_search_result_is_fresh() {
        let service = service(MemoryExecutor::new().with_rows(
            BackendKind::Relational,
            Statement::PublicationsByKeyword,
            vec![publication("Graph Mining", 2020, "KDD", 5, "Ann Lee")],
        ));
        let result = service
            .search("search", SearchRequest::keyword("graph"))
            .await
            .unwrap();
        assert_eq!(result.outcome, WidgetOutcome::Ok);
        assert!(!result.stale);
    }
}
