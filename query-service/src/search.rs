//! Keyword and faculty search.
//!
//! Filters run in the relational backend at query time; the matches are then
//! sampled for display.

use std::sync::Arc;

use common::models::{
    BackendKind, QueryParams, QuerySpec, SampleSize, SearchKind, SearchRequest, Statement,
    WidgetResult, YearRange,
};

use crate::dispatcher::QueryExecutor;
use crate::sampling;

#[derive(Clone)]
pub struct SearchEngine {
    executor: Arc<dyn QueryExecutor>,
}

impl SearchEngine {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        Self { executor }
    }

    async fn sampled(&self, spec: QuerySpec, sample: SampleSize, subject: &str) -> WidgetResult {
        let rows = match self.executor.execute(&spec).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(statement = %spec.statement(), error = %err, "search failed");
                return WidgetResult::from_query_error(&err);
            }
        };

        let sources = vec![spec.kind()];
        let years = spec.years().describe();
        if rows.is_empty() {
            return WidgetResult::empty(format!("No publications found {}{}", subject, years), sources);
        }

        let total = rows.len();
        let rows = sampling::sample(rows, sample);
        let status = format!(
            "Showing {} of {} publications {}{}",
            rows.len(),
            total,
            subject,
            years
        );
        WidgetResult::ok(rows, status, sources)
    }

    /// Keyword matches title, abstract, keywords or venue; faculty matches
    /// the author name by its parts, in order.
    pub async fn search(&self, request: &SearchRequest) -> WidgetResult {
        let query = request.query.trim();
        let (statement, params, subject) = match request.kind {
            SearchKind::Keyword => (
                Statement::PublicationsByKeyword,
                QueryParams::default().with_keyword(query),
                format!("matching '{}'", query),
            ),
            SearchKind::Faculty => (
                Statement::FacultyPublications,
                QueryParams::default().with_name(query),
                format!("by faculty matching '{}'", query),
            ),
        };

        match QuerySpec::new(
            BackendKind::Relational,
            statement,
            params.with_years(request.years),
        ) {
            Ok(spec) => self.sampled(spec, request.sample, &subject).await,
            Err(err) => WidgetResult::from_query_error(&err),
        }
    }

    /// The whole publication table, sampled.
    pub async fn all_publications(&self, years: YearRange, sample: SampleSize) -> WidgetResult {
        match QuerySpec::new(
            BackendKind::Relational,
            Statement::AllPublications,
            QueryParams::default().with_years(years),
        ) {
            Ok(spec) => self.sampled(spec, sample, "in the database").await,
            Err(err) => WidgetResult::from_query_error(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{publication, MemoryExecutor};
    use common::models::{Row, WidgetOutcome};

    fn corpus() -> Vec<Row> {
        vec![
            publication("Machine Learning for Databases", 2018, "VLDB", 40, "Ann Lee"),
            publication("Scalable machine learning", 2019, "KDD", 12, "Bo Chen"),
            publication("Machine learning in the cloud", 2020, "SoCC", 7, "Ann Lee"),
            publication("Fair machine learning", 2021, "FAccT", 30, "Cy Dorn"),
            publication("Machine Learning Systems", 2022, "MLSys", 3, "Bo Chen"),
            publication("Early machine learning", 2012, "ICML", 90, "Old Timer"),
            publication("Graph Databases", 2020, "SIGMOD", 15, "Ann Lee"),
        ]
    }

    fn engine(executor: MemoryExecutor) -> SearchEngine {
        SearchEngine::new(Arc::new(executor))
    }

    #[tokio::test]
    async fn test_machine_learning_in_range_returns_all_matches() {
        let engine = engine(MemoryExecutor::new().with_rows(
            BackendKind::Relational,
            Statement::PublicationsByKeyword,
            corpus(),
        ));
        let request = SearchRequest::keyword("machine learning")
            .with_years(YearRange::between(2018, 2022))
            .with_sample(SampleSize::Twenty);

        let result = engine.search(&request).await;
        assert_eq!(result.outcome, WidgetOutcome::Ok);
        assert_eq!(result.rows.len(), 5);
        for row in &result.rows {
            let year = row.get("year").and_then(|v| v.as_i64()).unwrap();
            assert!((2018..=2022).contains(&year));
        }
        assert!(result.status.starts_with("Showing 5 of 5"));
    }

    #[tokio::test]
    async fn test_sample_caps_displayed_rows() {
        let many: Vec<Row> = (0..30)
            .map(|i| publication(&format!("Paper {}", i), 2020, "VLDB", i, "Ann Lee"))
            .collect();
        let engine = engine(MemoryExecutor::new().with_rows(
            BackendKind::Relational,
            Statement::AllPublications,
            many,
        ));

        let result = engine
            .all_publications(YearRange::default(), SampleSize::Ten)
            .await;
        assert_eq!(result.rows.len(), 10);
        assert!(result.status.starts_with("Showing 10 of 30"));
    }

    #[tokio::test]
    async fn test_no_matches_is_empty_not_error() {
        let engine = engine(MemoryExecutor::new().with_rows(
            BackendKind::Relational,
            Statement::PublicationsByKeyword,
            corpus(),
        ));
        let result = engine.search(&SearchRequest::keyword("quantum")).await;
        assert_eq!(result.outcome, WidgetOutcome::Empty);
        assert!(result.rows.is_empty());
        assert!(result.status.contains("No publications found matching 'quantum'"));
    }

    #[tokio::test]
    async fn test_partial_faculty_name() {
        let rows = vec![
            Row::new()
                .with("title", "Joins")
                .with("year", 2020i64)
                .with("venue", "VLDB")
                .with("citations", 4i64)
                .with("faculty_name", "Jonathan A. Smith")
                .with("university", "State University")
                .with("department", "CS"),
            Row::new()
                .with("title", "Indexes")
                .with("year", 2021i64)
                .with("venue", "SIGMOD")
                .with("citations", 2i64)
                .with("faculty_name", "Smith Jones")
                .with("university", "State University")
                .with("department", "CS"),
        ];
        let engine = engine(MemoryExecutor::new().with_rows(
            BackendKind::Relational,
            Statement::FacultyPublications,
            rows,
        ));

        let result = engine.search(&SearchRequest::faculty("jon smith")).await;
        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.rows[0].get("faculty_name").and_then(|v| v.as_str()),
            Some("Jonathan A. Smith")
        );
    }

    #[tokio::test]
    async fn test_backend_outage_becomes_failed_result() {
        let engine = engine(MemoryExecutor::new().with_down(BackendKind::Relational));
        let result = engine.search(&SearchRequest::keyword("graphs")).await;
        assert_eq!(result.outcome, WidgetOutcome::Failed);
        assert!(result.status.contains("MySQL unavailable"));
    }
}
