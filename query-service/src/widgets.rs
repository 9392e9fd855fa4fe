//! Dashboard widgets built on the dispatcher.
//!
//! Every widget turns backend failures into a descriptive [`WidgetResult`]
//! instead of an error.

use std::collections::HashMap;
use std::sync::Arc;

use common::errors::QueryError;
use common::models::{
    BackendKind, ConflictPolicy, QueryParams, QuerySpec, Row, Statement, Value, WidgetResult,
    YearRange,
};

use crate::combine::{BackendRows, Combiner};
use crate::dispatcher::QueryExecutor;
use crate::summary::PublicationSummary;

/// Number of keywords shown for a university.
const TOP_KEYWORDS: usize = 10;

/// Trend sources in fallback order.
const TREND_FALLBACK: [BackendKind; 3] = [
    BackendKind::Relational,
    BackendKind::Document,
    BackendKind::Graph,
];

#[derive(Clone)]
pub struct Widgets {
    executor: Arc<dyn QueryExecutor>,
    policy: ConflictPolicy,
}

impl Widgets {
    pub fn new(executor: Arc<dyn QueryExecutor>, policy: ConflictPolicy) -> Self {
        Self { executor, policy }
    }

    async fn run(
        &self,
        kind: BackendKind,
        statement: Statement,
        params: QueryParams,
    ) -> Result<Vec<Row>, QueryError> {
        let spec = QuerySpec::new(kind, statement, params)?;
        self.executor.execute(&spec).await
    }

    /// Same statement on all three backends, concurrently.
    async fn run_everywhere(&self, statement: Statement, params: QueryParams) -> Vec<BackendRows> {
        let (relational, graph, document) = tokio::join!(
            self.run(BackendKind::Relational, statement, params.clone()),
            self.run(BackendKind::Graph, statement, params.clone()),
            self.run(BackendKind::Document, statement, params),
        );
        vec![
            BackendRows::new(BackendKind::Relational, relational),
            BackendRows::new(BackendKind::Graph, graph),
            BackendRows::new(BackendKind::Document, document),
        ]
    }

    /// KeywordStats per keyword, one row each.
    pub async fn keyword_comparison(&self, keywords: &[String], years: YearRange) -> WidgetResult {
        let keywords: Vec<&str> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        if !(2..=5).contains(&keywords.len()) {
            return WidgetResult::failed("Enter between 2 and 5 keywords to compare");
        }

        let mut rows = Vec::new();
        let mut failures = Vec::new();
        for keyword in &keywords {
            let params = QueryParams::default()
                .with_keyword(*keyword)
                .with_years(years);
            match self.run(BackendKind::Relational, Statement::KeywordStats, params).await {
                Ok(stats) => {
                    let mut row = Row::new().with("keyword", *keyword);
                    let stats = stats.into_iter().next().unwrap_or_default();
                    for column in Statement::KeywordStats.column_names() {
                        row.set(column, stats.get(column).cloned().unwrap_or(Value::Null));
                    }
                    rows.push(row);
                }
                Err(err) => failures.push(format!("'{}': {}", keyword, err.describe())),
            }
        }

        if rows.is_empty() {
            return WidgetResult::failed(failures.join("; "));
        }

        let count = |row: &Row| {
            row.get("publication_count")
                .and_then(Value::as_i64)
                .unwrap_or(0)
        };
        let average = |row: &Row| row.get("avg_citations").and_then(Value::as_f64);
        let keyword_of = |row: &Row| {
            row.get("keyword")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let total: i64 = rows.iter().map(count).sum();
        let averages: Vec<f64> = rows.iter().filter_map(average).collect();
        let mean = if averages.is_empty() {
            0.0
        } else {
            averages.iter().sum::<f64>() / averages.len() as f64
        };
        let popular = rows.iter().max_by_key(|row| count(row)).map(keyword_of);
        let cited = rows
            .iter()
            .filter(|row| average(row).is_some())
            .max_by(|a, b| {
                average(a)
                    .unwrap_or(0.0)
                    .total_cmp(&average(b).unwrap_or(0.0))
            })
            .map(keyword_of);

        let mut status = format!(
            "{} publications across {} keywords{}, mean of average citations {:.1}, most popular '{}', highest cited '{}'",
            total,
            rows.len(),
            years.describe(),
            mean,
            popular.unwrap_or_default(),
            cited.unwrap_or_else(|| "n/a".to_string()),
        );
        let sources = vec![BackendKind::Relational];
        if failures.is_empty() {
            WidgetResult::ok(rows, status, sources)
        } else {
            status.push_str(&format!(". Failed: {}", failures.join("; ")));
            WidgetResult::degraded(rows, status, sources)
        }
    }

    pub async fn universities(&self) -> WidgetResult {
        match self
            .run(BackendKind::Relational, Statement::Universities, QueryParams::default())
            .await
        {
            Ok(rows) if rows.is_empty() => {
                WidgetResult::empty("No universities found", vec![BackendKind::Relational])
            }
            Ok(rows) => {
                let status = format!("{} universities", rows.len());
                WidgetResult::ok(rows, status, vec![BackendKind::Relational])
            }
            Err(err) => WidgetResult::from_query_error(&err),
        }
    }

    /// Top keywords across a university's publications.
    pub async fn university_keywords(&self, university: &str, years: YearRange) -> WidgetResult {
        let params = QueryParams::default()
            .with_university(university)
            .with_years(years);
        let rows = match self
            .run(BackendKind::Relational, Statement::UniversityKeywords, params)
            .await
        {
            Ok(rows) => rows,
            Err(err) => return WidgetResult::from_query_error(&err),
        };

        let ranked = rank_keywords(&rows, TOP_KEYWORDS);
        let sources = vec![BackendKind::Relational];
        if ranked.is_empty() {
            return WidgetResult::empty(
                format!("No keywords found for {}{}", university.trim(), years.describe()),
                sources,
            );
        }
        let status = format!(
            "Top {} keywords for {}{}",
            ranked.len(),
            university.trim(),
            years.describe()
        );
        WidgetResult::ok(ranked, status, sources)
    }

    /// Every publication of one faculty member with summary statistics.
    pub async fn faculty_publications(&self, name: &str, years: YearRange) -> WidgetResult {
        let params = QueryParams::default().with_name(name).with_years(years);
        match self
            .run(BackendKind::Relational, Statement::FacultyPublications, params)
            .await
        {
            Ok(rows) if rows.is_empty() => WidgetResult::empty(
                format!("No publications found for '{}'{}", name.trim(), years.describe()),
                vec![BackendKind::Relational],
            ),
            Ok(rows) => {
                let status = PublicationSummary::from_rows(&rows).status_line();
                WidgetResult::ok(rows, status, vec![BackendKind::Relational])
            }
            Err(err) => WidgetResult::from_query_error(&err),
        }
    }

    /// Citation totals from all three backends, joined on faculty name.
    pub async fn faculty_overview(&self, name: &str) -> WidgetResult {
        let results = self
            .run_everywhere(
                Statement::FacultyCitations,
                QueryParams::default().with_name(name),
            )
            .await;
        let columns = Statement::FacultyCitations.column_names();
        let mut result = Combiner::new(
            &columns,
            "faculty",
            &["publications", "citations"],
            self.policy,
        )
        .combine(results);

        result.rows.sort_by(|a, b| {
            let citations = |row: &Row| row.get("citations").and_then(Value::as_i64).unwrap_or(0);
            citations(b).cmp(&citations(a))
        });
        result
    }

    /// Person lookup across all three backends, joined on name.
    pub async fn faculty_profile(&self, name: &str) -> WidgetResult {
        let results = self
            .run_everywhere(
                Statement::FacultyProfiles,
                QueryParams::default().with_name(name),
            )
            .await;
        let columns = Statement::FacultyProfiles.column_names();
        Combiner::new(&columns, "name", &[], self.policy).combine(results)
    }

    pub async fn collaborators(&self, name: &str) -> WidgetResult {
        let params = QueryParams::default().with_name(name);
        match self
            .run(BackendKind::Graph, Statement::Collaborators, params)
            .await
        {
            Ok(rows) if rows.is_empty() => WidgetResult::empty(
                format!("No collaborators found for '{}'", name.trim()),
                vec![BackendKind::Graph],
            ),
            Ok(rows) => {
                let status = format!("Top {} collaborators of '{}'", rows.len(), name.trim());
                WidgetResult::ok(rows, status, vec![BackendKind::Graph])
            }
            Err(err) => WidgetResult::from_query_error(&err),
        }
    }

    /// Publications per year from the first backend that has any.
    pub async fn publication_trend(&self, years: YearRange) -> WidgetResult {
        let mut skipped = Vec::new();
        let mut errors = 0;
        for kind in TREND_FALLBACK {
            let params = QueryParams::default().with_years(years);
            match self.run(kind, Statement::PublicationsPerYear, params).await {
                Ok(rows) if !rows.is_empty() => {
                    let total: i64 = rows
                        .iter()
                        .filter_map(|row| row.get("publications").and_then(Value::as_i64))
                        .sum();
                    let mut status = format!(
                        "{} publications over {} years from {}{}",
                        total,
                        rows.len(),
                        kind.label(),
                        years.describe()
                    );
                    if skipped.is_empty() {
                        return WidgetResult::ok(rows, status, vec![kind]);
                    }
                    status.push_str(&format!(" ({})", skipped.join("; ")));
                    return WidgetResult::degraded(rows, status, vec![kind]);
                }
                Ok(_) => skipped.push(format!("{} has no data", kind.label())),
                Err(err) => {
                    tracing::info!(kind = %kind, error = %err, "trend falling back");
                    errors += 1;
                    skipped.push(err.describe());
                }
            }
        }

        if errors == TREND_FALLBACK.len() {
            WidgetResult::failed(skipped.join("; "))
        } else {
            WidgetResult::empty(
                format!("No publication years recorded ({})", skipped.join("; ")),
                Vec::new(),
            )
        }
    }
}

/// Splits comma-separated keyword strings, normalizes them, drops keywords
/// of two characters or fewer and sums their mentions.
fn rank_keywords(rows: &[Row], top: usize) -> Vec<Row> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for row in rows {
        let Some(keywords) = row.get("keywords").and_then(Value::as_str) else {
            continue;
        };
        let mentions = row.get("mentions").and_then(Value::as_i64).unwrap_or(1);
        for keyword in keywords.split(',') {
            let keyword = keyword.trim().to_lowercase();
            if keyword.chars().count() > 2 {
                *counts.entry(keyword).or_insert(0) += mentions;
            }
        }
    }

    let mut ranked: Vec<(String, i64)> = counts.into_iter().collect();
    ranked.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| ka.cmp(kb)));
    ranked
        .into_iter()
        .take(top)
        .map(|(keyword, mentions)| Row::new().with("keyword", keyword).with("mentions", mentions))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryExecutor;
    use common::models::WidgetOutcome;

    fn widgets(executor: MemoryExecutor) -> Widgets {
        Widgets::new(Arc::new(executor), ConflictPolicy::PreferLarger)
    }

    fn citations(name: &str, publications: i64, citations: i64) -> Row {
        Row::new()
            .with("faculty", name)
            .with("publications", publications)
            .with("citations", citations)
    }

    fn stats(count: i64, avg: f64) -> Vec<Row> {
        vec![Row::new()
            .with("publication_count", count)
            .with("avg_citations", avg)
            .with("max_citations", 100i64)
            .with("earliest_year", 2001i64)
            .with("latest_year", 2023i64)
            .with("unique_venues", 12i64)]
    }

    #[test]
    fn test_rank_keywords() {
        let rows = vec![
            Row::new().with("keywords", "Machine Learning, AI, data mining").with("mentions", 3i64),
            Row::new().with("keywords", "machine learning ,databases").with("mentions", 2i64),
            Row::new().with("keywords", Value::Null).with("mentions", 9i64),
        ];
        let ranked = rank_keywords(&rows, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].get("keyword"), Some(&Value::from("machine learning")));
        assert_eq!(ranked[0].get("mentions"), Some(&Value::Int(5)));
        assert_eq!(ranked[1].get("keyword"), Some(&Value::from("data mining")));
        assert!(rank_keywords(&rows, 10)
            .iter()
            .all(|row| row.get("keyword") != Some(&Value::from("ai"))));
    }

    #[tokio::test]
    async fn test_keyword_comparison() {
        let executor = MemoryExecutor::new()
            .with_subject_rows(BackendKind::Relational, Statement::KeywordStats, "graphs", stats(40, 12.5))
            .with_subject_rows(BackendKind::Relational, Statement::KeywordStats, "privacy", stats(15, 30.0));
        let result = widgets(executor)
            .keyword_comparison(&["graphs".into(), " privacy ".into(), "  ".into()], YearRange::default())
            .await;

        assert_eq!(result.outcome, WidgetOutcome::Ok);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[1].get("keyword"), Some(&Value::from("privacy")));
        assert!(result.status.starts_with("55 publications across 2 keywords"));
        assert!(result.status.contains("most popular 'graphs'"));
        assert!(result.status.contains("highest cited 'privacy'"));
    }

    #[tokio::test]
    async fn test_keyword_comparison_with_one_keyword_failing() {
        let executor = MemoryExecutor::new()
            .with_subject_rows(BackendKind::Relational, Statement::KeywordStats, "graphs", stats(40, 12.5))
            .with_subject_rows(BackendKind::Relational, Statement::KeywordStats, "privacy", stats(15, 30.0))
            .with_down_for(BackendKind::Relational, "privacy");
        let result = widgets(executor)
            .keyword_comparison(&["graphs".into(), "privacy".into()], YearRange::default())
            .await;

        assert_eq!(result.outcome, WidgetOutcome::Degraded);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].get("keyword"), Some(&Value::from("graphs")));
        assert!(result.status.starts_with("40 publications across 1 keywords"));
        assert!(result.status.contains("Failed: 'privacy': MySQL unavailable"));
    }

    #[tokio::test]
    async fn test_keyword_comparison_needs_two_keywords() {
        let result = widgets(MemoryExecutor::new())
            .keyword_comparison(&["graphs".into(), " ".into()], YearRange::default())
            .await;
        assert_eq!(result.outcome, WidgetOutcome::Failed);
    }

    #[tokio::test]
    async fn test_overview_with_one_backend_down() {
        let executor = MemoryExecutor::new()
            .with_rows(
                BackendKind::Relational,
                Statement::FacultyCitations,
                vec![citations("Ann Lee", 4, 40), citations("Ann Leeds", 2, 90)],
            )
            .with_rows(
                BackendKind::Document,
                Statement::FacultyCitations,
                vec![citations("ann lee", 6, 35)],
            )
            .with_down(BackendKind::Graph);

        let result = widgets(executor).faculty_overview("ann lee").await;
        assert_eq!(result.outcome, WidgetOutcome::Degraded);
        assert_eq!(result.rows.len(), 2);
        assert!(result.is_uniform());
        assert!(result.status.contains("Neo4j unavailable"));

        // Sorted by merged citations, largest first.
        assert_eq!(result.rows[0].get("faculty"), Some(&Value::from("Ann Leeds")));
        let ann = &result.rows[1];
        assert_eq!(ann.get("publications"), Some(&Value::Int(6)));
        assert_eq!(ann.get("citations"), Some(&Value::Int(40)));
        assert_eq!(ann.get("neo4j_citations"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_profile_combines_on_name() {
        let profile = |email: Option<&str>, research: Option<&str>| {
            Row::new()
                .with("name", "Ann Lee")
                .with("email", email)
                .with("position", "Professor")
                .with("department", "CS")
                .with("university", "State University")
                .with("research", research)
        };
        let executor = MemoryExecutor::new()
            .with_rows(BackendKind::Relational, Statement::FacultyProfiles, vec![profile(None, None)])
            .with_rows(
                BackendKind::Graph,
                Statement::FacultyProfiles,
                vec![profile(Some("ann@state.edu"), None)],
            )
            .with_rows(
                BackendKind::Document,
                Statement::FacultyProfiles,
                vec![profile(None, Some("databases, graphs"))],
            );

        let result = widgets(executor).faculty_profile("Ann").await;
        assert_eq!(result.outcome, WidgetOutcome::Ok);
        assert_eq!(result.rows.len(), 1);
        let row = &result.rows[0];
        assert_eq!(row.get("email"), Some(&Value::from("ann@state.edu")));
        assert_eq!(row.get("research"), Some(&Value::from("databases, graphs")));
        assert_eq!(row.get("sources"), Some(&Value::from("MySQL, Neo4j, MongoDB")));
    }

    #[tokio::test]
    async fn test_trend_falls_back_to_document() {
        let per_year = vec![
            Row::new().with("year", 2020i64).with("publications", 3i64),
            Row::new().with("year", 2021i64).with("publications", 5i64),
        ];
        let executor = MemoryExecutor::new()
            .with_down(BackendKind::Relational)
            .with_rows(BackendKind::Document, Statement::PublicationsPerYear, per_year);

        let result = widgets(executor).publication_trend(YearRange::default()).await;
        assert_eq!(result.outcome, WidgetOutcome::Degraded);
        assert_eq!(result.sources, vec![BackendKind::Document]);
        assert!(result.status.starts_with("8 publications over 2 years from MongoDB"));
        assert!(result.status.contains("MySQL unavailable"));
    }

    #[tokio::test]
    async fn test_trend_falls_back_to_graph_last() {
        let executor = Arc::new(
            MemoryExecutor::new()
                .with_down(BackendKind::Relational)
                .with_rows(
                    BackendKind::Graph,
                    Statement::PublicationsPerYear,
                    vec![Row::new().with("year", 2019i64).with("publications", 4i64)],
                ),
        );
        let widgets = Widgets::new(executor.clone(), ConflictPolicy::PreferLarger);

        let result = widgets.publication_trend(YearRange::default()).await;
        assert_eq!(result.outcome, WidgetOutcome::Degraded);
        assert_eq!(result.sources, vec![BackendKind::Graph]);
        assert!(result.status.starts_with("4 publications over 1 years from Neo4j"));
        assert!(result.status.contains("MySQL unavailable"));
        assert!(result.status.contains("MongoDB has no data"));
        assert_eq!(
            executor.calls(),
            vec![BackendKind::Relational, BackendKind::Document, BackendKind::Graph]
        );
    }

    #[tokio::test]
    async fn test_trend_stops_at_first_backend_with_data() {
        let executor = Arc::new(MemoryExecutor::new().with_rows(
            BackendKind::Relational,
            Statement::PublicationsPerYear,
            vec![Row::new().with("year", 2020i64).with("publications", 7i64)],
        ));
        let widgets = Widgets::new(executor.clone(), ConflictPolicy::PreferLarger);

        let result = widgets.publication_trend(YearRange::default()).await;
        assert_eq!(result.outcome, WidgetOutcome::Ok);
        assert_eq!(executor.calls(), vec![BackendKind::Relational]);
    }

    #[tokio::test]
    async fn test_trend_with_every_backend_down_fails() {
        let executor = MemoryExecutor::new()
            .with_down(BackendKind::Relational)
            .with_down(BackendKind::Document)
            .with_down(BackendKind::Graph);
        let result = widgets(executor).publication_trend(YearRange::default()).await;
        assert_eq!(result.outcome, WidgetOutcome::Failed);
        assert!(result.rows.is_empty());
        assert!(result.status.contains("MySQL unavailable"));
        assert!(result.status.contains("MongoDB unavailable"));
        assert!(result.status.contains("Neo4j unavailable"));
    }

    #[tokio::test]
    async fn test_trend_without_data_is_empty() {
        let result = widgets(MemoryExecutor::new())
            .publication_trend(YearRange::default())
            .await;
        assert_eq!(result.outcome, WidgetOutcome::Empty);
        assert!(result.rows.is_empty());
    }

    #[tokio::test]
    async fn test_faculty_publications_summary() {
        let row = |title: &str, year: i64, citations: i64| {
            Row::new()
                .with("title", title)
                .with("year", year)
                .with("venue", "VLDB")
                .with("citations", citations)
                .with("faculty_name", "Ann Lee")
                .with("university", "State University")
                .with("department", "CS")
        };
        let executor = MemoryExecutor::new().with_rows(
            BackendKind::Relational,
            Statement::FacultyPublications,
            vec![row("A", 2019, 10), row("B", 2021, 3)],
        );
        let result = widgets(executor)
            .faculty_publications("Ann Lee", YearRange::default())
            .await;
        assert_eq!(result.rows.len(), 2);
        assert!(result.status.starts_with("2 publications, 13 citations"));
        assert!(result.status.contains("h-index 2"));
    }

    #[tokio::test]
    async fn test_collaborators_are_graph_only() {
        let executor = MemoryExecutor::new().with_subject_rows(
            BackendKind::Graph,
            Statement::Collaborators,
            "ann lee",
            vec![Row::new().with("collaborator", "Bo Chen").with("joint_publications", 4i64)],
        );
        let widgets = widgets(executor);
        let result = widgets.collaborators("Ann Lee").await;
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.sources, vec![BackendKind::Graph]);
    }
}
