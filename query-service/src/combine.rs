//! Cross-backend outer join of statement results.
//!
//! Rows are matched on a key column compared case- and
//! whitespace-insensitively. The combined row carries the statement columns
//! (merged), one column per backend and aggregate (`mysql_citations`, ...)
//! and a `sources` column listing the backends that had the key. Columns of a
//! backend that lacks the key, or failed altogether, are null.

use std::collections::HashMap;

use common::errors::QueryError;
use common::models::{BackendKind, ConflictPolicy, Row, Value, WidgetResult};

/// One backend's answer to the same statement.
#[derive(Debug)]
pub struct BackendRows {
    pub kind: BackendKind,
    pub result: Result<Vec<Row>, QueryError>,
}

impl BackendRows {
    pub fn new(kind: BackendKind, result: Result<Vec<Row>, QueryError>) -> Self {
        Self { kind, result }
    }
}

/// Lowercased with inner whitespace collapsed.
pub fn normalize_key(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn backend_column(kind: BackendKind, column: &str) -> String {
    format!("{}_{}", kind.label().to_lowercase(), column)
}

struct Merged {
    values: Vec<Value>,
    per_backend: HashMap<(BackendKind, usize), Value>,
    sources: Vec<BackendKind>,
}

pub struct Combiner<'a> {
    columns: &'a [&'a str],
    key: &'a str,
    aggregates: &'a [&'a str],
    policy: ConflictPolicy,
}

impl<'a> Combiner<'a> {
    /// `columns` is the statement schema and must contain `key` and every
    /// aggregate.
    pub fn new(
        columns: &'a [&'a str],
        key: &'a str,
        aggregates: &'a [&'a str],
        policy: ConflictPolicy,
    ) -> Self {
        Self {
            columns,
            key,
            aggregates,
            policy,
        }
    }

    fn output_columns(&self, kinds: &[BackendKind]) -> Vec<String> {
        let mut names: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        for kind in kinds {
            for aggregate in self.aggregates {
                names.push(backend_column(*kind, aggregate));
            }
        }
        names.push("sources".to_string());
        names
    }

    fn merge(&self, merged: &mut Merged, kind: BackendKind, row: &Row) {
        for (i, column) in self.columns.iter().enumerate() {
            let incoming = row.get(column).cloned().unwrap_or(Value::Null);
            if incoming.is_null() {
                continue;
            }
            let current = &merged.values[i];
            let replace = current.is_null()
                || (self.aggregates.contains(column)
                    && self.policy.prefers_incoming(current, &incoming));
            if replace {
                merged.values[i] = incoming.clone();
            }
        }
        for (j, aggregate) in self.aggregates.iter().enumerate() {
            let incoming = row.get(aggregate).cloned().unwrap_or(Value::Null);
            // Duplicate keys within one backend resolve like keys across backends.
            let slot = merged.per_backend.entry((kind, j)).or_insert(Value::Null);
            if !incoming.is_null()
                && (slot.is_null() || self.policy.prefers_incoming(slot, &incoming))
            {
                *slot = incoming;
            }
        }
        if !merged.sources.contains(&kind) {
            merged.sources.push(kind);
        }
    }

    pub fn combine(&self, results: Vec<BackendRows>) -> WidgetResult {
        let mut kinds: Vec<BackendKind> = Vec::with_capacity(results.len());
        for BackendRows { kind, .. } in &results {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, Merged> = HashMap::new();
        let mut answered = Vec::new();
        let mut failures = Vec::new();

        for BackendRows { kind, result } in &results {
            let rows = match result {
                Ok(rows) => rows,
                Err(err) => {
                    tracing::warn!(kind = %kind, error = %err, "backend missing from combined result");
                    failures.push(match err {
                        QueryError::Malformed(_) => format!("{}: {}", kind.label(), err.describe()),
                        _ => err.describe(),
                    });
                    continue;
                }
            };
            if !answered.contains(kind) {
                answered.push(*kind);
            }

            for row in rows {
                let Some(key) = row.get(self.key).and_then(Value::as_str) else {
                    continue;
                };
                let normalized = normalize_key(key);
                if normalized.is_empty() {
                    continue;
                }
                let entry = merged.entry(normalized.clone()).or_insert_with(|| {
                    order.push(normalized);
                    Merged {
                        values: vec![Value::Null; self.columns.len()],
                        per_backend: HashMap::new(),
                        sources: Vec::new(),
                    }
                });
                self.merge(entry, *kind, row);
            }
        }

        let names = self.output_columns(&kinds);
        let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let rows: Vec<Row> = order
            .iter()
            .filter_map(|key| merged.remove(key))
            .map(|m| {
                let mut values = m.values;
                for kind in &kinds {
                    for j in 0..self.aggregates.len() {
                        values.push(m.per_backend.get(&(*kind, j)).cloned().unwrap_or(Value::Null));
                    }
                }
                let sources: Vec<&str> = m.sources.iter().map(|k| k.label()).collect();
                values.push(Value::from(sources.join(", ")));
                Row::from_columns(&name_refs, values)
            })
            .collect();

        let labels: Vec<&str> = answered.iter().map(|k| k.label()).collect();
        if answered.is_empty() {
            return WidgetResult::failed(format!("No backend answered. {}", failures.join("; ")));
        }
        if !failures.is_empty() {
            let status = format!(
                "{} rows from {}. {}",
                rows.len(),
                labels.join(", "),
                failures.join("; ")
            );
            return WidgetResult::degraded(rows, status, answered);
        }
        if rows.is_empty() {
            return WidgetResult::empty(
                format!("No matching rows in {}", labels.join(", ")),
                answered,
            );
        }
        let status = format!("{} rows from {}", rows.len(), labels.join(", "));
        WidgetResult::ok(rows, status, answered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::WidgetOutcome;

    const COLUMNS: &[&str] = &["faculty", "publications", "citations"];
    const AGGREGATES: &[&str] = &["publications", "citations"];

    fn row(name: &str, publications: i64, citations: i64) -> Row {
        Row::new()
            .with("faculty", name)
            .with("publications", publications)
            .with("citations", citations)
    }

    fn combiner(policy: ConflictPolicy) -> Combiner<'static> {
        Combiner::new(COLUMNS, "faculty", AGGREGATES, policy)
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(normalize_key("  Ann   LEE "), "ann lee");
    }

    #[test]
    fn test_outer_join_fills_missing_with_null() {
        let result = combiner(ConflictPolicy::PreferLarger).combine(vec![
            BackendRows::new(BackendKind::Relational, Ok(vec![row("Ann Lee", 4, 40)])),
            BackendRows::new(
                BackendKind::Document,
                Ok(vec![row("ann  lee", 5, 30), row("Bo Chen", 1, 2)]),
            ),
        ]);

        assert_eq!(result.outcome, WidgetOutcome::Ok);
        assert_eq!(result.rows.len(), 2);
        assert!(result.is_uniform());

        let ann = &result.rows[0];
        assert_eq!(ann.get("faculty"), Some(&Value::from("Ann Lee")));
        assert_eq!(ann.get("publications"), Some(&Value::Int(5)));
        assert_eq!(ann.get("citations"), Some(&Value::Int(40)));
        assert_eq!(ann.get("mysql_citations"), Some(&Value::Int(40)));
        assert_eq!(ann.get("mongodb_citations"), Some(&Value::Int(30)));
        assert_eq!(ann.get("sources"), Some(&Value::from("MySQL, MongoDB")));

        let bo = &result.rows[1];
        assert_eq!(bo.get("mysql_citations"), Some(&Value::Null));
        assert_eq!(bo.get("mongodb_publications"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_policies_pick_different_values() {
        let inputs = || {
            vec![
                BackendRows::new(BackendKind::Relational, Ok(vec![row("Ann Lee", 4, 40)])),
                BackendRows::new(BackendKind::Graph, Ok(vec![row("Ann Lee", 6, 10)])),
            ]
        };
        let smaller = combiner(ConflictPolicy::PreferSmaller).combine(inputs());
        assert_eq!(smaller.rows[0].get("citations"), Some(&Value::Int(10)));
        assert_eq!(smaller.rows[0].get("publications"), Some(&Value::Int(4)));

        let first = combiner(ConflictPolicy::PreferFirst).combine(inputs());
        assert_eq!(first.rows[0].get("citations"), Some(&Value::Int(40)));
        assert_eq!(first.rows[0].get("publications"), Some(&Value::Int(4)));
    }

    #[test]
    fn test_unreachable_backend_degrades_result() {
        let result = combiner(ConflictPolicy::PreferLarger).combine(vec![
            BackendRows::new(BackendKind::Relational, Ok(vec![row("Ann Lee", 4, 40)])),
            BackendRows::new(
                BackendKind::Graph,
                Err(QueryError::BackendUnavailable {
                    kind: BackendKind::Graph,
                    reason: "unreachable: connection refused".into(),
                }),
            ),
            BackendRows::new(BackendKind::Document, Ok(vec![row("Ann Lee", 5, 30)])),
        ]);

        assert_eq!(result.outcome, WidgetOutcome::Degraded);
        assert!(!result.rows.is_empty());
        assert!(result.status.contains("Neo4j unavailable"));
        assert_eq!(result.sources, vec![BackendKind::Relational, BackendKind::Document]);
        let ann = &result.rows[0];
        assert_eq!(ann.get("neo4j_citations"), Some(&Value::Null));
        assert_eq!(ann.get("neo4j_publications"), Some(&Value::Null));
        assert!(result.is_uniform());
    }

    #[test]
    fn test_all_backends_failing() {
        let down = |kind| {
            BackendRows::new(
                kind,
                Err(QueryError::Timeout { kind, seconds: 10 }),
            )
        };
        let result = combiner(ConflictPolicy::PreferLarger)
            .combine(vec![down(BackendKind::Relational), down(BackendKind::Graph)]);
        assert_eq!(result.outcome, WidgetOutcome::Failed);
        assert!(result.rows.is_empty());
        assert!(result.status.contains("MySQL query timed out"));
    }

    #[test]
    fn test_duplicate_keys_in_one_backend_follow_policy() {
        let result = combiner(ConflictPolicy::PreferLarger).combine(vec![BackendRows::new(
            BackendKind::Relational,
            Ok(vec![row("Ann Lee", 2, 5), row("ann lee", 1, 50)]),
        )]);
        assert_eq!(result.rows.len(), 1);
        let ann = &result.rows[0];
        assert_eq!(ann.get("citations"), Some(&Value::Int(50)));
        assert_eq!(ann.get("mysql_citations"), Some(&Value::Int(50)));
        assert_eq!(ann.get("publications"), Some(&Value::Int(2)));
        assert_eq!(ann.get("mysql_publications"), Some(&Value::Int(2)));

        let smaller = combiner(ConflictPolicy::PreferSmaller).combine(vec![BackendRows::new(
            BackendKind::Relational,
            Ok(vec![row("Ann Lee", 2, 5), row("ann lee", 1, 50)]),
        )]);
        assert_eq!(smaller.rows[0].get("citations"), Some(&Value::Int(5)));
        assert_eq!(smaller.rows[0].get("mysql_citations"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_repeated_backend_emits_columns_once() {
        let result = combiner(ConflictPolicy::PreferLarger).combine(vec![
            BackendRows::new(BackendKind::Graph, Ok(vec![row("Ann Lee", 1, 3)])),
            BackendRows::new(BackendKind::Graph, Ok(vec![row("Bo Chen", 2, 4)])),
        ]);
        assert_eq!(
            result.columns(),
            vec![
                "faculty",
                "publications",
                "citations",
                "neo4j_publications",
                "neo4j_citations",
                "sources"
            ]
        );
        assert_eq!(result.sources, vec![BackendKind::Graph]);
        assert!(result.is_uniform());
    }

    #[test]
    fn test_no_matches_is_empty() {
        let result = combiner(ConflictPolicy::PreferLarger)
            .combine(vec![BackendRows::new(BackendKind::Relational, Ok(vec![]))]);
        assert_eq!(result.outcome, WidgetOutcome::Empty);
    }
}
