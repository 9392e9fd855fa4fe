//! In-memory executor and store for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use common::errors::{PersistenceError, QueryError};
use common::models::{BackendKind, QuerySpec, Row, SavedSearchDocument, Statement, Value};

use crate::dispatcher::QueryExecutor;

/// Serves canned rows per backend and statement, filtered the way the real
/// backends filter. Rows registered for a subject (keyword, name or
/// university) are served as-is for that subject. A backend marked down,
/// entirely or for one subject, answers `BackendUnavailable`.
#[derive(Default)]
pub struct MemoryExecutor {
    rows: HashMap<(BackendKind, Statement), Vec<Row>>,
    by_subject: HashMap<(BackendKind, Statement, String), Vec<Row>>,
    down: Vec<BackendKind>,
    down_for: Vec<(BackendKind, String)>,
    calls: Mutex<Vec<BackendKind>>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, kind: BackendKind, statement: Statement, rows: Vec<Row>) -> Self {
        self.rows.insert((kind, statement), rows);
        self
    }

    pub fn with_subject_rows(
        mut self,
        kind: BackendKind,
        statement: Statement,
        subject: &str,
        rows: Vec<Row>,
    ) -> Self {
        self.by_subject
            .insert((kind, statement, subject.to_lowercase()), rows);
        self
    }

    pub fn with_down(mut self, kind: BackendKind) -> Self {
        self.down.push(kind);
        self
    }

    /// Fails only queries about `subject`.
    pub fn with_down_for(mut self, kind: BackendKind, subject: &str) -> Self {
        self.down_for.push((kind, subject.to_lowercase()));
        self
    }

    /// Backends queried so far, in order.
    pub fn calls(&self) -> Vec<BackendKind> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

fn text_fields(row: &Row) -> impl Iterator<Item = String> + '_ {
    row.iter()
        .filter_map(|(_, value)| value.as_str())
        .map(str::to_lowercase)
}

/// Every whitespace-separated part appears, in order.
fn name_matches(candidate: &str, name: &str) -> bool {
    let mut rest = candidate;
    for part in name.split_whitespace().map(str::to_lowercase) {
        match rest.find(&part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    true
}

fn matches(spec: &QuerySpec, row: &Row) -> bool {
    if let Some(Value::Int(year)) = row.get("year") {
        if !spec.years().contains(*year) {
            return false;
        }
    }
    let keyword = spec.keyword().to_lowercase();
    if !keyword.is_empty() && !text_fields(row).any(|text| text.contains(&keyword)) {
        return false;
    }
    if !spec.name().is_empty() {
        let named = ["faculty_name", "name", "faculty"]
            .iter()
            .find_map(|column| row.get(column).and_then(Value::as_str));
        if !named.is_some_and(|n| name_matches(&n.to_lowercase(), spec.name())) {
            return false;
        }
    }
    let university = spec.university();
    if !university.is_empty()
        && row.get("university").is_some()
        && row.get("university").and_then(Value::as_str) != Some(university)
    {
        return false;
    }
    true
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, QueryError> {
        let kind = spec.kind();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(kind);
        }
        let subject = [spec.keyword(), spec.name(), spec.university()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_lowercase();
        if self.down.contains(&kind) || self.down_for.contains(&(kind, subject.clone())) {
            return Err(QueryError::BackendUnavailable {
                kind,
                reason: "unreachable: connection refused".to_string(),
            });
        }
        let rows = match self.by_subject.get(&(kind, spec.statement(), subject)) {
            Some(rows) => rows.clone(),
            None => self
                .rows
                .get(&(kind, spec.statement()))
                .map(|rows| {
                    rows.iter()
                        .filter(|row| matches(spec, row))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
        };
        let limit = spec.limit().map_or(rows.len(), |l| l as usize);
        Ok(rows.into_iter().take(limit).collect())
    }
}

/// Saved searches kept in a vector.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<SavedSearchDocument>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn unavailable() -> Self {
        Self {
            documents: Mutex::default(),
            unavailable: true,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.unavailable {
            Err(PersistenceError::Unavailable("unreachable: connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl crate::persistence::SavedSearchStore for MemoryStore {
    async fn insert(&self, document: &SavedSearchDocument) -> Result<(), PersistenceError> {
        self.check()?;
        self.documents.lock().unwrap().push(document.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SavedSearchDocument>, PersistenceError> {
        self.check()?;
        Ok(self.documents.lock().unwrap().clone())
    }

    async fn find(&self, id: &str) -> Result<Option<SavedSearchDocument>, PersistenceError> {
        self.check()?;
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn remove(&self, id: &str) -> Result<bool, PersistenceError> {
        self.check()?;
        let mut documents = self.documents.lock().unwrap();
        let before = documents.len();
        documents.retain(|d| d.id != id);
        Ok(documents.len() < before)
    }
}

/// A publication row in the `publications_by_keyword` schema.
pub fn publication(title: &str, year: i64, venue: &str, citations: i64, authors: &str) -> Row {
    Row::new()
        .with("title", title)
        .with("year", year)
        .with("venue", venue)
        .with("citations", citations)
        .with("authors", authors)
}
