//! Widget results, sample sizes and conflict policies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::connection::BackendKind;
use super::row::{Row, Value};
use crate::errors::QueryError;

/// Display sample sizes offered by the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SampleSize {
    #[serde(rename = "10")]
    Ten,
    #[default]
    #[serde(rename = "20")]
    Twenty,
    #[serde(rename = "50")]
    Fifty,
    #[serde(rename = "100")]
    Hundred,
    #[serde(rename = "all")]
    All,
}

impl SampleSize {
    /// Row cap, `None` for `all`.
    pub fn limit(&self) -> Option<usize> {
        match self {
            SampleSize::Ten => Some(10),
            SampleSize::Twenty => Some(20),
            SampleSize::Fifty => Some(50),
            SampleSize::Hundred => Some(100),
            SampleSize::All => None,
        }
    }
}

impl fmt::Display for SampleSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit() {
            Some(n) => write!(f, "{}", n),
            None => f.write_str("all"),
        }
    }
}

impl FromStr for SampleSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "10" => Ok(SampleSize::Ten),
            "20" => Ok(SampleSize::Twenty),
            "50" => Ok(SampleSize::Fifty),
            "100" => Ok(SampleSize::Hundred),
            "all" => Ok(SampleSize::All),
            other => Err(format!(
                "unsupported sample size {:?}, expected one of 10, 20, 50, 100, all",
                other
            )),
        }
    }
}

/// A sample size applied to a concrete source length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRequest {
    pub target: SampleSize,
    pub source_len: usize,
}

impl SampleRequest {
    pub fn new(target: SampleSize, source_len: usize) -> Self {
        Self { target, source_len }
    }

    /// min(target, source).
    pub fn effective_size(&self) -> usize {
        self.target
            .limit()
            .map_or(self.source_len, |n| n.min(self.source_len))
    }
}

/// How a widget refresh turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WidgetOutcome {
    Ok,
    Empty,
    /// Some backends failed, the rest answered.
    Degraded,
    Failed,
}

/// Rows plus a human-readable status for one widget refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WidgetResult {
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Row>,
    pub status: String,
    pub outcome: WidgetOutcome,
    /// Backends whose rows are included.
    pub sources: Vec<BackendKind>,
    /// Set when a newer refresh of the same widget started meanwhile.
    pub stale: bool,
}

impl WidgetResult {
    fn build(
        rows: Vec<Row>,
        status: impl Into<String>,
        outcome: WidgetOutcome,
        sources: Vec<BackendKind>,
    ) -> Self {
        Self {
            rows,
            status: status.into(),
            outcome,
            sources,
            stale: false,
        }
    }

    /// `Ok` when rows are present, `Empty` otherwise.
    pub fn ok(rows: Vec<Row>, status: impl Into<String>, sources: Vec<BackendKind>) -> Self {
        let outcome = if rows.is_empty() {
            WidgetOutcome::Empty
        } else {
            WidgetOutcome::Ok
        };
        Self::build(rows, status, outcome, sources)
    }

    pub fn empty(status: impl Into<String>, sources: Vec<BackendKind>) -> Self {
        Self::build(Vec::new(), status, WidgetOutcome::Empty, sources)
    }

    pub fn degraded(rows: Vec<Row>, status: impl Into<String>, sources: Vec<BackendKind>) -> Self {
        Self::build(rows, status, WidgetOutcome::Degraded, sources)
    }

    pub fn failed(status: impl Into<String>) -> Self {
        Self::build(Vec::new(), status, WidgetOutcome::Failed, Vec::new())
    }

    pub fn from_query_error(err: &QueryError) -> Self {
        Self::failed(err.describe())
    }

    pub fn with_stale(mut self, stale: bool) -> Self {
        self.stale = stale;
        self
    }

    /// Field names of the first row.
    pub fn columns(&self) -> Vec<&str> {
        self.rows.first().map(Row::field_names).unwrap_or_default()
    }

    /// True when every row has the same field set.
    pub fn is_uniform(&self) -> bool {
        match self.rows.split_first() {
            Some((first, rest)) => rest.iter().all(|row| row.same_fields(first)),
            None => true,
        }
    }
}

/// Resolution of same-key conflicts on aggregate columns when combining
/// results from several backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    PreferLarger,
    PreferSmaller,
    PreferFirst,
}

impl ConflictPolicy {
    /// Whether `incoming` should replace the value already merged.
    /// Non-numeric values never replace.
    pub fn prefers_incoming(&self, current: &Value, incoming: &Value) -> bool {
        let (Some(current), Some(incoming)) = (current.as_f64(), incoming.as_f64()) else {
            return false;
        };
        match self {
            ConflictPolicy::PreferLarger => incoming > current,
            ConflictPolicy::PreferSmaller => incoming < current,
            ConflictPolicy::PreferFirst => false,
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "prefer_larger" | "larger" => Ok(ConflictPolicy::PreferLarger),
            "prefer_smaller" | "smaller" => Ok(ConflictPolicy::PreferSmaller),
            "prefer_first" | "first" => Ok(ConflictPolicy::PreferFirst),
            other => Err(format!("unknown conflict policy: {}", other)),
        }
    }
}
