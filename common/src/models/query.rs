//! Query specifications.
//!
//! A [`QuerySpec`] names one of the fixed statements, the backend it runs on
//! and its bound parameters. It is validated once at construction and never
//! changes afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::connection::BackendKind;
use crate::errors::QueryError;

/// Inclusive publication year bounds. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct YearRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i32>,
}

impl YearRange {
    pub fn new(from: Option<i32>, to: Option<i32>) -> Self {
        Self { from, to }
    }

    pub fn between(from: i32, to: i32) -> Self {
        Self::new(Some(from), Some(to))
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, year: i64) -> bool {
        self.from.map_or(true, |from| year >= from as i64)
            && self.to.map_or(true, |to| year <= to as i64)
    }

    /// Human readable suffix such as " (2018-2022)".
    pub fn describe(&self) -> String {
        match (self.from, self.to) {
            (None, None) => String::new(),
            (Some(from), None) => format!(" (from {})", from),
            (None, Some(to)) => format!(" (until {})", to),
            (Some(from), Some(to)) => format!(" ({}-{})", from, to),
        }
    }
}

pub(crate) fn validate_year_range(range: &YearRange) -> Result<(), ValidationError> {
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from > to {
            let mut err = ValidationError::new("year_range");
            err.message = Some(format!("year range start {} is after end {}", from, to).into());
            return Err(err);
        }
    }
    Ok(())
}

/// Scalar type of a statement column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Date,
}

/// Parameter a statement cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Keyword,
    Name,
    University,
}

/// Named query shapes. Each has a fixed output column schema shared by every
/// backend that supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    PublicationsByKeyword,
    AllPublications,
    FacultyPublications,
    KeywordStats,
    Universities,
    UniversityKeywords,
    FacultyProfiles,
    FacultyCitations,
    Collaborators,
    PublicationsPerYear,
}

use BackendKind::{Document, Graph, Relational};
use ColumnType::{Float, Int, Text};

const PUBLICATION_COLUMNS: &[(&str, ColumnType)] = &[
    ("title", Text),
    ("year", Int),
    ("venue", Text),
    ("citations", Int),
    ("authors", Text),
];

impl Statement {
    pub const ALL: [Statement; 10] = [
        Statement::PublicationsByKeyword,
        Statement::AllPublications,
        Statement::FacultyPublications,
        Statement::KeywordStats,
        Statement::Universities,
        Statement::UniversityKeywords,
        Statement::FacultyProfiles,
        Statement::FacultyCitations,
        Statement::Collaborators,
        Statement::PublicationsPerYear,
    ];

    /// Output columns in order.
    pub fn columns(&self) -> &'static [(&'static str, ColumnType)] {
        match self {
            Statement::PublicationsByKeyword | Statement::AllPublications => PUBLICATION_COLUMNS,
            Statement::FacultyPublications => &[
                ("title", Text),
                ("year", Int),
                ("venue", Text),
                ("citations", Int),
                ("faculty_name", Text),
                ("university", Text),
                ("department", Text),
            ],
            Statement::KeywordStats => &[
                ("publication_count", Int),
                ("avg_citations", Float),
                ("max_citations", Int),
                ("earliest_year", Int),
                ("latest_year", Int),
                ("unique_venues", Int),
            ],
            Statement::Universities => &[("university", Text)],
            Statement::UniversityKeywords => &[("keywords", Text), ("mentions", Int)],
            Statement::FacultyProfiles => &[
                ("name", Text),
                ("email", Text),
                ("position", Text),
                ("department", Text),
                ("university", Text),
                ("research", Text),
            ],
            Statement::FacultyCitations => &[
                ("faculty", Text),
                ("publications", Int),
                ("citations", Int),
            ],
            Statement::Collaborators => &[("collaborator", Text), ("joint_publications", Int)],
            Statement::PublicationsPerYear => &[("year", Int), ("publications", Int)],
        }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns().iter().map(|(name, _)| *name).collect()
    }

    pub fn backends(&self) -> &'static [BackendKind] {
        match self {
            Statement::PublicationsByKeyword
            | Statement::FacultyProfiles
            | Statement::FacultyCitations
            | Statement::PublicationsPerYear => &[Relational, Graph, Document],
            Statement::FacultyPublications => &[Relational, Graph],
            Statement::AllPublications
            | Statement::KeywordStats
            | Statement::Universities
            | Statement::UniversityKeywords => &[Relational],
            Statement::Collaborators => &[Graph],
        }
    }

    pub fn supports(&self, kind: BackendKind) -> bool {
        self.backends().contains(&kind)
    }

    pub fn required(&self) -> &'static [Param] {
        match self {
            Statement::PublicationsByKeyword | Statement::KeywordStats => &[Param::Keyword],
            Statement::FacultyPublications
            | Statement::FacultyProfiles
            | Statement::FacultyCitations
            | Statement::Collaborators => &[Param::Name],
            Statement::UniversityKeywords => &[Param::University],
            Statement::AllPublications
            | Statement::Universities
            | Statement::PublicationsPerYear => &[],
        }
    }

    /// Row cap applied when the caller gives none. `None` for aggregates.
    pub fn default_limit(&self) -> Option<u32> {
        match self {
            Statement::PublicationsByKeyword
            | Statement::AllPublications
            | Statement::FacultyPublications => Some(1000),
            Statement::UniversityKeywords => Some(50),
            Statement::FacultyProfiles | Statement::FacultyCitations => Some(25),
            Statement::Collaborators => Some(10),
            Statement::KeywordStats | Statement::Universities | Statement::PublicationsPerYear => {
                None
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Statement::PublicationsByKeyword => "publications_by_keyword",
            Statement::AllPublications => "all_publications",
            Statement::FacultyPublications => "faculty_publications",
            Statement::KeywordStats => "keyword_stats",
            Statement::Universities => "universities",
            Statement::UniversityKeywords => "university_keywords",
            Statement::FacultyProfiles => "faculty_profiles",
            Statement::FacultyCitations => "faculty_citations",
            Statement::Collaborators => "collaborators",
            Statement::PublicationsPerYear => "publications_per_year",
        };
        f.write_str(name)
    }
}

/// Bound parameters of a statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct QueryParams {
    #[validate(length(min = 1, max = 200, message = "Keyword must be 1-200 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,

    #[validate(length(min = 1, max = 120, message = "Name must be 1-120 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 200, message = "University must be 1-200 characters"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,

    #[validate(custom(function = "validate_year_range"))]
    #[serde(default)]
    pub years: YearRange,

    #[validate(range(min = 1, max = 5000, message = "Limit must be 1-5000"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl QueryParams {
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_university(mut self, university: impl Into<String>) -> Self {
        self.university = Some(university.into());
        self
    }

    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn normalized(self) -> Self {
        Self {
            keyword: clean(self.keyword),
            name: clean(self.name),
            university: clean(self.university),
            ..self
        }
    }

    fn has(&self, param: Param) -> bool {
        match param {
            Param::Keyword => self.keyword.is_some(),
            Param::Name => self.name.is_some(),
            Param::University => self.university.is_some(),
        }
    }
}

/// A validated, immutable query for one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    kind: BackendKind,
    statement: Statement,
    params: QueryParams,
}

impl QuerySpec {
    /// Validates and freezes a query.
    ///
    /// Text parameters are trimmed; blank values count as missing. Fails with
    /// [`QueryError::Malformed`] on invalid parameters, a missing required
    /// parameter, or a statement the backend does not support.
    pub fn new(
        kind: BackendKind,
        statement: Statement,
        params: QueryParams,
    ) -> Result<Self, QueryError> {
        let mut params = params.normalized();
        params
            .validate()
            .map_err(|e| QueryError::Malformed(e.to_string()))?;

        if !statement.supports(kind) {
            return Err(QueryError::Malformed(format!(
                "{} is not available on the {} backend",
                statement, kind
            )));
        }

        if let Some(missing) = statement.required().iter().find(|p| !params.has(**p)) {
            return Err(QueryError::Malformed(format!(
                "{} requires a {:?} parameter",
                statement, missing
            )));
        }

        if params.limit.is_none() {
            params.limit = statement.default_limit();
        }

        Ok(Self {
            kind,
            statement,
            params,
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn statement(&self) -> Statement {
        self.statement
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Required text parameter; empty string when absent.
    pub fn keyword(&self) -> &str {
        self.params.keyword.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.params.name.as_deref().unwrap_or_default()
    }

    pub fn university(&self) -> &str {
        self.params.university.as_deref().unwrap_or_default()
    }

    pub fn years(&self) -> YearRange {
        self.params.years
    }

    pub fn limit(&self) -> Option<u32> {
        self.params.limit
    }

    /// Same statement and parameters against another backend.
    pub fn on(&self, kind: BackendKind) -> Result<Self, QueryError> {
        Self::new(kind, self.statement, self.params.clone())
    }
}
