//! MySQL statements.
//!
//! Tables: `publication`, `faculty` and the `publication_author` link table.
//! Numeric columns are cast in SQL so they decode as `BIGINT` or `DOUBLE`.

use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool, Row as _};

use common::errors::ConnectionError;
use common::models::{ColumnType, QuerySpec, Row, Statement, Value, YearRange};
use common::utils::SearchPattern;

use super::{build_row, BackendFailure};

type MySqlQuery = Query<'static, MySql, MySqlArguments>;

/// Inclusive year bounds; each bound is bound twice so NULL disables it.
macro_rules! year_filter {
    () => {
        "(? IS NULL OR p.year >= ?) AND (? IS NULL OR p.year <= ?)"
    };
}

const PUBLICATIONS_BY_KEYWORD: &str = concat!(
    "\
SELECT p.title AS title, CAST(p.year AS SIGNED) AS year, p.venue AS venue,
       CAST(COALESCE(p.citations, 0) AS SIGNED) AS citations,
       CAST(GROUP_CONCAT(DISTINCT f.name ORDER BY f.name SEPARATOR ', ') AS CHAR) AS authors
FROM publication p
LEFT JOIN publication_author pa ON p.id = pa.publication_id
LEFT JOIN faculty f ON pa.faculty_id = f.id
WHERE (LOWER(p.title) LIKE ? OR LOWER(p.abstract) LIKE ?
       OR LOWER(p.keywords) LIKE ? OR LOWER(p.venue) LIKE ?)
  AND ",
    year_filter!(),
    "
GROUP BY p.id, p.title, p.year, p.venue, p.citations
ORDER BY p.citations DESC, p.year DESC
LIMIT ?"
);

const ALL_PUBLICATIONS: &str = concat!(
    "\
SELECT p.title AS title, CAST(p.year AS SIGNED) AS year, p.venue AS venue,
       CAST(COALESCE(p.citations, 0) AS SIGNED) AS citations,
       CAST(GROUP_CONCAT(DISTINCT f.name ORDER BY f.name SEPARATOR ', ') AS CHAR) AS authors
FROM publication p
LEFT JOIN publication_author pa ON p.id = pa.publication_id
LEFT JOIN faculty f ON pa.faculty_id = f.id
WHERE ",
    year_filter!(),
    "
GROUP BY p.id, p.title, p.year, p.venue, p.citations
ORDER BY p.citations DESC, p.year DESC
LIMIT ?"
);

const FACULTY_PUBLICATIONS: &str = concat!(
    "\
SELECT p.title AS title, CAST(p.year AS SIGNED) AS year, p.venue AS venue,
       CAST(COALESCE(p.citations, 0) AS SIGNED) AS citations,
       f.name AS faculty_name, f.university AS university, f.department AS department
FROM publication p
JOIN publication_author pa ON p.id = pa.publication_id
JOIN faculty f ON pa.faculty_id = f.id
WHERE LOWER(f.name) LIKE ?
  AND ",
    year_filter!(),
    "
ORDER BY p.year DESC, p.citations DESC
LIMIT ?"
);

const KEYWORD_STATS: &str = concat!(
    "\
SELECT COUNT(*) AS publication_count,
       CAST(AVG(p.citations) AS DOUBLE) AS avg_citations,
       CAST(MAX(p.citations) AS SIGNED) AS max_citations,
       CAST(MIN(p.year) AS SIGNED) AS earliest_year,
       CAST(MAX(p.year) AS SIGNED) AS latest_year,
       COUNT(DISTINCT p.venue) AS unique_venues
FROM publication p
WHERE (LOWER(p.title) LIKE ? OR LOWER(p.abstract) LIKE ? OR LOWER(p.keywords) LIKE ?)
  AND ",
    year_filter!(),
    ""
);

const UNIVERSITIES: &str = "\
SELECT DISTINCT university
FROM faculty
WHERE university IS NOT NULL AND university <> ''
ORDER BY university";

const UNIVERSITY_KEYWORDS: &str = concat!(
    "\
SELECT p.keywords AS keywords, COUNT(*) AS mentions
FROM publication p
JOIN publication_author pa ON p.id = pa.publication_id
JOIN faculty f ON pa.faculty_id = f.id
WHERE f.university = ?
  AND p.keywords IS NOT NULL AND p.keywords <> ''
  AND ",
    year_filter!(),
    "
GROUP BY p.keywords
ORDER BY mentions DESC
LIMIT ?"
);

const FACULTY_PROFILES: &str = "\
SELECT name, email, position, department, university, research
FROM faculty
WHERE LOWER(name) LIKE ?
ORDER BY name
LIMIT ?";

const FACULTY_CITATIONS: &str = "\
SELECT f.name AS faculty, COUNT(DISTINCT p.id) AS publications,
       CAST(COALESCE(SUM(p.citations), 0) AS SIGNED) AS citations
FROM faculty f
LEFT JOIN publication_author pa ON f.id = pa.faculty_id
LEFT JOIN publication p ON pa.publication_id = p.id
WHERE LOWER(f.name) LIKE ?
GROUP BY f.id, f.name
ORDER BY citations DESC
LIMIT ?";

const PUBLICATIONS_PER_YEAR: &str = concat!(
    "\
SELECT CAST(p.year AS SIGNED) AS year, COUNT(*) AS publications
FROM publication p
WHERE p.year IS NOT NULL
  AND ",
    year_filter!(),
    "
GROUP BY p.year
ORDER BY p.year"
);

fn sql_for(statement: Statement) -> Option<&'static str> {
    let sql = match statement {
        Statement::PublicationsByKeyword => PUBLICATIONS_BY_KEYWORD,
        Statement::AllPublications => ALL_PUBLICATIONS,
        Statement::FacultyPublications => FACULTY_PUBLICATIONS,
        Statement::KeywordStats => KEYWORD_STATS,
        Statement::Universities => UNIVERSITIES,
        Statement::UniversityKeywords => UNIVERSITY_KEYWORDS,
        Statement::FacultyProfiles => FACULTY_PROFILES,
        Statement::FacultyCitations => FACULTY_CITATIONS,
        Statement::PublicationsPerYear => PUBLICATIONS_PER_YEAR,
        Statement::Collaborators => return None,
    };
    Some(sql)
}

fn bind_years(query: MySqlQuery, years: YearRange) -> MySqlQuery {
    query
        .bind(years.from)
        .bind(years.from)
        .bind(years.to)
        .bind(years.to)
}

fn bind_limit(query: MySqlQuery, limit: Option<u32>) -> MySqlQuery {
    query.bind(i64::from(limit.unwrap_or(u32::MAX)))
}

fn bind_repeated(query: MySqlQuery, value: &str, times: usize) -> MySqlQuery {
    (0..times).fold(query, |q, _| q.bind(value.to_string()))
}

/// Binds parameters in placeholder order.
fn prepare(spec: &QuerySpec, sql: &'static str) -> MySqlQuery {
    let query = sqlx::query(sql);
    match spec.statement() {
        Statement::PublicationsByKeyword => {
            let pattern = SearchPattern::like_contains(spec.keyword());
            let query = bind_repeated(query, &pattern, 4);
            bind_limit(bind_years(query, spec.years()), spec.limit())
        }
        Statement::KeywordStats => {
            let pattern = SearchPattern::like_contains(spec.keyword());
            bind_years(bind_repeated(query, &pattern, 3), spec.years())
        }
        Statement::AllPublications => bind_limit(bind_years(query, spec.years()), spec.limit()),
        Statement::FacultyPublications => {
            let query = query.bind(SearchPattern::like_name(spec.name()));
            bind_limit(bind_years(query, spec.years()), spec.limit())
        }
        Statement::UniversityKeywords => {
            let query = query.bind(spec.university().to_string());
            bind_limit(bind_years(query, spec.years()), spec.limit())
        }
        Statement::FacultyProfiles | Statement::FacultyCitations => {
            let query = query.bind(SearchPattern::like_name(spec.name()));
            bind_limit(query, spec.limit())
        }
        Statement::PublicationsPerYear => bind_years(query, spec.years()),
        Statement::Universities | Statement::Collaborators => query,
    }
}

pub(crate) async fn run(pool: &MySqlPool, spec: &QuerySpec) -> Result<Vec<Row>, BackendFailure> {
    let statement = spec.statement();
    let sql = sql_for(statement).ok_or_else(|| {
        BackendFailure::Malformed(format!("{} has no relational form", statement))
    })?;

    let rows = prepare(spec, sql).fetch_all(pool).await.map_err(classify)?;
    rows.iter()
        .map(|row| decode(row, statement.columns()))
        .collect()
}

fn decode(row: &MySqlRow, columns: &[(&str, ColumnType)]) -> Result<Row, BackendFailure> {
    build_row(columns, |name, ty| {
        let value = match ty {
            ColumnType::Int => Value::from(row.try_get::<Option<i64>, _>(name).map_err(classify)?),
            ColumnType::Float => Value::from(row.try_get::<Option<f64>, _>(name).map_err(classify)?),
            ColumnType::Text => {
                Value::from(row.try_get::<Option<String>, _>(name).map_err(classify)?)
            }
            ColumnType::Date => Value::from(
                row.try_get::<Option<chrono::NaiveDate>, _>(name)
                    .map_err(classify)?,
            ),
        };
        Ok(value)
    })
}

fn classify(err: sqlx::Error) -> BackendFailure {
    let message = err.to_string();
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => {
            BackendFailure::Connection(ConnectionError::classify(message))
        }
        sqlx::Error::Database(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => BackendFailure::Malformed(message),
        _ => BackendFailure::Other(message),
    }
}
