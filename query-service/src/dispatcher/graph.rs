//! Neo4j statements.
//!
//! Model: `(:Person {name, email, position, department, university, research})
//! -[:AUTHORED]->(:Publication {title, year, venue, citations, abstract, keywords})`.

use neo4rs::{query, Graph, Query};

use common::models::{ColumnType, QuerySpec, Row, Statement, Value};
use common::utils::SearchPattern;

use super::{build_row, BackendFailure};

const YEAR_FILTER: &str =
    "(NOT $has_from OR pub.year >= $from) AND (NOT $has_to OR pub.year <= $to)";

const AUTHOR_LIST: &str =
    "reduce(s = '', n IN names | CASE s WHEN '' THEN n ELSE s + ', ' + n END)";

fn publications_by_keyword() -> String {
    format!(
        "MATCH (pub:Publication)
WHERE (toLower(coalesce(pub.title, '')) CONTAINS $keyword
       OR toLower(coalesce(pub.abstract, '')) CONTAINS $keyword
       OR toLower(coalesce(pub.keywords, '')) CONTAINS $keyword
       OR toLower(coalesce(pub.venue, '')) CONTAINS $keyword)
  AND {YEAR_FILTER}
OPTIONAL MATCH (a:Person)-[:AUTHORED]->(pub)
WITH pub, collect(DISTINCT a.name) AS names
RETURN pub.title AS title, pub.year AS year, pub.venue AS venue,
       coalesce(pub.citations, 0) AS citations, {AUTHOR_LIST} AS authors
ORDER BY citations DESC, year DESC
LIMIT $limit"
    )
}

fn faculty_publications() -> String {
    format!(
        "MATCH (p:Person)-[:AUTHORED]->(pub:Publication)
WHERE p.name =~ $name_pattern AND {YEAR_FILTER}
RETURN pub.title AS title, pub.year AS year, pub.venue AS venue,
       coalesce(pub.citations, 0) AS citations, p.name AS faculty_name,
       p.university AS university, p.department AS department
ORDER BY year DESC, citations DESC
LIMIT $limit"
    )
}

const FACULTY_PROFILES: &str = "\
MATCH (p:Person)
WHERE p.name =~ $name_pattern
RETURN p.name AS name, p.email AS email, p.position AS position,
       p.department AS department, p.university AS university, p.research AS research
ORDER BY name
LIMIT $limit";

const FACULTY_CITATIONS: &str = "\
MATCH (p:Person)
WHERE p.name =~ $name_pattern
OPTIONAL MATCH (p)-[:AUTHORED]->(pub:Publication)
RETURN p.name AS faculty, count(DISTINCT pub) AS publications,
       sum(coalesce(pub.citations, 0)) AS citations
ORDER BY citations DESC
LIMIT $limit";

const COLLABORATORS: &str = "\
MATCH (p1:Person)-[:AUTHORED]->(pub:Publication)<-[:AUTHORED]-(p2:Person)
WHERE p1.name =~ $name_pattern AND p1 <> p2
RETURN p2.name AS collaborator, count(DISTINCT pub) AS joint_publications
ORDER BY joint_publications DESC, collaborator
LIMIT $limit";

fn publications_per_year() -> String {
    format!(
        "MATCH (pub:Publication)
WHERE pub.year IS NOT NULL AND {YEAR_FILTER}
RETURN pub.year AS year, count(pub) AS publications
ORDER BY year"
    )
}

fn cypher_for(statement: Statement) -> Option<String> {
    let text = match statement {
        Statement::PublicationsByKeyword => publications_by_keyword(),
        Statement::FacultyPublications => faculty_publications(),
        Statement::FacultyProfiles => FACULTY_PROFILES.to_string(),
        Statement::FacultyCitations => FACULTY_CITATIONS.to_string(),
        Statement::Collaborators => COLLABORATORS.to_string(),
        Statement::PublicationsPerYear => publications_per_year(),
        Statement::AllPublications
        | Statement::KeywordStats
        | Statement::Universities
        | Statement::UniversityKeywords => return None,
    };
    Some(text)
}

/// Attaches every parameter the statement text references.
fn prepare(spec: &QuerySpec, text: &str) -> Query {
    let years = spec.years();
    let mut q = query(text);
    if text.contains("$keyword") {
        q = q.param("keyword", spec.keyword().to_lowercase());
    }
    if text.contains("$name_pattern") {
        q = q.param("name_pattern", SearchPattern::cypher_name(spec.name()));
    }
    if text.contains("$has_from") {
        q = q
            .param("has_from", years.from.is_some())
            .param("from", i64::from(years.from.unwrap_or_default()))
            .param("has_to", years.to.is_some())
            .param("to", i64::from(years.to.unwrap_or_default()));
    }
    if text.contains("$limit") {
        q = q.param("limit", spec.limit().map(i64::from).unwrap_or(i64::MAX));
    }
    q
}

pub(crate) async fn run(graph: &Graph, spec: &QuerySpec) -> Result<Vec<Row>, BackendFailure> {
    let statement = spec.statement();
    let text = cypher_for(statement)
        .ok_or_else(|| BackendFailure::Malformed(format!("{} has no graph form", statement)))?;

    let mut stream = graph.execute(prepare(spec, &text)).await.map_err(classify)?;
    let mut rows = Vec::new();
    while let Some(row) = stream.next().await.map_err(classify)? {
        rows.push(decode(&row, statement.columns())?);
    }
    Ok(rows)
}

fn decode(row: &neo4rs::Row, columns: &[(&str, ColumnType)]) -> Result<Row, BackendFailure> {
    // Absent or null properties come back as decode errors and read as Null.
    build_row(columns, |name, ty| {
        let value = match ty {
            // Cypher arithmetic such as avg() yields floats for whole counts.
            ColumnType::Int => row
                .get::<i64>(name)
                .map(Value::Int)
                .or_else(|_| row.get::<f64>(name).map(|v| Value::Int(v.round() as i64))),
            ColumnType::Float => row
                .get::<f64>(name)
                .map(Value::Float)
                .or_else(|_| row.get::<i64>(name).map(|v| Value::Float(v as f64))),
            ColumnType::Text => row
                .get::<String>(name)
                .map(Value::Text)
                .or_else(|_| row.get::<Vec<String>>(name).map(|v| Value::Text(v.join(", ")))),
            ColumnType::Date => row.get::<String>(name).map(|v| {
                chrono::NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                    .map_or(Value::Null, Value::Date)
            }),
        };
        Ok(value.unwrap_or_else(|err| {
            tracing::debug!(
                column = name,
                expected = ?ty,
                error = %err,
                "unreadable graph value, using null"
            );
            Value::Null
        }))
    })
}

fn classify(err: neo4rs::Error) -> BackendFailure {
    BackendFailure::from_message(err.to_string())
}
