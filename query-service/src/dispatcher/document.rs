//! MongoDB statements, expressed as aggregation pipelines.
//!
//! Collections: `publications` (`authors` is an array of names) and `faculty`
//! (`research_areas` is an array of strings).

use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;

use common::errors::ConnectionError;
use common::models::{ColumnType, QuerySpec, Row, Statement, Value, YearRange};
use common::utils::SearchPattern;

use super::{build_row, BackendFailure};

const PUBLICATIONS: &str = "publications";
const FACULTY: &str = "faculty";

fn case_insensitive(pattern: String) -> Document {
    doc! { "$regex": pattern, "$options": "i" }
}

fn year_bounds(years: YearRange) -> Option<Document> {
    let mut bounds = Document::new();
    if let Some(from) = years.from {
        bounds.insert("$gte", from);
    }
    if let Some(to) = years.to {
        bounds.insert("$lte", to);
    }
    (!bounds.is_empty()).then_some(bounds)
}

fn with_years(mut filter: Document, years: YearRange) -> Document {
    if let Some(bounds) = year_bounds(years) {
        filter.insert("year", bounds);
    }
    filter
}

fn push_limit(pipeline: &mut Vec<Document>, limit: Option<u32>) {
    if let Some(limit) = limit {
        pipeline.push(doc! { "$limit": i64::from(limit) });
    }
}

/// Collection and pipeline for a statement, or `None` when the document
/// store does not carry the data.
fn pipeline_for(spec: &QuerySpec) -> Option<(&'static str, Vec<Document>)> {
    let statement = spec.statement();
    let mut pipeline = Vec::new();
    let collection = match statement {
        Statement::PublicationsByKeyword => {
            let re = case_insensitive(SearchPattern::regex_contains(spec.keyword()));
            let filter = doc! {
                "$or": [
                    { "title": re.clone() },
                    { "abstract": re.clone() },
                    { "keywords": re.clone() },
                    { "venue": re },
                ]
            };
            pipeline.push(doc! { "$match": with_years(filter, spec.years()) });
            pipeline.push(doc! { "$sort": { "citations": -1, "year": -1 } });
            push_limit(&mut pipeline, spec.limit());
            pipeline.push(doc! {
                "$project": {
                    "_id": 0,
                    "title": 1,
                    "year": 1,
                    "venue": 1,
                    "citations": { "$ifNull": ["$citations", 0] },
                    "authors": 1,
                }
            });
            PUBLICATIONS
        }
        Statement::FacultyProfiles => {
            let re = case_insensitive(SearchPattern::regex_name(spec.name()));
            pipeline.push(doc! { "$match": { "name": re } });
            pipeline.push(doc! { "$sort": { "name": 1 } });
            push_limit(&mut pipeline, spec.limit());
            pipeline.push(doc! {
                "$project": {
                    "_id": 0,
                    "name": 1,
                    "email": 1,
                    "position": 1,
                    "department": 1,
                    "university": 1,
                    "research": "$research_areas",
                }
            });
            FACULTY
        }
        Statement::FacultyCitations => {
            let re = case_insensitive(SearchPattern::regex_name(spec.name()));
            pipeline.push(doc! { "$unwind": "$authors" });
            pipeline.push(doc! { "$match": { "authors": re } });
            pipeline.push(doc! {
                "$group": {
                    "_id": "$authors",
                    "publications": { "$sum": 1 },
                    "citations": { "$sum": { "$ifNull": ["$citations", 0] } },
                }
            });
            pipeline.push(doc! {
                "$project": { "_id": 0, "faculty": "$_id", "publications": 1, "citations": 1 }
            });
            pipeline.push(doc! { "$sort": { "citations": -1 } });
            push_limit(&mut pipeline, spec.limit());
            PUBLICATIONS
        }
        Statement::PublicationsPerYear => {
            // Range bounds never match null, so the null check is only needed alone.
            let filter = match year_bounds(spec.years()) {
                Some(bounds) => doc! { "year": bounds },
                None => doc! { "year": { "$ne": Bson::Null } },
            };
            pipeline.push(doc! { "$match": filter });
            pipeline.push(doc! { "$group": { "_id": "$year", "publications": { "$sum": 1 } } });
            pipeline.push(doc! { "$project": { "_id": 0, "year": "$_id", "publications": 1 } });
            pipeline.push(doc! { "$sort": { "year": 1 } });
            PUBLICATIONS
        }
        Statement::AllPublications
        | Statement::FacultyPublications
        | Statement::KeywordStats
        | Statement::Universities
        | Statement::UniversityKeywords
        | Statement::Collaborators => return None,
    };
    Some((collection, pipeline))
}

pub(crate) async fn run(
    database: &mongodb::Database,
    spec: &QuerySpec,
) -> Result<Vec<Row>, BackendFailure> {
    let statement = spec.statement();
    let (collection, pipeline) = pipeline_for(spec)
        .ok_or_else(|| BackendFailure::Malformed(format!("{} has no document form", statement)))?;

    let mut cursor = database
        .collection::<Document>(collection)
        .aggregate(pipeline)
        .await
        .map_err(classify)?;

    let mut rows = Vec::new();
    while cursor.advance().await.map_err(classify)? {
        let document = cursor.deserialize_current().map_err(classify)?;
        rows.push(decode(&document, statement.columns())?);
    }
    Ok(rows)
}

fn decode(document: &Document, columns: &[(&str, ColumnType)]) -> Result<Row, BackendFailure> {
    build_row(columns, |name, ty| {
        Ok(document.get(name).map_or(Value::Null, |bson| {
            let value = convert(bson, ty);
            if value.is_null() && !matches!(bson, Bson::Null) {
                tracing::debug!(
                    column = name,
                    expected = ?ty,
                    found = ?bson.element_type(),
                    "unreadable document field, using null"
                );
            }
            value
        }))
    })
}

/// Converts a BSON field into the column's scalar type. Arrays of strings
/// become comma-separated text; anything unconvertible is Null.
fn convert(bson: &Bson, ty: ColumnType) -> Value {
    match (ty, bson) {
        (_, Bson::Null) => Value::Null,
        (ColumnType::Int, Bson::Int32(v)) => Value::Int(i64::from(*v)),
        (ColumnType::Int, Bson::Int64(v)) => Value::Int(*v),
        // Counts written by JavaScript tooling arrive as doubles.
        (ColumnType::Int, Bson::Double(v)) => Value::Int(v.round() as i64),
        (ColumnType::Int, Bson::String(v)) => v.trim().parse().map_or(Value::Null, Value::Int),
        (ColumnType::Float, Bson::Double(v)) => Value::Float(*v),
        (ColumnType::Float, Bson::Int32(v)) => Value::Float(f64::from(*v)),
        (ColumnType::Float, Bson::Int64(v)) => Value::Float(*v as f64),
        (ColumnType::Text, Bson::String(v)) => Value::Text(v.clone()),
        (ColumnType::Text, Bson::Array(items)) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Bson::String(s) => Some(s.clone()),
                    Bson::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            Value::Text(parts.join(", "))
        }
        (ColumnType::Text, Bson::Int32(v)) => Value::Text(v.to_string()),
        (ColumnType::Text, Bson::Int64(v)) => Value::Text(v.to_string()),
        (ColumnType::Date, Bson::DateTime(v)) => {
            chrono::DateTime::from_timestamp_millis(v.timestamp_millis())
                .map_or(Value::Null, |dt| Value::Date(dt.date_naive()))
        }
        (ColumnType::Date, Bson::String(v)) => chrono::NaiveDate::parse_from_str(v, "%Y-%m-%d")
            .map_or(Value::Null, Value::Date),
        _ => Value::Null,
    }
}

fn classify(err: mongodb::error::Error) -> BackendFailure {
    let message = err.to_string();
    match err.kind.as_ref() {
        ErrorKind::Authentication { .. } => {
            BackendFailure::Connection(ConnectionError::AuthFailed(message))
        }
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => {
            BackendFailure::Connection(ConnectionError::Unreachable(message))
        }
        ErrorKind::InvalidArgument { .. }
        | ErrorKind::BsonDeserialization(_)
        | ErrorKind::BsonSerialization(_) => BackendFailure::Malformed(message),
        _ => BackendFailure::from_message(message),
    }
}
