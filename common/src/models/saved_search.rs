//! Saved search documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::row::Row;
use super::search::{SearchKind, SearchRequest};

/// A persisted, annotated snapshot of search results.
///
/// Stored one per document as `{id, kind, parameters, rows, note, createdAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearchDocument {
    pub id: String,
    pub kind: SearchKind,
    pub parameters: SearchRequest,
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SavedSearchDocument {
    pub fn summary(&self) -> SavedSearchSummary {
        SavedSearchSummary {
            id: self.id.clone(),
            kind: self.kind,
            query: self.parameters.query.clone(),
            note: self.note.clone(),
            row_count: self.rows.len(),
            created_at: self.created_at,
        }
    }
}

/// List entry for a saved search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearchSummary {
    pub id: String,
    pub kind: SearchKind,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub row_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Request body for saving a search.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SaveSearchRequest {
    #[validate(nested)]
    pub parameters: SearchRequest,

    /// Rows to keep, usually the currently displayed sample.
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<Row>,

    #[validate(length(max = 2000, message = "Note must be at most 2000 characters"))]
    #[serde(default)]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::query::YearRange;

    #[test]
    fn test_document_uses_camel_case_timestamp() {
        let doc = SavedSearchDocument {
            id: "6b1f".into(),
            kind: SearchKind::Keyword,
            parameters: SearchRequest::keyword("graphs").with_years(YearRange::between(2019, 2020)),
            rows: vec![Row::new().with("title", "Graph Mining")],
            note: Some("for the survey".into()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["kind"], "keyword");
        assert_eq!(json["parameters"]["years"]["from"], 2019);

        let summary = doc.summary();
        assert_eq!(summary.row_count, 1);
        assert_eq!(summary.query, "graphs");
    }
}
