//! Search requests.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::query::YearRange;
use super::widget::SampleSize;

/// What the search text is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// Title, abstract, keywords and venue.
    Keyword,
    /// Faculty name, partial names allowed.
    Faculty,
}

impl std::fmt::Display for SearchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchKind::Keyword => write!(f, "keyword"),
            SearchKind::Faculty => write!(f, "faculty"),
        }
    }
}

/// Request body for a keyword or faculty search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct SearchRequest {
    pub kind: SearchKind,

    /// Keyword or faculty name.
    #[validate(length(min = 1, max = 200, message = "Query must be 1-200 characters"))]
    pub query: String,

    #[validate(custom(function = "crate::models::query::validate_year_range"))]
    #[serde(default)]
    pub years: YearRange,

    #[serde(default)]
    pub sample: SampleSize,
}

impl SearchRequest {
    pub fn keyword(query: impl Into<String>) -> Self {
        Self {
            kind: SearchKind::Keyword,
            query: query.into(),
            years: YearRange::default(),
            sample: SampleSize::default(),
        }
    }

    pub fn faculty(name: impl Into<String>) -> Self {
        Self {
            kind: SearchKind::Faculty,
            ..Self::keyword(name)
        }
    }

    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }

    pub fn with_sample(mut self, sample: SampleSize) -> Self {
        self.sample = sample;
        self
    }
}

/// Request body for the keyword comparison widget.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct KeywordComparisonRequest {
    /// Between two and five keywords.
    #[validate(length(min = 2, max = 5, message = "Compare between 2 and 5 keywords"))]
    pub keywords: Vec<String>,

    #[validate(custom(function = "crate::models::query::validate_year_range"))]
    #[serde(default)]
    pub years: YearRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults() {
        let req: SearchRequest =
            serde_json::from_str(r#"{"kind":"keyword","query":"machine learning"}"#).unwrap();
        assert_eq!(req.sample, SampleSize::Twenty);
        assert!(req.years.is_unbounded());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_inverted_years_fail_validation() {
        let req = SearchRequest::keyword("graphs").with_years(YearRange::between(2022, 2018));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_empty_query_fails_validation() {
        assert!(SearchRequest::faculty("").validate().is_err());
    }

    #[test]
    fn test_keyword_comparison_bounds() {
        let one = KeywordComparisonRequest {
            keywords: vec!["ai".into()],
            years: YearRange::default(),
        };
        assert!(one.validate().is_err());

        let three = KeywordComparisonRequest {
            keywords: vec!["ai".into(), "databases".into(), "graphs".into()],
            years: YearRange::default(),
        };
        assert!(three.validate().is_ok());
    }
}
