//! Shared data models for all services.

pub mod connection;
pub mod query;
pub mod row;
pub mod saved_search;
pub mod search;
pub mod widget;

pub use connection::{
    BackendKind, BackendProfiles, ConnectionReport, ConnectionStatus, DocumentProfile,
    GraphProfile, RelationalProfile, Secret,
};
pub use query::{ColumnType, QueryParams, QuerySpec, Statement, YearRange};
pub use row::{Row, Value};
pub use saved_search::{SaveSearchRequest, SavedSearchDocument, SavedSearchSummary};
pub use search::{KeywordComparisonRequest, SearchKind, SearchRequest};
pub use widget::{ConflictPolicy, SampleRequest, SampleSize, WidgetOutcome, WidgetResult};
