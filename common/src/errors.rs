//! Error taxonomy shared by all services.
//!
//! Connection and query failures are recoverable and normally end up as a
//! descriptive [`WidgetResult`](crate::models::WidgetResult). Persistence and
//! request validation failures surface to the caller through [`AppError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::BackendKind;
use crate::response::ApiResponse;

/// Failure to establish a backend connection.
///
/// Captured as handle state by the connection manager, never raised.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum ConnectionError {
    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),
}

impl ConnectionError {
    /// Classifies a driver error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        let auth_markers = ["auth", "access denied", "password", "unauthorized", "credential"];
        if auth_markers.iter().any(|marker| lowered.contains(marker)) {
            Self::AuthFailed(message)
        } else {
            Self::Unreachable(message)
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Unreachable(reason) | Self::AuthFailed(reason) => reason,
        }
    }
}

/// Failure of a single dispatched query.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("{kind} query timed out after {seconds}s")]
    Timeout { kind: BackendKind, seconds: u64 },

    #[error("malformed query: {0}")]
    Malformed(String),

    #[error("{kind} backend unavailable: {reason}")]
    BackendUnavailable { kind: BackendKind, reason: String },

    #[error("{kind} query failed: {message}")]
    Unknown { kind: BackendKind, message: String },
}

impl QueryError {
    /// Backend the failure is attributed to, if any.
    pub fn backend(&self) -> Option<BackendKind> {
        match self {
            Self::Timeout { kind, .. }
            | Self::BackendUnavailable { kind, .. }
            | Self::Unknown { kind, .. } => Some(*kind),
            Self::Malformed(_) => None,
        }
    }

    /// One-line description used in widget status strings.
    pub fn describe(&self) -> String {
        match self {
            Self::Timeout { kind, seconds } => {
                format!("{} query timed out after {}s", kind.label(), seconds)
            }
            Self::Malformed(reason) => format!("Invalid query: {}", reason),
            Self::BackendUnavailable { kind, reason } => {
                format!("{} unavailable: {}", kind.label(), reason)
            }
            Self::Unknown { kind, message } => format!("{} error: {}", kind.label(), message),
        }
    }
}

/// Failure of the saved-search workflow.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("saved search not found: {0}")]
    NotFound(String),

    #[error("failed to write saved search: {0}")]
    WriteFailed(String),

    #[error("document store unavailable: {0}")]
    Unavailable(String),

    #[error("saved search rejected: {0}")]
    Rejected(String),
}

/// Application-level error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Query(QueryError::Malformed(_)) => StatusCode::BAD_REQUEST,
            Self::Query(QueryError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Query(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(PersistenceError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Persistence(PersistenceError::Rejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Persistence(PersistenceError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Persistence(PersistenceError::WriteFailed(_)) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code carried in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Query(QueryError::Malformed(_)) => "VALIDATION_ERROR",
            Self::Query(_) => "QUERY_FAILED",
            Self::Persistence(PersistenceError::NotFound(_)) => "NOT_FOUND",
            Self::Persistence(PersistenceError::Rejected(_)) => "VALIDATION_ERROR",
            Self::Persistence(PersistenceError::Unavailable(_)) => "PERSISTENCE_UNAVAILABLE",
            Self::Persistence(PersistenceError::WriteFailed(_)) => "WRITE_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::err(self.code(), self.to_string());
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_failure() {
        let err = ConnectionError::classify("Access denied for user 'root'@'localhost'");
        assert!(matches!(err, ConnectionError::AuthFailed(_)));
    }

    #[test]
    fn test_classify_unreachable() {
        let err = ConnectionError::classify("Connection refused (os error 111)");
        assert_eq!(
            err,
            ConnectionError::Unreachable("Connection refused (os error 111)".to_string())
        );
    }

    #[test]
    fn test_persistence_not_found_maps_to_404() {
        let err = AppError::from(PersistenceError::NotFound("abc".into()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_unavailable_backend_is_described_by_label() {
        let err = QueryError::BackendUnavailable {
            kind: BackendKind::Graph,
            reason: "unreachable: connection refused".into(),
        };
        assert_eq!(err.backend(), Some(BackendKind::Graph));
        assert_eq!(
            err.describe(),
            "Neo4j unavailable: unreachable: connection refused"
        );
    }
}
