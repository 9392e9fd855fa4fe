//! Query dispatch.
//!
//! Executes a [`QuerySpec`] on its backend and maps the driver result into
//! [`Row`]s whose field names and order come from the statement's column
//! schema. User text is always bound as a parameter.

mod document;
mod graph;
mod relational;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use common::errors::{ConnectionError, QueryError};
use common::models::{BackendKind, ColumnType, QuerySpec, Row, Value};
use connection_service::{BackendClient, ConnectionManager};

/// Runs validated queries. The seam the widgets depend on.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, QueryError>;
}

/// Driver failure sorted by what the caller should do about it.
#[derive(Debug)]
pub(crate) enum BackendFailure {
    /// The connection itself is gone; the handle must be rebuilt.
    Connection(ConnectionError),
    Malformed(String),
    Other(String),
}

impl BackendFailure {
    /// Classifies from the message alone, for drivers whose errors carry no
    /// usable structure.
    pub(crate) fn from_message(message: String) -> Self {
        let lowered = message.to_lowercase();
        let connection_markers = [
            "connection",
            "broken pipe",
            "refused",
            "reset by peer",
            "io error",
            "timed out",
        ];
        if lowered.contains("unauthorized") || lowered.contains("authentication") {
            BackendFailure::Connection(ConnectionError::AuthFailed(message))
        } else if connection_markers.iter().any(|m| lowered.contains(m)) {
            BackendFailure::Connection(ConnectionError::Unreachable(message))
        } else if lowered.contains("syntax") || lowered.contains("invalid input") {
            BackendFailure::Malformed(message)
        } else {
            BackendFailure::Other(message)
        }
    }
}

/// Builds a row in schema order from a per-column lookup.
pub(crate) fn build_row<F>(columns: &[(&str, ColumnType)], mut read: F) -> Result<Row, BackendFailure>
where
    F: FnMut(&str, ColumnType) -> Result<Value, BackendFailure>,
{
    let mut values = Vec::with_capacity(columns.len());
    for (name, ty) in columns {
        values.push(read(name, *ty)?);
    }
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    Ok(Row::from_columns(&names, values))
}

/// Dispatches queries through the connection manager.
pub struct Dispatcher {
    connections: Arc<ConnectionManager>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(connections: Arc<ConnectionManager>, timeout: Duration) -> Self {
        Self {
            connections,
            timeout,
        }
    }

    async fn run(client: BackendClient, spec: &QuerySpec) -> Result<Vec<Row>, BackendFailure> {
        match client {
            BackendClient::Relational(pool) => relational::run(&pool, spec).await,
            BackendClient::Graph(graph) => graph::run(&graph, spec).await,
            BackendClient::Document(database) => document::run(&database, spec).await,
        }
    }
}

#[async_trait]
impl QueryExecutor for Dispatcher {
    async fn execute(&self, spec: &QuerySpec) -> Result<Vec<Row>, QueryError> {
        let kind = spec.kind();
        let handle = self.connections.acquire(kind).await;
        let Some(client) = handle.client().cloned() else {
            let reason = handle
                .last_error()
                .map(ToString::to_string)
                .unwrap_or_else(|| "not connected".to_string());
            return Err(QueryError::BackendUnavailable { kind, reason });
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, Self::run(client, spec)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(rows)) => {
                tracing::debug!(kind = %kind, statement = %spec.statement(), rows = rows.len(), elapsed_ms, "query finished");
                Ok(rows)
            }
            Ok(Err(BackendFailure::Connection(error))) => {
                let reason = error.to_string();
                self.connections.mark_failed(kind, error).await;
                Err(QueryError::BackendUnavailable { kind, reason })
            }
            Ok(Err(BackendFailure::Malformed(message))) => {
                tracing::warn!(kind = %kind, statement = %spec.statement(), error = %message, "query rejected by backend");
                Err(QueryError::Malformed(message))
            }
            Ok(Err(BackendFailure::Other(message))) => {
                tracing::warn!(kind = %kind, statement = %spec.statement(), error = %message, "query failed");
                Err(QueryError::Unknown { kind, message })
            }
            Err(_) => {
                tracing::warn!(kind = %kind, statement = %spec.statement(), elapsed_ms, "query timed out");
                Err(QueryError::Timeout {
                    kind,
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}
