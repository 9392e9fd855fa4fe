//! Backend kinds, connection profiles and connection status models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The three data stores the dashboard reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// MySQL.
    #[serde(alias = "mysql")]
    Relational,
    /// Neo4j.
    #[serde(alias = "neo4j")]
    Graph,
    /// MongoDB.
    #[serde(alias = "mongodb")]
    Document,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Relational,
        BackendKind::Graph,
        BackendKind::Document,
    ];

    /// Product name shown in widget status lines.
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Relational => "MySQL",
            BackendKind::Graph => "Neo4j",
            BackendKind::Document => "MongoDB",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Relational => write!(f, "relational"),
            BackendKind::Graph => write!(f, "graph"),
            BackendKind::Document => write!(f, "document"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relational" | "mysql" => Ok(BackendKind::Relational),
            "graph" | "neo4j" => Ok(BackendKind::Graph),
            "document" | "mongodb" => Ok(BackendKind::Document),
            other => Err(format!("unknown backend kind: {}", other)),
        }
    }
}

/// Health of one backend as seen by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Status snapshot for one backend handle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionReport {
    pub kind: BackendKind,
    pub label: String,
    pub status: ConnectionStatus,
    /// Consecutive failed connect attempts.
    pub retry_count: u32,
    /// Time spent in the connect attempt, when one was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Password wrapper that never prints or serializes its content.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"***\"")
    }
}

/// MySQL connection profile.
#[derive(Debug, Clone)]
pub struct RelationalProfile {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Secret,
}

/// Neo4j connection profile.
#[derive(Debug, Clone)]
pub struct GraphProfile {
    pub uri: String,
    pub username: String,
    pub password: Secret,
    pub database: String,
}

/// MongoDB connection profile.
#[derive(Debug, Clone)]
pub struct DocumentProfile {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub auth_source: String,
}

impl DocumentProfile {
    /// Connection string without credentials; those are applied separately.
    pub fn uri(&self) -> String {
        format!("mongodb://{}:{}", self.host, self.port)
    }
}

/// One profile per backend kind, handed to the connection manager.
#[derive(Debug, Clone)]
pub struct BackendProfiles {
    pub relational: RelationalProfile,
    pub graph: GraphProfile,
    pub document: DocumentProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_accepts_product_names() {
        assert_eq!("MySQL".parse::<BackendKind>().unwrap(), BackendKind::Relational);
        assert_eq!("neo4j".parse::<BackendKind>().unwrap(), BackendKind::Graph);
        assert_eq!("document".parse::<BackendKind>().unwrap(), BackendKind::Document);
        assert!("redis".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_status_serializes_with_reason() {
        let json = serde_json::to_value(ConnectionStatus::Error("refused".into())).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["reason"], "refused");
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let profile = GraphProfile {
            uri: "bolt://localhost:7687".into(),
            username: "neo4j".into(),
            password: Secret::new("hunter2"),
            database: "neo4j".into(),
        };
        assert!(!format!("{:?}", profile).contains("hunter2"));
    }
}
