//! Service configuration loaded from environment variables.
//!
//! Binaries call [`load_dotenv`] before anything else; variables already set
//! in the environment win over the `.env` file.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::{
    BackendProfiles, ConflictPolicy, DocumentProfile, GraphProfile, RelationalProfile, Secret,
};

/// Runtime configuration shared by the services.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
    /// Pool size per backend handle.
    pub max_connections: u32,
    pub conflict_policy: ConflictPolicy,
    pub saved_search_collection: String,
    pub backends: BackendProfiles,
}

impl AppConfig {
    /// Loads the configuration for a named service.
    ///
    /// `SERVER_PORT` falls back to the service's well-known port.
    pub fn load_with_service(service_name: &str) -> Self {
        let default_port = match service_name {
            "connection-service" => 8081,
            "query-service" => 8082,
            _ => 8080,
        };

        let conflict_policy = match env::var("CONFLICT_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|err: String| {
                tracing::warn!(error = %err, "falling back to prefer_larger");
                ConflictPolicy::default()
            }),
            Err(_) => ConflictPolicy::default(),
        };

        Self {
            service_name: service_name.to_string(),
            host: env_or("SERVER_HOST", "0.0.0.0"),
            port: env_parse("SERVER_PORT", default_port),
            connect_timeout_secs: env_parse("CONNECT_TIMEOUT_SECS", 5),
            query_timeout_secs: env_parse("QUERY_TIMEOUT_SECS", 10),
            max_connections: env_parse("MAX_CONNECTIONS", 5),
            conflict_policy,
            saved_search_collection: env_or("SAVED_SEARCH_COLLECTION", "saved_searches"),
            backends: BackendProfiles::from_env(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl BackendProfiles {
    pub fn from_env() -> Self {
        let mongo_user = env::var("MONGODB_USERNAME").ok().filter(|v| !v.is_empty());
        let mongo_password = env::var("MONGODB_PASSWORD")
            .ok()
            .filter(|v| !v.is_empty())
            .map(Secret::new);

        Self {
            relational: RelationalProfile {
                host: env_or("MYSQL_HOST", "localhost"),
                port: env_parse("MYSQL_PORT", 3306),
                database: env_or("MYSQL_DATABASE", "academicworld"),
                username: env_or("MYSQL_USER", "root"),
                password: Secret::new(env_or("MYSQL_PASSWORD", "")),
            },
            graph: GraphProfile {
                uri: env_or("NEO4J_URI", "bolt://localhost:7687"),
                username: env_or("NEO4J_USERNAME", "neo4j"),
                password: Secret::new(env_or("NEO4J_PASSWORD", "")),
                database: env_or("NEO4J_DATABASE", "neo4j"),
            },
            document: DocumentProfile {
                host: env_or("MONGODB_HOST", "localhost"),
                port: env_parse("MONGODB_PORT", 27017),
                database: env_or("MONGODB_DATABASE", "academicworld"),
                username: mongo_user,
                password: mongo_password,
                auth_source: env_or("MONGODB_AUTH_SOURCE", "admin"),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable value");
            default
        }),
        Err(_) => default,
    }
}

/// Applies `KEY=VALUE` lines from `.env` without overriding set variables.
pub fn load_dotenv() {
    let Ok(content) = std::fs::read_to_string(".env") else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if env::var_os(&key).is_none() {
            env::set_var(key, value);
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
