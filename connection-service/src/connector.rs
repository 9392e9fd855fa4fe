//! Driver-level connect logic for each backend kind.
//!
//! Every backend handle is a small driver-managed pool, so concurrent queries
//! never share one wire connection.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Credential};
use neo4rs::{query, ConfigBuilder, Graph};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::MySqlPool;

use common::config::AppConfig;
use common::errors::ConnectionError;
use common::models::{BackendKind, BackendProfiles};

/// Live client for one backend.
#[derive(Clone)]
pub enum BackendClient {
    /// MySQL connection pool.
    Relational(MySqlPool),
    /// Neo4j pooled graph client.
    Graph(Graph),
    /// MongoDB database handle backed by the client pool.
    Document(mongodb::Database),
}

impl BackendClient {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendClient::Relational(_) => BackendKind::Relational,
            BackendClient::Graph(_) => BackendKind::Graph,
            BackendClient::Document(_) => BackendKind::Document,
        }
    }

    /// False once the underlying pool has been closed.
    pub fn is_open(&self) -> bool {
        match self {
            BackendClient::Relational(pool) => !pool.is_closed(),
            BackendClient::Graph(_) | BackendClient::Document(_) => true,
        }
    }

    /// Closes the pool. Graph and document pools close when the last clone
    /// is dropped.
    pub async fn close(&self) {
        if let BackendClient::Relational(pool) = self {
            pool.close().await;
        }
    }
}

/// Opens a client for a backend kind.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, kind: BackendKind) -> Result<BackendClient, ConnectionError>;
}

/// Connects with the real drivers using the configured profiles.
pub struct DriverConnector {
    profiles: BackendProfiles,
    timeout: Duration,
    max_connections: u32,
}

impl DriverConnector {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            profiles: config.backends.clone(),
            timeout: config.connect_timeout(),
            max_connections: config.max_connections,
        }
    }

    async fn connect_relational(&self) -> Result<BackendClient, ConnectionError> {
        let profile = &self.profiles.relational;
        let options = MySqlConnectOptions::new()
            .host(&profile.host)
            .port(profile.port)
            .username(&profile.username)
            .password(profile.password.expose())
            .database(&profile.database);

        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.timeout)
            .connect_with(options)
            .await
            .map_err(|e| ConnectionError::classify(e.to_string()))?;
        Ok(BackendClient::Relational(pool))
    }

    async fn connect_graph(&self) -> Result<BackendClient, ConnectionError> {
        let profile = &self.profiles.graph;
        let config = ConfigBuilder::default()
            .uri(profile.uri.as_str())
            .user(profile.username.as_str())
            .password(profile.password.expose())
            .db(profile.database.as_str())
            .max_connections(self.max_connections as usize)
            .build()
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?;

        let graph = Graph::connect(config)
            .await
            .map_err(|e| ConnectionError::classify(e.to_string()))?;
        // The pool is lazy; a round trip proves reachability and credentials.
        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| ConnectionError::classify(e.to_string()))?;
        Ok(BackendClient::Graph(graph))
    }

    async fn connect_document(&self) -> Result<BackendClient, ConnectionError> {
        let profile = &self.profiles.document;
        let mut options = ClientOptions::parse(profile.uri())
            .await
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?;
        options.app_name = Some("academic-dashboard".to_string());
        options.connect_timeout = Some(self.timeout);
        options.server_selection_timeout = Some(self.timeout);
        options.max_pool_size = Some(self.max_connections);

        if let (Some(username), Some(password)) = (&profile.username, &profile.password) {
            let mut credential = Credential::default();
            credential.username = Some(username.clone());
            credential.password = Some(password.expose().to_string());
            credential.source = Some(profile.auth_source.clone());
            options.credential = Some(credential);
        }

        let client = mongodb::Client::with_options(options)
            .map_err(|e| ConnectionError::Unreachable(e.to_string()))?;
        let database = client.database(&profile.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ConnectionError::classify(e.to_string()))?;
        Ok(BackendClient::Document(database))
    }
}

#[async_trait]
impl Connector for DriverConnector {
    async fn connect(&self, kind: BackendKind) -> Result<BackendClient, ConnectionError> {
        match kind {
            BackendKind::Relational => self.connect_relational().await,
            BackendKind::Graph => self.connect_graph().await,
            BackendKind::Document => self.connect_document().await,
        }
    }
}
