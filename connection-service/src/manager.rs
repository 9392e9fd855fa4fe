//! Connection manager.
//!
//! Owns one handle per backend kind. Handles are created lazily on first
//! `acquire`, reconnected after a failure, and torn down on `reset` or
//! `shutdown`. Connect failures are recorded as handle state and never
//! returned as errors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use common::config::AppConfig;
use common::errors::ConnectionError;
use common::models::{BackendKind, ConnectionReport, ConnectionStatus};

use crate::connector::{BackendClient, Connector, DriverConnector};

/// Lifecycle state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Live,
    Closed,
    Failed,
}

/// Snapshot of one backend connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    kind: BackendKind,
    state: HandleState,
    last_error: Option<ConnectionError>,
    retry_count: u32,
    client: Option<BackendClient>,
}

impl ConnectionHandle {
    fn closed(kind: BackendKind) -> Self {
        Self {
            kind,
            state: HandleState::Closed,
            last_error: None,
            retry_count: 0,
            client: None,
        }
    }

    fn live(client: BackendClient) -> Self {
        Self {
            kind: client.kind(),
            state: HandleState::Live,
            last_error: None,
            retry_count: 0,
            client: Some(client),
        }
    }

    fn failed(kind: BackendKind, error: ConnectionError, retry_count: u32) -> Self {
        Self {
            kind,
            state: HandleState::Failed,
            last_error: Some(error),
            retry_count,
            client: None,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// True when the handle carries an open client.
    pub fn is_live(&self) -> bool {
        self.state == HandleState::Live && self.client.as_ref().is_some_and(BackendClient::is_open)
    }

    pub fn client(&self) -> Option<&BackendClient> {
        self.client.as_ref().filter(|_| self.state == HandleState::Live)
    }

    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    /// Consecutive failed connect attempts.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn status(&self) -> ConnectionStatus {
        match (self.state, &self.last_error) {
            (HandleState::Live, _) if self.is_live() => ConnectionStatus::Connected,
            (HandleState::Failed, Some(err)) => ConnectionStatus::Error(err.to_string()),
            _ => ConnectionStatus::Disconnected,
        }
    }

    pub fn report(&self, latency_ms: Option<u64>) -> ConnectionReport {
        ConnectionReport {
            kind: self.kind,
            label: self.kind.label().to_string(),
            status: self.status(),
            retry_count: self.retry_count,
            latency_ms,
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("last_error", &self.last_error)
            .field("retry_count", &self.retry_count)
            .field("has_client", &self.client.is_some())
            .finish()
    }
}

/// Process-wide owner of the backend handles.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
    handles: RwLock<HashMap<BackendKind, ConnectionHandle>>,
    /// Serializes connect attempts per kind.
    connect_locks: HashMap<BackendKind, Mutex<()>>,
}

impl ConnectionManager {
    /// Manager backed by the real drivers.
    pub fn new(config: &AppConfig) -> Self {
        Self::with_connector(
            Arc::new(DriverConnector::new(config)),
            config.connect_timeout(),
        )
    }

    pub fn with_connector(connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            handles: RwLock::new(HashMap::new()),
            connect_locks: BackendKind::ALL
                .into_iter()
                .map(|kind| (kind, Mutex::new(())))
                .collect(),
        }
    }

    /// Returns the live handle for `kind`, or makes exactly one connect
    /// attempt. A failed attempt yields a handle in the `Failed` state.
    pub async fn acquire(&self, kind: BackendKind) -> ConnectionHandle {
        if let Some(handle) = self.live_handle(kind).await {
            return handle;
        }

        let _guard = self.connect_locks[&kind].lock().await;

        // Another task may have connected while we waited.
        if let Some(handle) = self.live_handle(kind).await {
            return handle;
        }

        let previous_retries = self
            .handles
            .read()
            .await
            .get(&kind)
            .filter(|h| h.state == HandleState::Failed)
            .map_or(0, ConnectionHandle::retry_count);

        let started = Instant::now();
        let attempt = tokio::time::timeout(self.connect_timeout, self.connector.connect(kind)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let handle = match attempt {
            Ok(Ok(client)) => {
                tracing::info!(kind = %kind, elapsed_ms, "backend connected");
                ConnectionHandle::live(client)
            }
            Ok(Err(error)) => {
                tracing::warn!(kind = %kind, error = %error, retries = previous_retries + 1, "backend connect failed");
                ConnectionHandle::failed(kind, error, previous_retries + 1)
            }
            Err(_) => {
                let error = ConnectionError::Unreachable(format!(
                    "connect timed out after {}s",
                    self.connect_timeout.as_secs_f32()
                ));
                tracing::warn!(kind = %kind, error = %error, retries = previous_retries + 1, "backend connect timed out");
                ConnectionHandle::failed(kind, error, previous_retries + 1)
            }
        };

        self.handles.write().await.insert(kind, handle.clone());
        handle
    }

    async fn live_handle(&self, kind: BackendKind) -> Option<ConnectionHandle> {
        self.handles
            .read()
            .await
            .get(&kind)
            .filter(|handle| handle.is_live())
            .cloned()
    }

    /// Current handle snapshot without connecting.
    pub async fn handle(&self, kind: BackendKind) -> ConnectionHandle {
        self.handles
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ConnectionHandle::closed(kind))
    }

    /// Connection status without side effects.
    pub async fn status(&self, kind: BackendKind) -> ConnectionStatus {
        self.handle(kind).await.status()
    }

    pub async fn status_all(&self) -> Vec<ConnectionReport> {
        let handles = self.handles.read().await;
        BackendKind::ALL
            .into_iter()
            .map(|kind| {
                handles
                    .get(&kind)
                    .cloned()
                    .unwrap_or_else(|| ConnectionHandle::closed(kind))
                    .report(None)
            })
            .collect()
    }

    /// Records that a query found the connection dead; the next `acquire`
    /// reconnects.
    pub async fn mark_failed(&self, kind: BackendKind, error: ConnectionError) {
        let mut handles = self.handles.write().await;
        let retry_count = handles.get(&kind).map_or(0, ConnectionHandle::retry_count);
        tracing::warn!(kind = %kind, error = %error, "backend marked failed");
        handles.insert(kind, ConnectionHandle::failed(kind, error, retry_count));
    }

    /// Tears down the handle for `kind`. Returns false if there was none.
    pub async fn reset(&self, kind: BackendKind) -> bool {
        let removed = self.handles.write().await.remove(&kind);
        match removed {
            Some(handle) => {
                if let Some(client) = &handle.client {
                    client.close().await;
                }
                tracing::info!(kind = %kind, "backend handle reset");
                true
            }
            None => false,
        }
    }

    /// Connects every backend concurrently. Failures are logged, not fatal.
    pub async fn connect_all(&self) -> Vec<ConnectionReport> {
        let (relational, graph, document) = tokio::join!(
            self.acquire(BackendKind::Relational),
            self.acquire(BackendKind::Graph),
            self.acquire(BackendKind::Document),
        );
        [relational, graph, document]
            .iter()
            .map(|handle| handle.report(None))
            .collect()
    }

    pub async fn shutdown(&self) {
        for kind in BackendKind::ALL {
            self.reset(kind).await;
        }
        tracing::info!("all backend handles closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails every attempt with a fixed error.
    struct FailingConnector {
        attempts: AtomicU32,
        error: ConnectionError,
    }

    impl FailingConnector {
        fn new(error: ConnectionError) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicU32::new(0),
                error,
            })
        }
    }

    #[async_trait]
    impl Connector for FailingConnector {
        async fn connect(&self, _kind: BackendKind) -> Result<BackendClient, ConnectionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    /// Hands out lazily connecting MySQL pools after an optional delay.
    struct LazyConnector {
        attempts: AtomicU32,
        delay: Duration,
    }

    impl LazyConnector {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicU32::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl Connector for LazyConnector {
        async fn connect(&self, _kind: BackendKind) -> Result<BackendClient, ConnectionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let options = MySqlConnectOptions::new().host("127.0.0.1").port(1);
            Ok(BackendClient::Relational(
                MySqlPoolOptions::new().connect_lazy_with(options),
            ))
        }
    }

    fn manager(connector: Arc<dyn Connector>) -> ConnectionManager {
        ConnectionManager::with_connector(connector, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_failed_connect_is_state_not_error() {
        let connector = FailingConnector::new(ConnectionError::Unreachable("refused".into()));
        let manager = manager(connector.clone());

        let handle = manager.acquire(BackendKind::Graph).await;
        assert!(!handle.is_live());
        assert_eq!(handle.state(), HandleState::Failed);
        assert_eq!(handle.retry_count(), 1);
        assert_eq!(
            manager.status(BackendKind::Graph).await,
            ConnectionStatus::Error("unreachable: refused".into())
        );
    }

    #[tokio::test]
    async fn test_each_acquire_makes_one_attempt() {
        let connector = FailingConnector::new(ConnectionError::AuthFailed("bad password".into()));
        let manager = manager(connector.clone());

        manager.acquire(BackendKind::Document).await;
        let handle = manager.acquire(BackendKind::Document).await;
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(handle.retry_count(), 2);
        assert!(matches!(handle.last_error(), Some(ConnectionError::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_status_has_no_side_effects() {
        let connector = FailingConnector::new(ConnectionError::Unreachable("refused".into()));
        let manager = manager(connector.clone());

        assert_eq!(
            manager.status(BackendKind::Relational).await,
            ConnectionStatus::Disconnected
        );
        assert_eq!(manager.status_all().await.len(), 3);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_acquire_reuses_live_handle() {
        let connector = LazyConnector::new(Duration::ZERO);
        let manager = manager(connector.clone());

        let first = manager.acquire(BackendKind::Relational).await;
        let second = manager.acquire(BackendKind::Relational).await;
        assert!(first.is_live() && second.is_live());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            manager.status(BackendKind::Relational).await,
            ConnectionStatus::Connected
        );
    }

    #[tokio::test]
    async fn test_concurrent_acquires_connect_once() {
        let connector = LazyConnector::new(Duration::from_millis(20));
        let manager = manager(connector.clone());

        let (a, b, c) = tokio::join!(
            manager.acquire(BackendKind::Relational),
            manager.acquire(BackendKind::Relational),
            manager.acquire(BackendKind::Relational),
        );
        assert!(a.is_live() && b.is_live() && c.is_live());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mark_failed_forces_reconnect() {
        let connector = LazyConnector::new(Duration::ZERO);
        let manager = manager(connector.clone());

        manager.acquire(BackendKind::Relational).await;
        manager
            .mark_failed(
                BackendKind::Relational,
                ConnectionError::Unreachable("broken pipe".into()),
            )
            .await;
        assert!(matches!(
            manager.status(BackendKind::Relational).await,
            ConnectionStatus::Error(_)
        ));

        let handle = manager.acquire(BackendKind::Relational).await;
        assert!(handle.is_live());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_connect_times_out() {
        let connector = LazyConnector::new(Duration::from_secs(5));
        let manager = ConnectionManager::with_connector(connector, Duration::from_millis(30));

        let handle = manager.acquire(BackendKind::Relational).await;
        assert!(!handle.is_live());
        assert!(handle
            .last_error()
            .is_some_and(|e| e.reason().contains("timed out")));
    }

    #[tokio::test]
    async fn test_reset_tears_down_handle() {
        let manager = manager(LazyConnector::new(Duration::ZERO));

        assert!(!manager.reset(BackendKind::Relational).await);
        manager.acquire(BackendKind::Relational).await;
        assert!(manager.reset(BackendKind::Relational).await);
        assert_eq!(
            manager.status(BackendKind::Relational).await,
            ConnectionStatus::Disconnected
        );
    }
}
