//! Saved search persistence.
//!
//! [`PersistenceWorkflow`] validates and stamps snapshots; a
//! [`SavedSearchStore`] writes them, one document per saved search.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::Collection;

use common::errors::{ConnectionError, PersistenceError};
use common::models::{
    BackendKind, Row, SaveSearchRequest, SavedSearchDocument, SavedSearchSummary,
};
use common::utils::IdGenerator;
use connection_service::{BackendClient, ConnectionManager};

/// Storage for saved search documents.
#[async_trait]
pub trait SavedSearchStore: Send + Sync {
    async fn insert(&self, document: &SavedSearchDocument) -> Result<(), PersistenceError>;
    async fn list(&self) -> Result<Vec<SavedSearchDocument>, PersistenceError>;
    async fn find(&self, id: &str) -> Result<Option<SavedSearchDocument>, PersistenceError>;
    /// Returns false when no document had the id.
    async fn remove(&self, id: &str) -> Result<bool, PersistenceError>;
}

/// Saved searches in a MongoDB collection, reached through the document
/// backend's connection handle.
pub struct MongoSavedSearchStore {
    connections: Arc<ConnectionManager>,
    collection: String,
}

impl MongoSavedSearchStore {
    pub fn new(connections: Arc<ConnectionManager>, collection: impl Into<String>) -> Self {
        Self {
            connections,
            collection: collection.into(),
        }
    }

    async fn collection(&self) -> Result<Collection<SavedSearchDocument>, PersistenceError> {
        let handle = self.connections.acquire(BackendKind::Document).await;
        match handle.client() {
            Some(BackendClient::Document(database)) => Ok(database.collection(&self.collection)),
            _ => Err(PersistenceError::Unavailable(
                handle
                    .last_error()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "not connected".to_string()),
            )),
        }
    }

    /// Connection-level failures mark the handle failed and surface as
    /// `Unavailable`; anything else goes through `otherwise`.
    async fn map_error(
        &self,
        err: mongodb::error::Error,
        otherwise: fn(String) -> PersistenceError,
    ) -> PersistenceError {
        let message = err.to_string();
        let connection = match err.kind.as_ref() {
            ErrorKind::Authentication { .. } => Some(ConnectionError::AuthFailed(message.clone())),
            ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. } => {
                Some(ConnectionError::Unreachable(message.clone()))
            }
            _ => None,
        };
        match connection {
            Some(error) => {
                self.connections.mark_failed(BackendKind::Document, error).await;
                PersistenceError::Unavailable(message)
            }
            None => otherwise(message),
        }
    }
}

#[async_trait]
impl SavedSearchStore for MongoSavedSearchStore {
    async fn insert(&self, document: &SavedSearchDocument) -> Result<(), PersistenceError> {
        let collection = self.collection().await?;
        match collection.insert_one(document).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.map_error(e, PersistenceError::WriteFailed).await),
        }
    }

    async fn list(&self) -> Result<Vec<SavedSearchDocument>, PersistenceError> {
        let collection = self.collection().await?;
        let mut cursor = match collection.find(doc! {}).await {
            Ok(cursor) => cursor,
            Err(e) => return Err(self.map_error(e, PersistenceError::Unavailable).await),
        };

        let mut documents = Vec::new();
        loop {
            match cursor.advance().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => return Err(self.map_error(e, PersistenceError::Unavailable).await),
            }
            match cursor.deserialize_current() {
                Ok(document) => documents.push(document),
                // One unreadable document should not hide the rest.
                Err(e) => tracing::warn!(error = %e, "skipping unreadable saved search"),
            }
        }
        Ok(documents)
    }

    async fn find(&self, id: &str) -> Result<Option<SavedSearchDocument>, PersistenceError> {
        let collection = self.collection().await?;
        match collection.find_one(doc! { "id": id }).await {
            Ok(document) => Ok(document),
            Err(e) => Err(self.map_error(e, PersistenceError::Unavailable).await),
        }
    }

    async fn remove(&self, id: &str) -> Result<bool, PersistenceError> {
        let collection = self.collection().await?;
        match collection.delete_one(doc! { "id": id }).await {
            Ok(result) => Ok(result.deleted_count > 0),
            Err(e) => Err(self.map_error(e, PersistenceError::WriteFailed).await),
        }
    }
}

/// Checks that every row has the same field set and that field names are
/// storable as document keys.
fn check_rows(rows: &[Row]) -> Result<(), PersistenceError> {
    if let Some((first, rest)) = rows.split_first() {
        if let Some(position) = rest.iter().position(|row| !row.same_fields(first)) {
            return Err(PersistenceError::Rejected(format!(
                "row {} has fields {:?}, expected {:?}",
                position + 1,
                rest[position].field_names(),
                first.field_names()
            )));
        }
        for name in first.field_names() {
            if name.is_empty() || name.starts_with('$') || name.contains('.') {
                return Err(PersistenceError::Rejected(format!(
                    "field name {:?} cannot be stored",
                    name
                )));
            }
        }
    }
    Ok(())
}

/// Save, list, view and delete of saved searches.
#[derive(Clone)]
pub struct PersistenceWorkflow {
    store: Arc<dyn SavedSearchStore>,
}

impl PersistenceWorkflow {
    pub fn new(store: Arc<dyn SavedSearchStore>) -> Self {
        Self { store }
    }

    /// Stamps an id and timestamp and writes the snapshot as one document.
    pub async fn save(
        &self,
        request: SaveSearchRequest,
    ) -> Result<SavedSearchDocument, PersistenceError> {
        check_rows(&request.rows)?;

        let note = request
            .note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let document = SavedSearchDocument {
            id: IdGenerator::saved_search_id(),
            kind: request.parameters.kind,
            parameters: request.parameters,
            rows: request.rows,
            note,
            created_at: Utc::now(),
        };
        self.store.insert(&document).await?;
        tracing::info!(id = %document.id, rows = document.rows.len(), "saved search stored");
        Ok(document)
    }

    /// Newest first.
    pub async fn list(&self) -> Result<Vec<SavedSearchSummary>, PersistenceError> {
        let mut documents = self.store.list().await?;
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents.iter().map(SavedSearchDocument::summary).collect())
    }

    pub async fn view(&self, id: &str) -> Result<SavedSearchDocument, PersistenceError> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    /// Immediate and permanent.
    pub async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        if self.store.remove(id).await? {
            tracing::info!(id = %id, "saved search deleted");
            Ok(())
        } else {
            Err(PersistenceError::NotFound(id.to_string()))
        }
    }
}
