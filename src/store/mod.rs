//! Document store backends.
//!
//! The [`DocumentStore`] trait is the seam to the external document database.
//! Documents are JSON objects addressed by collection and [`EntityId`]; every
//! call touches exactly one document.

pub mod memory;
pub mod redis;

pub use memory::MemoryDocumentStore;
pub use self::redis::RedisDocumentStore;

use crate::entity::EntityId;
use async_trait::async_trait;
use thiserror::Error;

/// A stored document.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Errors raised by document backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document store unreachable: {0}")]
    Connectivity(String),

    #[error("Document {0} already exists")]
    Duplicate(String),

    #[error("Corrupt document {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<::redis::RedisError> for StoreError {
    fn from(e: ::redis::RedisError) -> Self {
        StoreError::Connectivity(e.to_string())
    }
}

/// Single-document operations against a collection-oriented store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create `collection` if it does not exist. Returns whether it was created.
    async fn ensure_collection(&self, collection: &str) -> Result<bool, StoreError>;

    /// Store a new document under `id`.
    async fn insert(
        &self,
        collection: &str,
        id: EntityId,
        document: Document,
    ) -> Result<(), StoreError>;

    /// Overwrite the listed fields of the document under `id`, leaving the
    /// rest untouched. Returns whether a document matched.
    async fn update(
        &self,
        collection: &str,
        id: EntityId,
        changes: &Document,
    ) -> Result<bool, StoreError>;

    /// Replace the whole document under `id`. Returns whether a document
    /// matched.
    async fn replace(
        &self,
        collection: &str,
        id: EntityId,
        document: Document,
    ) -> Result<bool, StoreError>;

    async fn find(&self, collection: &str, id: EntityId) -> Result<Option<Document>, StoreError>;
}
