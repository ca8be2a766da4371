//! In-process document store.

use super::{Document, DocumentStore, StoreError};
use crate::entity::EntityId;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Collections of documents held in memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, HashMap<EntityId, Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len)
    }

    pub async fn has_collection(&self, collection: &str) -> bool {
        self.collections.read().await.contains_key(collection)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ensure_collection(&self, collection: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(collection) {
            return Ok(false);
        }
        collections.insert(collection.to_string(), HashMap::new());
        Ok(true)
    }

    async fn insert(
        &self,
        collection: &str,
        id: EntityId,
        document: Document,
    ) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        if documents.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("{}:{}", collection, id)));
        }
        documents.insert(id, document);
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: EntityId,
        changes: &Document,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(document) = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(&id))
        else {
            return Ok(false);
        };
        for (field, value) in changes {
            document.insert(field.clone(), value.clone());
        }
        Ok(true)
    }

    async fn replace(
        &self,
        collection: &str,
        id: EntityId,
        document: Document,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        match collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(&id))
        {
            Some(existing) => {
                *existing = document;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find(&self, collection: &str, id: EntityId) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|documents| documents.get(&id))
            .cloned())
    }
}
