//! Generic create/update/soft-delete over a [`DocumentStore`].

use super::{
    Audit, ChangeSet, CollectionRegistry, Entity, EntityError, EntityId, Rule, Violation,
    AUDIT_FIELDS,
};
use crate::clock::Clock;
use crate::deadline::{bounded, DEFAULT_STORE_TIMEOUT};
use crate::store::{Document, DocumentStore, StoreError};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Persists [`Entity`] values with identity and audit timestamps.
///
/// Every write is a single-document operation; there is no cross-document
/// atomicity.
pub struct EntityStore {
    documents: Arc<dyn DocumentStore>,
    registry: CollectionRegistry,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
}

impl EntityStore {
    pub fn new(documents: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            documents,
            registry: CollectionRegistry::new(),
            clock,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Claim `T`'s collection and create it in the backend if missing.
    pub async fn register<T: Entity>(&self) -> Result<&'static str, EntityError> {
        let collection = self.collection_for::<T>()?;
        let created = self
            .bounded(self.documents.ensure_collection(collection))
            .await?;
        if created {
            info!("Created collection {}", collection);
        }
        Ok(collection)
    }

    /// Collection `T` is stored in. Fails if another type already owns the
    /// name.
    pub fn collection_for<T: Entity>(&self) -> Result<&'static str, EntityError> {
        let (collection, first) = self.registry.claim::<T>()?;
        if first {
            debug!("{} stored in collection {}", std::any::type_name::<T>(), collection);
        }
        Ok(collection)
    }

    /// Validate, assign identity and creation time, and insert.
    ///
    /// Nothing is written when validation fails.
    pub async fn create<T: Entity>(&self, mut entity: T) -> Result<T, EntityError> {
        let collection = self.collection_for::<T>()?;
        if let Some(id) = entity.id() {
            return Err(EntityError::IdentityAssigned { collection, id });
        }
        check(collection, &entity)?;

        let id = EntityId::generate();
        let audit = entity.audit_mut();
        audit.id = Some(id);
        audit.created_at = Some(self.clock.now());

        let document = to_document(&entity)?;
        self.bounded(self.documents.insert(collection, id, document))
            .await?;
        info!("Created {} {}", collection, id);
        Ok(entity)
    }

    /// Apply `changes` to the stored document of `entity`.
    ///
    /// The entity with the changes applied is validated before anything is
    /// written; on success `entity` is updated in place and `updated_at` is
    /// stamped in both the document and the entity.
    pub async fn update<T: Entity>(
        &self,
        entity: &mut T,
        mut changes: ChangeSet,
    ) -> Result<(), EntityError> {
        let collection = self.collection_for::<T>()?;
        let id = require_id(collection, entity)?;

        let touched: Vec<Violation> = changes
            .fields()
            .filter(|field| AUDIT_FIELDS.contains(field))
            .map(|field| Violation::new(field, Rule::Immutable))
            .collect();
        if !touched.is_empty() {
            return Err(EntityError::Validation(touched));
        }

        let mut merged = to_document(entity)?;
        for (field, value) in changes.as_document() {
            merged.insert(field.clone(), value.clone());
        }
        let mut updated: T = serde_json::from_value(Value::Object(merged))?;

        // Keys `T` does not deserialize would otherwise land in the document
        // while the entity stays unchanged.
        let known = to_document(&updated)?;
        let unknown: Vec<Violation> = changes
            .fields()
            .filter(|field| !known.contains_key(*field))
            .map(|field| Violation::new(field, Rule::Unknown))
            .collect();
        if !unknown.is_empty() {
            return Err(EntityError::Validation(unknown));
        }
        check(collection, &updated)?;

        let now = self.clock.now();
        updated.audit_mut().updated_at = Some(now);
        changes.insert("updated_at", serde_json::to_value(now)?);

        let matched = self
            .bounded(self.documents.update(collection, id, changes.as_document()))
            .await?;
        if !matched {
            return Err(EntityError::NotFound { collection, id });
        }
        *entity = updated;
        debug!("Updated {} {}", collection, id);
        Ok(())
    }

    /// Validate and rewrite the whole stored document from `entity`.
    pub async fn replace<T: Entity>(&self, entity: &mut T) -> Result<(), EntityError> {
        let collection = self.collection_for::<T>()?;
        let id = require_id(collection, entity)?;
        check(collection, entity)?;

        let now = self.clock.now();
        self.rewrite(collection, id, entity, |audit| &mut audit.updated_at, now)
            .await?;
        debug!("Replaced {} {}", collection, id);
        Ok(())
    }

    /// Stamp `deleted_at` and rewrite the whole stored document from `entity`.
    ///
    /// This is a full rewrite, not a patch: fields changed in the store since
    /// `entity` was read are overwritten with the values `entity` holds.
    pub async fn soft_delete<T: Entity>(&self, entity: &mut T) -> Result<(), EntityError> {
        let collection = self.collection_for::<T>()?;
        let id = require_id(collection, entity)?;

        let now = self.clock.now();
        self.rewrite(collection, id, entity, |audit| &mut audit.deleted_at, now)
            .await?;
        info!("Soft-deleted {} {}", collection, id);
        Ok(())
    }

    /// Read the document stored under `id`, deleted or not.
    pub async fn find<T: Entity>(&self, id: EntityId) -> Result<Option<T>, EntityError> {
        let collection = self.collection_for::<T>()?;
        let document = self.bounded(self.documents.find(collection, id)).await?;
        match document {
            Some(document) => Ok(Some(serde_json::from_value(Value::Object(document))?)),
            None => Ok(None),
        }
    }

    pub async fn exists<T: Entity>(&self, id: EntityId) -> Result<bool, EntityError> {
        let collection = self.collection_for::<T>()?;
        let document = self.bounded(self.documents.find(collection, id)).await?;
        Ok(document.is_some())
    }

    /// Set one audit timestamp to `now` and replace the stored document. The
    /// timestamp is restored if the write does not land.
    async fn rewrite<T: Entity>(
        &self,
        collection: &'static str,
        id: EntityId,
        entity: &mut T,
        stamp: fn(&mut Audit) -> &mut Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), EntityError> {
        let previous = stamp(entity.audit_mut()).replace(now);

        let result = match to_document(entity) {
            Ok(document) => self
                .bounded(self.documents.replace(collection, id, document))
                .await
                .map_err(EntityError::from)
                .and_then(|matched| {
                    if matched {
                        Ok(())
                    } else {
                        Err(EntityError::NotFound { collection, id })
                    }
                }),
            Err(e) => Err(e),
        };

        if result.is_err() {
            *stamp(entity.audit_mut()) = previous;
        }
        result
    }

    async fn bounded<T>(
        &self,
        op: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.store_timeout;
        bounded(limit, op, || {
            StoreError::Connectivity(format!("no response within {:?}", limit))
        })
        .await
    }
}

fn require_id<T: Entity>(collection: &'static str, entity: &T) -> Result<EntityId, EntityError> {
    entity
        .id()
        .ok_or(EntityError::IdentityMissing { collection })
}

fn check<T: Entity>(collection: &str, entity: &T) -> Result<(), EntityError> {
    let violations = entity.validate();
    if violations.is_empty() {
        return Ok(());
    }
    warn!(
        "Rejected {} write with {} violation(s)",
        collection,
        violations.len()
    );
    Err(EntityError::Validation(violations))
}

fn to_document<T: Entity>(entity: &T) -> Result<Document, EntityError> {
    match serde_json::to_value(entity)? {
        Value::Object(document) => Ok(document),
        other => Err(EntityError::Store(StoreError::Corrupt {
            key: std::any::type_name::<T>().to_string(),
            reason: format!("entity serialized to {} instead of an object", json_kind(&other)),
        })),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
