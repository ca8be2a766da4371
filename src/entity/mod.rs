//! Typed persistence with audit metadata.
//!
//! Every persistable type implements [`Entity`]: it names its collection and
//! exposes an [`Audit`] block holding its identity and lifecycle timestamps.
//! [`EntityStore`] assigns identities, stamps timestamps, validates before
//! writing and talks to a [`DocumentStore`](crate::store::DocumentStore).

pub mod registry;
pub mod store;
pub mod validate;

pub use registry::CollectionRegistry;
pub use store::EntityStore;
pub use validate::{Checks, Rule, Validate, Violation};

use crate::store::{Document, StoreError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Document fields owned by the store. A [`ChangeSet`] may not touch them.
pub const AUDIT_FIELDS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

/// Opaque entity identity, assigned once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub(crate) fn generate() -> Self {
        EntityId(Uuid::new_v4())
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        EntityId(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity and lifecycle timestamps, flattened into the stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Unset while the entity is active.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A persistable domain record.
pub trait Entity: Serialize + DeserializeOwned + Validate + Send + Sync + 'static {
    /// Collection every instance of this type is stored in. Must be unique
    /// among registered types; [`CollectionRegistry`] enforces that.
    const COLLECTION: &'static str;

    fn audit(&self) -> &Audit;

    fn audit_mut(&mut self) -> &mut Audit;

    fn id(&self) -> Option<EntityId> {
        self.audit().id
    }

    fn is_deleted(&self) -> bool {
        self.audit().deleted_at.is_some()
    }
}

/// Collection name for `T`.
pub fn collection_for<T: Entity>() -> &'static str {
    T::COLLECTION
}

/// Field assignments applied to a single stored document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet(Document);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Like [`set`](Self::set) for any serializable value.
    pub fn set_serialized<V: Serialize>(
        self,
        field: impl Into<String>,
        value: &V,
    ) -> Result<Self, EntityError> {
        Ok(self.set(field, serde_json::to_value(value)?))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub(crate) fn as_document(&self) -> &Document {
        &self.0
    }

    pub(crate) fn insert(&mut self, field: &str, value: Value) {
        self.0.insert(field.to_string(), value);
    }
}

/// Errors raised by [`EntityStore`].
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("Validation failed: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Validation(Vec<Violation>),

    #[error("{collection} entity has no identity")]
    IdentityMissing { collection: &'static str },

    #[error("{collection} entity already has identity {id}")]
    IdentityAssigned {
        collection: &'static str,
        id: EntityId,
    },

    #[error("No {collection} document with id {id}")]
    NotFound {
        collection: &'static str,
        id: EntityId,
    },

    #[error("Collection {collection} is claimed by {existing}, cannot register {requested}")]
    CollectionConflict {
        collection: &'static str,
        existing: &'static str,
        requested: &'static str,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
