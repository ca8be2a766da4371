//! Type-to-collection bookkeeping.

use super::{Entity, EntityError};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::RwLock;

/// Records which type owns each collection name.
///
/// A type may claim its own collection any number of times; a second type
/// claiming the same name is rejected, which keeps the mapping one-to-one.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    owners: RwLock<HashMap<&'static str, (TypeId, &'static str)>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `T::COLLECTION` for `T`. Returns the collection name and whether
    /// this call made the first claim.
    pub fn claim<T: Entity>(&self) -> Result<(&'static str, bool), EntityError> {
        let collection = T::COLLECTION;
        let requested = (TypeId::of::<T>(), type_name::<T>());

        if let Some(owner) = self.owner_of(collection) {
            return Self::check(collection, owner, requested).map(|name| (name, false));
        }

        let mut owners = self.owners.write().unwrap_or_else(|e| e.into_inner());
        match owners.get(collection) {
            // Claimed by another task between the read and the write.
            Some(owner) => Self::check(collection, *owner, requested).map(|name| (name, false)),
            None => {
                owners.insert(collection, requested);
                Ok((collection, true))
            }
        }
    }

    fn owner_of(&self, collection: &str) -> Option<(TypeId, &'static str)> {
        let owners = self.owners.read().unwrap_or_else(|e| e.into_inner());
        owners.get(collection).copied()
    }

    fn check(
        collection: &'static str,
        owner: (TypeId, &'static str),
        requested: (TypeId, &'static str),
    ) -> Result<&'static str, EntityError> {
        if owner.0 == requested.0 {
            Ok(collection)
        } else {
            Err(EntityError::CollectionConflict {
                collection,
                existing: owner.1,
                requested: requested.1,
            })
        }
    }
}
