use crate::entity::{Audit, Checks, Entity, EntityId, Validate, Violation};
use serde::{Deserialize, Serialize};

/// A content key wrapped for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedKey {
    pub key: Vec<u8>,
    pub owner: EntityId,
}

/// An asymmetric secret whose private half is stored encrypted, together with
/// copies of its key wrapped for each owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    #[serde(flatten)]
    pub audit: Audit,
    #[serde(default)]
    pub public_key: Vec<u8>,
    pub encrypted_private_key: Vec<u8>,
    #[serde(default)]
    pub encrypted_keys: Vec<EncryptedKey>,
}

impl Secret {
    pub fn new(public_key: Vec<u8>, encrypted_private_key: Vec<u8>) -> Self {
        Self {
            public_key,
            encrypted_private_key,
            ..Self::default()
        }
    }

    /// Key wrapped for `owner`, if any.
    pub fn key_for(&self, owner: EntityId) -> Option<&[u8]> {
        self.encrypted_keys
            .iter()
            .find(|k| k.owner == owner)
            .map(|k| k.key.as_slice())
    }

    /// Add or replace the key wrapped for `owner`.
    pub fn grant(&mut self, owner: EntityId, key: Vec<u8>) {
        match self.encrypted_keys.iter_mut().find(|k| k.owner == owner) {
            Some(existing) => existing.key = key,
            None => self.encrypted_keys.push(EncryptedKey { key, owner }),
        }
    }
}

impl Validate for Secret {
    fn validate(&self) -> Vec<Violation> {
        Checks::new()
            .required_bytes("encrypted_private_key", &self.encrypted_private_key)
            .finish()
    }
}

impl Entity for Secret {
    const COLLECTION: &'static str = "Secret";

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }
}
