//! Credential issuance, identity-scoped revocation and audited entity
//! persistence.
//!
//! [`CredentialManager`] signs and verifies short-lived access and refresh
//! credentials and keeps a TTL-bounded denylist in a [`RevocationStore`].
//! [`EntityStore`] persists [`Entity`] types into a [`DocumentStore`], assigning
//! identities and audit timestamps and validating before every write.
//!
//! Both sides have a Redis backend for deployment and an in-memory backend for
//! tests, and take their notion of time from an injected [`Clock`].

pub mod clock;
pub mod config;
pub mod credential;
mod deadline;
pub mod entity;
pub mod model;
pub mod revocation;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, KeySource, Settings};
pub use credential::{
    AccessClaims, Capabilities, Claims, Credential, CredentialError, CredentialManager,
    KeyMaterial, RefreshClaims, Signer, SigningAlgorithm,
};
pub use deadline::DEFAULT_STORE_TIMEOUT;
pub use entity::{ChangeSet, Entity, EntityError, EntityId, EntityStore};
pub use revocation::{MemoryRevocationStore, RedisRevocationStore, RevocationError, RevocationStore};
pub use store::{DocumentStore, MemoryDocumentStore, RedisDocumentStore, StoreError};
