//! Expiring denylist of revoked subjects.
//!
//! A [`RevocationStore`] records that a subject's credentials must be refused
//! until some instant. Expiry belongs to the store: entries vanish on their own
//! once their TTL elapses, so the denylist never holds more than the subjects
//! whose revoked window is still open.

pub mod memory;
pub mod redis;

pub use memory::MemoryRevocationStore;
pub use self::redis::RedisRevocationStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the revocation backend.
#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("Revocation store unreachable: {0}")]
    Connectivity(String),
}

impl From<::redis::RedisError> for RevocationError {
    fn from(e: ::redis::RedisError) -> Self {
        RevocationError::Connectivity(e.to_string())
    }
}

/// Key-presence cache with per-entry time-to-live.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark `key` present for `ttl`. A later `put` for the same key replaces the
    /// earlier one.
    async fn put(&self, key: &str, ttl: Duration) -> Result<(), RevocationError>;

    /// True iff an unexpired entry for `key` exists.
    async fn exists(&self, key: &str) -> Result<bool, RevocationError>;
}
