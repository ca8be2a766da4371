//! Redis-backed revocation store.
//!
//! Each revoked subject is a plain key holding `0` with a millisecond TTL, so
//! Redis expires the entry itself.

use super::{RevocationError, RevocationStore};
use async_trait::async_trait;
use log::debug;
use redis::{AsyncCommands, Client as RedisClient};
use std::sync::Arc;
use std::time::Duration;

/// Revocation store backed by Redis key expiry.
pub struct RedisRevocationStore {
    redis_client: Arc<RedisClient>,
}

impl RedisRevocationStore {
    pub fn new(redis_client: Arc<RedisClient>) -> Self {
        Self { redis_client }
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn put(&self, key: &str, ttl: Duration) -> Result<(), RevocationError> {
        // Truncated, never rounded up: the entry must not outlive the credential.
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        if millis == 0 {
            return Ok(());
        }

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn.pset_ex(key, 0u8, millis).await?;
        debug!("Denylisted {} for {}ms", key, millis);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, RevocationError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let present: bool = conn.exists(key).await?;
        Ok(present)
    }
}
