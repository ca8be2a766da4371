//! Redis-backed document store.
//!
//! Each document is a hash under `<namespace>:<collection>:<id>` mapping field
//! names to JSON-encoded values. Collection names are tracked in the set
//! `<namespace>:collections`.
//!
//! Every write is a single Lua script, so the existence check and the write
//! happen atomically. A partial update is an `HSET` of only the changed
//! fields: concurrent updates to different fields of one document both land.

use super::{Document, DocumentStore, StoreError};
use crate::entity::EntityId;
use async_trait::async_trait;
use log::debug;
use redis::{AsyncCommands, Client as RedisClient, Script};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

// KEYS[1] document, KEYS[2] collection set; ARGV[1] collection, then field/value pairs.
const INSERT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], unpack(ARGV, 2))
redis.call('SADD', KEYS[2], ARGV[1])
return 1
";

// KEYS[1] document; ARGV field/value pairs.
const UPDATE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
if #ARGV > 0 then
    redis.call('HSET', KEYS[1], unpack(ARGV))
end
return 1
";

// KEYS[1] document; ARGV field/value pairs.
const REPLACE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('DEL', KEYS[1])
redis.call('HSET', KEYS[1], unpack(ARGV))
return 1
";

pub struct RedisDocumentStore {
    redis_client: Arc<RedisClient>,
    namespace: String,
    insert_script: Script,
    update_script: Script,
    replace_script: Script,
}

impl RedisDocumentStore {
    pub fn new(redis_client: Arc<RedisClient>, namespace: impl Into<String>) -> Self {
        Self {
            redis_client,
            namespace: namespace.into(),
            insert_script: Script::new(INSERT_SCRIPT),
            update_script: Script::new(UPDATE_SCRIPT),
            replace_script: Script::new(REPLACE_SCRIPT),
        }
    }

    fn document_key(&self, collection: &str, id: EntityId) -> String {
        format!("{}:{}:{}", self.namespace, collection, id)
    }

    fn collections_key(&self) -> String {
        format!("{}:collections", self.namespace)
    }

    /// Flatten `document` into `field, json, field, json, ...` script arguments.
    fn field_args(key: &str, document: &Document) -> Result<Vec<String>, StoreError> {
        let mut args = Vec::with_capacity(document.len() * 2);
        for (field, value) in document {
            let json = serde_json::to_string(value).map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
            args.push(field.clone());
            args.push(json);
        }
        Ok(args)
    }

    /// A hash cannot be empty in Redis, so neither can a full document.
    fn require_fields(key: &str, args: &[String]) -> Result<(), StoreError> {
        if args.is_empty() {
            return Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: "document has no fields".to_string(),
            });
        }
        Ok(())
    }

    fn decode(key: &str, fields: HashMap<String, String>) -> Result<Document, StoreError> {
        fields
            .into_iter()
            .map(|(field, raw)| {
                serde_json::from_str::<Value>(&raw)
                    .map(|value| (field.clone(), value))
                    .map_err(|e| StoreError::Corrupt {
                        key: key.to_string(),
                        reason: format!("field {}: {}", field, e),
                    })
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn ensure_collection(&self, collection: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let added: i64 = conn.sadd(self.collections_key(), collection).await?;
        if added > 0 {
            debug!("Created collection {}:{}", self.namespace, collection);
        }
        Ok(added > 0)
    }

    async fn insert(
        &self,
        collection: &str,
        id: EntityId,
        document: Document,
    ) -> Result<(), StoreError> {
        let key = self.document_key(collection, id);
        let args = Self::field_args(&key, &document)?;
        Self::require_fields(&key, &args)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let mut invocation = self.insert_script.prepare_invoke();
        invocation
            .key(&key)
            .key(self.collections_key())
            .arg(collection);
        for arg in &args {
            invocation.arg(arg);
        }
        let created: bool = invocation.invoke_async(&mut conn).await?;
        if !created {
            return Err(StoreError::Duplicate(key));
        }
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: EntityId,
        changes: &Document,
    ) -> Result<bool, StoreError> {
        let key = self.document_key(collection, id);
        let args = Self::field_args(&key, changes)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let mut invocation = self.update_script.prepare_invoke();
        invocation.key(&key);
        for arg in &args {
            invocation.arg(arg);
        }
        let matched: bool = invocation.invoke_async(&mut conn).await?;
        Ok(matched)
    }

    async fn replace(
        &self,
        collection: &str,
        id: EntityId,
        document: Document,
    ) -> Result<bool, StoreError> {
        let key = self.document_key(collection, id);
        let args = Self::field_args(&key, &document)?;
        Self::require_fields(&key, &args)?;
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let mut invocation = self.replace_script.prepare_invoke();
        invocation.key(&key);
        for arg in &args {
            invocation.arg(arg);
        }
        let replaced: bool = invocation.invoke_async(&mut conn).await?;
        Ok(replaced)
    }

    async fn find(&self, collection: &str, id: EntityId) -> Result<Option<Document>, StoreError> {
        let key = self.document_key(collection, id);
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let fields: HashMap<String, String> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Self::decode(&key, fields).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_key_layout() {
        let client = Arc::new(RedisClient::open("redis://localhost:6379").unwrap());
        let store = RedisDocumentStore::new(client, "key-master");
        let id = EntityId::from(Uuid::nil());

        assert_eq!(
            store.document_key("User", id),
            "key-master:User:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(store.collections_key(), "key-master:collections");
    }

    #[test]
    fn test_fields_keep_json_shape() {
        let document = json!({"keys": [], "is_remote": false, "deleted_at": null})
            .as_object()
            .cloned()
            .unwrap();
        let args = RedisDocumentStore::field_args("k", &document).unwrap();
        assert_eq!(args.len(), 6);

        let fields: HashMap<String, String> = args
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        assert_eq!(fields["keys"], "[]");
        assert_eq!(RedisDocumentStore::decode("k", fields).unwrap(), document);
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(matches!(
            RedisDocumentStore::require_fields("k", &[]),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_corrupt_field_reported() {
        let fields = HashMap::from([("email".to_string(), "not json".to_string())]);
        assert!(matches!(
            RedisDocumentStore::decode("key-master:User:x", fields),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
