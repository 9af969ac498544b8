use std::time::Duration;

use async_nats::jetstream::{self, kv};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::interaction_store::{InteractionStore, StoreError, StoredInteraction};

/// Store shared by every replica, on a JetStream key-value bucket whose
/// `max_age` is the interaction TTL. Expiry is enforced server-side.
pub struct KvInteractionStore {
    kv: kv::Store,
}

impl KvInteractionStore {
    pub async fn open(js: &jetstream::Context, bucket: &str, ttl: Duration) -> Result<Self, StoreError> {
        let kv = match js.get_key_value(bucket).await {
            Ok(kv) => kv,
            Err(_) => {
                info!(bucket, ttl_secs = ttl.as_secs(), "Creating interaction bucket");
                js.create_key_value(kv::Config {
                    bucket: bucket.to_string(),
                    description: "pending chat interactions by correlation ID".to_string(),
                    history: 1,
                    max_age: ttl,
                    ..Default::default()
                })
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?
            }
        };
        Ok(Self { kv })
    }
}

#[async_trait]
impl InteractionStore for KvInteractionStore {
    async fn set(&self, key: &str, entry: StoredInteraction) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&entry).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.kv
            .put(key, Bytes::from(bytes))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredInteraction>, StoreError> {
        let Some(bytes) = self
            .kv
            .get(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
        else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.kv
            .delete(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
