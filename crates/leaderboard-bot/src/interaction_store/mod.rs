//! Correlates asynchronous backend responses with the chat interaction that
//! caused them, keyed by correlation ID.
//!
//! Entries live for less than the platform's 15 minute token lifetime so a
//! stored handle is never used after it stopped working.

mod kv;
mod memory;

pub use kv::KvInteractionStore;
pub use memory::MemoryInteractionStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::InteractionHandle;

/// What a stored interaction is waiting for; used in logs and metrics.
pub mod purpose {
    pub const CLAIM_TAG: &str = "claim_tag";
    pub const HISTORY: &str = "history";
    pub const HISTORY_CHART: &str = "history_chart";
    pub const SEASON: &str = "season";
    pub const LEADERBOARD: &str = "leaderboard";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredInteraction {
    pub handle: InteractionHandle,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

impl StoredInteraction {
    pub fn new(handle: InteractionHandle, guild_id: &str, purpose: &str) -> Self {
        Self {
            handle,
            guild_id: Some(guild_id.to_string()),
            purpose: Some(purpose.to_string()),
        }
    }

    pub fn purpose(&self) -> &str {
        self.purpose.as_deref().unwrap_or("unknown")
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("interaction store backend failed: {0}")]
    Backend(String),

    #[error("stored interaction {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Replaces any entry under `key`.
    async fn set(&self, key: &str, entry: StoredInteraction) -> Result<(), StoreError>;

    /// `None` once the entry expired or was deleted.
    async fn get(&self, key: &str) -> Result<Option<StoredInteraction>, StoreError>;

    /// Idempotent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Number of live entries, when the backend can tell cheaply.
    async fn len(&self) -> Option<usize> {
        None
    }
}
