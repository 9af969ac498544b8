//! Tag history and chart events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `tag.history.requested`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagHistoryRequestedPayload {
    pub guild_id: String,
    pub member_id: String,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagHistoryEntry {
    pub tag_number: u32,
    /// `claimed`, `assigned`, `swapped`, `lost`, ...
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_member_id: Option<String>,
}

/// `tag.history.response`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagHistoryRetrievedPayload {
    pub guild_id: String,
    pub member_id: String,
    pub entries: Vec<TagHistoryEntry>,
}

/// `tag.history.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagHistoryFailedPayload {
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    pub reason: String,
}

/// `tag.graph.requested`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagGraphRequestedPayload {
    pub guild_id: String,
    pub member_id: String,
}

/// `tag.graph.response`; `png` travels base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagGraphRetrievedPayload {
    pub guild_id: String,
    pub member_id: String,
    #[serde(with = "super::base64_bytes")]
    pub png: Vec<u8>,
}

/// `tag.graph.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagGraphFailedPayload {
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    pub reason: String,
}
