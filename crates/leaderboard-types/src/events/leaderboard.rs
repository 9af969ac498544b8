//! Leaderboard retrieval and update events.

use serde::{Deserialize, Serialize};

/// One ranked row. Rank is unique, contiguous and ascending within a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_number: Option<u32>,
}

/// `retrieve.requested` (chat) and `leaderboard.retrieve.requested` (backend)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardRetrieveRequestedPayload {
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

/// `leaderboard.retrieve.response`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardRetrievedPayload {
    pub guild_id: String,
    /// UUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaderboard_id: Option<String>,
    pub entries: Vec<LeaderboardEntry>,
}

/// `leaderboard.updated`, emitted after every round that moves tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardUpdatedPayload {
    pub guild_id: String,
    /// UUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaderboard_id: Option<String>,
    /// UUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<String>,
    pub entries: Vec<LeaderboardEntry>,
}

/// `leaderboard.retrieve.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardRetrieveFailedPayload {
    pub guild_id: String,
    pub reason: String,
}
