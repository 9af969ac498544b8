//! Per-guild configuration as owned by the backend.

use serde::{Deserialize, Serialize};

/// Channel routing and setup state for one guild.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildConfig {
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaderboard_channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signup_channel_id: Option<String>,
    #[serde(default)]
    pub setup_complete: bool,
}

/// `guild.config.retrieval.requested`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildConfigRetrievalRequestedPayload {
    pub guild_id: String,
}

/// `guild.config.retrieved`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildConfigRetrievedPayload {
    pub guild_id: String,
    pub config: GuildConfig,
}

/// `guild.config.retrieval.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildConfigRetrievalFailedPayload {
    pub guild_id: String,
    pub reason: String,
}

/// `guild.config.updated`, pushed by the backend after setup changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildConfigUpdatedPayload {
    pub guild_id: String,
    pub config: GuildConfig,
}
