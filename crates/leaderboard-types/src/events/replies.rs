//! Chat-namespace replies: already-translated results waiting to be rendered
//! against a stored interaction or a guild channel.

use serde::{Deserialize, Serialize};

use super::leaderboard::LeaderboardEntry;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplyOutcome {
    Success,
    Failure,
}

/// `tag.reply`, `history.reply`, `retrieve.reply`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InteractionReplyPayload {
    pub guild_id: String,
    pub content: String,
    pub outcome: ReplyOutcome,
}

/// `season.reply`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonReplyPayload {
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub content: String,
    pub outcome: ReplyOutcome,
}

/// `chart.reply`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChartReplyPayload {
    pub guild_id: String,
    pub member_id: String,
    #[serde(with = "super::base64_bytes")]
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisplayTrigger {
    /// A user asked for the leaderboard; answer the stored interaction.
    Requested,
    /// The backend pushed a new ranking; post to the leaderboard channel.
    Updated,
}

/// `display`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardDisplayPayload {
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub entries: Vec<LeaderboardEntry>,
    pub trigger: DisplayTrigger,
}
