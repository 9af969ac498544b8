//! Season lifecycle and standings events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `season.start.requested`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonStartRequestedPayload {
    pub guild_id: String,
    pub season_name: String,
    pub requested_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
}

/// `season.start.success`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonStartedPayload {
    pub guild_id: String,
    /// UUID
    pub season_id: String,
    pub season_name: String,
}

/// `season.start.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonStartFailedPayload {
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_name: Option<String>,
    pub reason: String,
}

/// `season.standings.requested`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonStandingsRequestedPayload {
    pub guild_id: String,
    /// UUID; the current season when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonStanding {
    pub rank: u32,
    pub user_id: String,
    pub total_points: f64,
    #[serde(default)]
    pub rounds_played: u32,
}

/// `season.standings.response`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonStandingsRetrievedPayload {
    pub guild_id: String,
    /// UUID
    pub season_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_name: Option<String>,
    pub standings: Vec<SeasonStanding>,
}

/// `season.standings.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonStandingsFailedPayload {
    pub guild_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_id: Option<String>,
    pub reason: String,
}

/// `season.end.requested` (both namespaces)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonEndRequestedPayload {
    pub guild_id: String,
    pub requested_by: String,
}

/// `season.end.success`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonEndedPayload {
    pub guild_id: String,
    /// UUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_name: Option<String>,
}

/// `season.end.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonEndFailedPayload {
    pub guild_id: String,
    pub reason: String,
}
