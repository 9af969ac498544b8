//! Topic names.
//!
//! Two namespaces share the bus:
//! - `discord.leaderboard.*`: requests from other bot components and replies
//!   that are rendered against a chat interaction or channel
//! - `leaderboard.*`: the backend's own request/response events
//!
//! Guild configuration lives under `guild.config.*`. Correlation between
//! namespaces is by the `correlation_id` metadata key, never by topic.

/// Chat namespace.
pub mod chat {
    pub const TAG_ASSIGN_REQUESTED: &str = "discord.leaderboard.tag.assign.requested";
    pub const TAG_SWAP_REQUESTED: &str = "discord.leaderboard.tag.swap.requested";
    pub const TAG_AVAILABILITY_REQUESTED: &str = "discord.leaderboard.tag.availability.requested";
    pub const RETRIEVE_REQUESTED: &str = "discord.leaderboard.retrieve.requested";
    pub const SEASON_END_REQUESTED: &str = "discord.leaderboard.season.end.requested";

    /// Claim, assignment, swap and availability outcomes.
    pub const TAG_REPLY: &str = "discord.leaderboard.tag.reply";
    pub const SEASON_REPLY: &str = "discord.leaderboard.season.reply";
    pub const HISTORY_REPLY: &str = "discord.leaderboard.history.reply";
    pub const CHART_REPLY: &str = "discord.leaderboard.chart.reply";
    pub const RETRIEVE_REPLY: &str = "discord.leaderboard.retrieve.reply";
    /// Render a leaderboard page.
    pub const DISPLAY: &str = "discord.leaderboard.display";
}

/// Backend namespace.
pub mod backend {
    pub const TAG_ASSIGNMENT_REQUESTED: &str = "leaderboard.tag.assignment.requested";
    pub const TAG_ASSIGNED: &str = "leaderboard.tag.assigned";
    pub const TAG_ASSIGNMENT_FAILED: &str = "leaderboard.tag.assignment.failed";

    pub const BATCH_TAG_ASSIGNMENT_REQUESTED: &str = "leaderboard.batch.tag.assignment.requested";
    pub const BATCH_TAG_ASSIGNED: &str = "leaderboard.batch.tag.assigned";

    pub const TAG_SWAP_REQUESTED: &str = "leaderboard.tag.swap.requested";
    pub const TAG_SWAP_PROCESSED: &str = "leaderboard.tag.swap.processed";
    pub const TAG_SWAP_FAILED: &str = "leaderboard.tag.swap.failed";

    pub const TAG_AVAILABILITY_CHECK_REQUESTED: &str = "leaderboard.tag.availability.check.requested";
    pub const TAG_AVAILABILITY_CHECK_RESULT: &str = "leaderboard.tag.availability.check.result";
    pub const TAG_AVAILABILITY_CHECK_FAILED: &str = "leaderboard.tag.availability.check.failed";

    pub const LEADERBOARD_RETRIEVE_REQUESTED: &str = "leaderboard.leaderboard.retrieve.requested";
    pub const LEADERBOARD_RETRIEVE_RESPONSE: &str = "leaderboard.leaderboard.retrieve.response";
    pub const LEADERBOARD_RETRIEVE_FAILED: &str = "leaderboard.leaderboard.retrieve.failed";
    pub const LEADERBOARD_UPDATED: &str = "leaderboard.leaderboard.updated";

    pub const SEASON_START_REQUESTED: &str = "leaderboard.season.start.requested";
    pub const SEASON_START_SUCCESS: &str = "leaderboard.season.start.success";
    pub const SEASON_START_FAILED: &str = "leaderboard.season.start.failed";

    pub const SEASON_STANDINGS_REQUESTED: &str = "leaderboard.season.standings.requested";
    pub const SEASON_STANDINGS_RESPONSE: &str = "leaderboard.season.standings.response";
    pub const SEASON_STANDINGS_FAILED: &str = "leaderboard.season.standings.failed";

    pub const SEASON_END_REQUESTED: &str = "leaderboard.season.end.requested";
    pub const SEASON_END_SUCCESS: &str = "leaderboard.season.end.success";
    pub const SEASON_END_FAILED: &str = "leaderboard.season.end.failed";

    pub const TAG_HISTORY_REQUESTED: &str = "leaderboard.tag.history.requested";
    pub const TAG_HISTORY_RESPONSE: &str = "leaderboard.tag.history.response";
    pub const TAG_HISTORY_FAILED: &str = "leaderboard.tag.history.failed";

    pub const TAG_GRAPH_REQUESTED: &str = "leaderboard.tag.graph.requested";
    pub const TAG_GRAPH_RESPONSE: &str = "leaderboard.tag.graph.response";
    pub const TAG_GRAPH_FAILED: &str = "leaderboard.tag.graph.failed";
}

/// Guild configuration.
pub mod guild {
    pub const CONFIG_RETRIEVAL_REQUESTED: &str = "guild.config.retrieval.requested";
    pub const CONFIG_RETRIEVED: &str = "guild.config.retrieved";
    pub const CONFIG_RETRIEVAL_FAILED: &str = "guild.config.retrieval.failed";
    pub const CONFIG_UPDATED: &str = "guild.config.updated";
}

/// A JetStream stream and the subjects it captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub name: &'static str,
    pub subjects: &'static [&'static str],
}

/// Streams created at startup.
pub const STREAMS: [StreamSpec; 3] = [
    StreamSpec {
        name: "LEADERBOARD",
        subjects: &["leaderboard.>"],
    },
    StreamSpec {
        name: "DISCORD_LEADERBOARD",
        subjects: &["discord.leaderboard.>"],
    },
    StreamSpec {
        name: "GUILD_CONFIG",
        subjects: &["guild.config.>"],
    },
];

/// Durable consumer name for one topic inside a consumer group.
/// JetStream durable names may not contain `.`, `*` or `>`.
pub fn durable_name(group: &str, topic: &str) -> String {
    let topic: String = topic
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' | ' ' => '_',
            other => other,
        })
        .collect();
    format!("{}-{}", group, topic)
}
