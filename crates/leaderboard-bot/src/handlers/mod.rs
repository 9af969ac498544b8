//! Translation handlers: pure mappings between the chat and backend
//! namespaces. Each validates the inbound payload and returns the results to
//! publish; the dispatcher publishes them only if the handler succeeds.

pub mod history;
pub mod leaderboard;
pub mod season;
pub mod tags;

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod handlers_tests;

use leaderboard_nats::topics::{backend, chat};
use leaderboard_types::{InteractionReplyPayload, ReplyOutcome};
use uuid::Uuid;

use crate::errors::LeaderboardError;
use crate::render::truncate_content;
use crate::router::{MessageContext, OutboundResult, Router};

/// Register every translation route.
pub fn register(router: &mut Router) {
    router.add_handler("tag_assign_request", chat::TAG_ASSIGN_REQUESTED, tags::handle_assign_requested);
    router.add_handler("tag_swap_request", chat::TAG_SWAP_REQUESTED, tags::handle_swap_requested);
    router.add_handler(
        "tag_availability_request",
        chat::TAG_AVAILABILITY_REQUESTED,
        tags::handle_availability_requested,
    );
    router.add_handler("tag_assigned", backend::TAG_ASSIGNED, tags::handle_tag_assigned);
    router.add_handler("tag_assignment_failed", backend::TAG_ASSIGNMENT_FAILED, tags::handle_assignment_failed);
    router.add_handler("batch_tag_assigned", backend::BATCH_TAG_ASSIGNED, tags::handle_batch_assigned);
    router.add_handler("tag_swap_processed", backend::TAG_SWAP_PROCESSED, tags::handle_swap_processed);
    router.add_handler("tag_swap_failed", backend::TAG_SWAP_FAILED, tags::handle_swap_failed);
    router.add_handler(
        "tag_availability_result",
        backend::TAG_AVAILABILITY_CHECK_RESULT,
        tags::handle_availability_result,
    );
    router.add_handler(
        "tag_availability_failed",
        backend::TAG_AVAILABILITY_CHECK_FAILED,
        tags::handle_availability_failed,
    );

    router.add_handler(
        "leaderboard_retrieve_request",
        chat::RETRIEVE_REQUESTED,
        leaderboard::handle_retrieve_requested,
    );
    router.add_handler(
        "leaderboard_retrieved",
        backend::LEADERBOARD_RETRIEVE_RESPONSE,
        leaderboard::handle_retrieved,
    );
    router.add_handler(
        "leaderboard_retrieve_failed",
        backend::LEADERBOARD_RETRIEVE_FAILED,
        leaderboard::handle_retrieve_failed,
    );
    router.add_handler("leaderboard_updated", backend::LEADERBOARD_UPDATED, leaderboard::handle_updated);

    router.add_handler("season_end_request", chat::SEASON_END_REQUESTED, season::handle_end_requested);
    router.add_handler("season_started", backend::SEASON_START_SUCCESS, season::handle_started);
    router.add_handler("season_start_failed", backend::SEASON_START_FAILED, season::handle_start_failed);
    router.add_handler("season_standings", backend::SEASON_STANDINGS_RESPONSE, season::handle_standings);
    router.add_handler(
        "season_standings_failed",
        backend::SEASON_STANDINGS_FAILED,
        season::handle_standings_failed,
    );
    router.add_handler("season_ended", backend::SEASON_END_SUCCESS, season::handle_ended);
    router.add_handler("season_end_failed", backend::SEASON_END_FAILED, season::handle_end_failed);

    router.add_handler("tag_history", backend::TAG_HISTORY_RESPONSE, history::handle_history);
    router.add_handler("tag_history_failed", backend::TAG_HISTORY_FAILED, history::handle_history_failed);
    router.add_handler("tag_graph", backend::TAG_GRAPH_RESPONSE, history::handle_graph);
    router.add_handler("tag_graph_failed", backend::TAG_GRAPH_FAILED, history::handle_graph_failed);
}

pub(crate) fn require(ctx: &MessageContext, field: &str, value: &str) -> Result<(), LeaderboardError> {
    if value.trim().is_empty() {
        return Err(LeaderboardError::invalid_event(&ctx.topic, format!("missing {field}")));
    }
    Ok(())
}

pub(crate) fn require_uuid(ctx: &MessageContext, field: &str, value: &str) -> Result<(), LeaderboardError> {
    require(ctx, field, value)?;
    Uuid::parse_str(value.trim())
        .map(|_| ())
        .map_err(|_| LeaderboardError::invalid_event(&ctx.topic, format!("{field} is not a UUID: {value}")))
}

pub(crate) fn optional_uuid(ctx: &MessageContext, field: &str, value: Option<&str>) -> Result<(), LeaderboardError> {
    match value {
        Some(value) => require_uuid(ctx, field, value),
        None => Ok(()),
    }
}

pub(crate) fn reply(
    topic: &'static str,
    guild_id: &str,
    outcome: ReplyOutcome,
    content: &str,
) -> Result<OutboundResult, LeaderboardError> {
    OutboundResult::new(
        topic,
        &InteractionReplyPayload {
            guild_id: guild_id.to_string(),
            content: truncate_content(content),
            outcome,
        },
    )
}
