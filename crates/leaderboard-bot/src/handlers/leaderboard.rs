use leaderboard_nats::topics::{backend, chat};
use leaderboard_types::{
    DisplayTrigger, LeaderboardDisplayPayload, LeaderboardEntry, LeaderboardRetrieveFailedPayload,
    LeaderboardRetrieveRequestedPayload, LeaderboardRetrievedPayload, LeaderboardUpdatedPayload, ReplyOutcome,
};

use crate::errors::LeaderboardError;
use crate::handlers::{optional_uuid, reply, require};
use crate::render::sanitize_reason;
use crate::router::{HandlerResult, MessageContext, OutboundResult};

/// Ranks must be positive, unique and contiguous.
fn check_ranks(ctx: &MessageContext, entries: &[LeaderboardEntry]) -> Result<(), LeaderboardError> {
    if entries.first().is_some_and(|e| e.rank == 0) {
        return Err(LeaderboardError::invalid_event(&ctx.topic, "ranks start at 1"));
    }
    for pair in entries.windows(2) {
        if pair[1].rank != pair[0].rank + 1 {
            return Err(LeaderboardError::invalid_event(
                &ctx.topic,
                format!("rank {} follows rank {}", pair[1].rank, pair[0].rank),
            ));
        }
    }
    if let Some(blank) = entries.iter().find(|e| e.user_id.trim().is_empty()) {
        return Err(LeaderboardError::invalid_event(
            &ctx.topic,
            format!("entry at rank {} has no user_id", blank.rank),
        ));
    }
    Ok(())
}

pub async fn handle_retrieve_requested(ctx: MessageContext, payload: LeaderboardRetrieveRequestedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    Ok(vec![OutboundResult::new(backend::LEADERBOARD_RETRIEVE_REQUESTED, &payload)?])
}

/// A requested leaderboard goes back to whoever asked.
pub async fn handle_retrieved(ctx: MessageContext, payload: LeaderboardRetrievedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    optional_uuid(&ctx, "leaderboard_id", payload.leaderboard_id.as_deref())?;
    check_ranks(&ctx, &payload.entries)?;
    let display = LeaderboardDisplayPayload {
        channel_id: ctx.channel_id().map(str::to_owned),
        guild_id: payload.guild_id,
        entries: payload.entries,
        trigger: DisplayTrigger::Requested,
    };
    Ok(vec![OutboundResult::new(chat::DISPLAY, &display)?])
}

/// A ranking change is posted to the guild's leaderboard channel.
pub async fn handle_updated(ctx: MessageContext, payload: LeaderboardUpdatedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    optional_uuid(&ctx, "leaderboard_id", payload.leaderboard_id.as_deref())?;
    optional_uuid(&ctx, "round_id", payload.round_id.as_deref())?;
    check_ranks(&ctx, &payload.entries)?;
    let display = LeaderboardDisplayPayload {
        channel_id: ctx.channel_id().map(str::to_owned),
        guild_id: payload.guild_id,
        entries: payload.entries,
        trigger: DisplayTrigger::Updated,
    };
    Ok(vec![OutboundResult::new(chat::DISPLAY, &display)?])
}

pub async fn handle_retrieve_failed(ctx: MessageContext, payload: LeaderboardRetrieveFailedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    let content = format!("❌ Could not load the leaderboard: {}", sanitize_reason(&payload.reason));
    Ok(vec![reply(chat::RETRIEVE_REPLY, &payload.guild_id, ReplyOutcome::Failure, &content)?])
}
