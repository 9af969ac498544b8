use leaderboard_nats::topics::{backend, chat};
use leaderboard_types::{
    ReplyOutcome, SeasonEndFailedPayload, SeasonEndRequestedPayload, SeasonEndedPayload, SeasonReplyPayload,
    SeasonStandingsFailedPayload, SeasonStandingsRetrievedPayload, SeasonStartFailedPayload, SeasonStartedPayload,
};

use crate::errors::LeaderboardError;
use crate::handlers::{optional_uuid, require, require_uuid};
use crate::render::{sanitize_reason, standings_text, truncate_content};
use crate::router::{HandlerResult, MessageContext, OutboundResult};

fn season_reply(ctx: &MessageContext, guild_id: &str, outcome: ReplyOutcome, content: &str) -> Result<OutboundResult, LeaderboardError> {
    OutboundResult::new(
        chat::SEASON_REPLY,
        &SeasonReplyPayload {
            guild_id: guild_id.to_string(),
            channel_id: ctx.channel_id().map(str::to_owned),
            content: truncate_content(content),
            outcome,
        },
    )
}

pub async fn handle_end_requested(ctx: MessageContext, payload: SeasonEndRequestedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require(&ctx, "requested_by", &payload.requested_by)?;
    Ok(vec![OutboundResult::new(backend::SEASON_END_REQUESTED, &payload)?])
}

pub async fn handle_started(ctx: MessageContext, payload: SeasonStartedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require_uuid(&ctx, "season_id", &payload.season_id)?;
    require(&ctx, "season_name", &payload.season_name)?;
    let content = format!("🏁 Season **{}** has started!", payload.season_name.trim());
    Ok(vec![season_reply(&ctx, &payload.guild_id, ReplyOutcome::Success, &content)?])
}

pub async fn handle_start_failed(ctx: MessageContext, payload: SeasonStartFailedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    let reason = sanitize_reason(&payload.reason);
    let content = match payload.season_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("❌ Could not start season **{name}**: {reason}"),
        None => format!("❌ Could not start the season: {reason}"),
    };
    Ok(vec![season_reply(&ctx, &payload.guild_id, ReplyOutcome::Failure, &content)?])
}

pub async fn handle_standings(ctx: MessageContext, payload: SeasonStandingsRetrievedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require_uuid(&ctx, "season_id", &payload.season_id)?;
    let content = standings_text(payload.season_name.as_deref(), &payload.standings);
    Ok(vec![season_reply(&ctx, &payload.guild_id, ReplyOutcome::Success, &content)?])
}

pub async fn handle_standings_failed(ctx: MessageContext, payload: SeasonStandingsFailedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    optional_uuid(&ctx, "season_id", payload.season_id.as_deref())?;
    let content = format!("❌ Could not load season standings: {}", sanitize_reason(&payload.reason));
    Ok(vec![season_reply(&ctx, &payload.guild_id, ReplyOutcome::Failure, &content)?])
}

pub async fn handle_ended(ctx: MessageContext, payload: SeasonEndedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    optional_uuid(&ctx, "season_id", payload.season_id.as_deref())?;
    let content = match payload.season_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("🏆 Season **{name}** has ended."),
        None => "🏆 The season has ended.".to_string(),
    };
    Ok(vec![season_reply(&ctx, &payload.guild_id, ReplyOutcome::Success, &content)?])
}

pub async fn handle_end_failed(ctx: MessageContext, payload: SeasonEndFailedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    let content = format!("❌ Could not end the season: {}", sanitize_reason(&payload.reason));
    Ok(vec![season_reply(&ctx, &payload.guild_id, ReplyOutcome::Failure, &content)?])
}
