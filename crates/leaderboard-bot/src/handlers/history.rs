use leaderboard_nats::topics::chat;
use leaderboard_types::{
    ChartReplyPayload, ReplyOutcome, TagGraphFailedPayload, TagGraphRetrievedPayload, TagHistoryFailedPayload,
    TagHistoryRetrievedPayload,
};
use tracing::debug;

use crate::handlers::{reply, require};
use crate::render::{history_text, sanitize_reason};
use crate::router::{HandlerResult, MessageContext, OutboundResult};

pub const NOTHING_TO_CHART: &str = "📈 No tag history to chart yet.";

pub async fn handle_history(ctx: MessageContext, payload: TagHistoryRetrievedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require(&ctx, "member_id", &payload.member_id)?;
    debug!(member_id = %payload.member_id, entries = payload.entries.len(), "Rendering tag history");
    let content = history_text(&payload.member_id, &payload.entries);
    Ok(vec![reply(chat::HISTORY_REPLY, &payload.guild_id, ReplyOutcome::Success, &content)?])
}

pub async fn handle_history_failed(ctx: MessageContext, payload: TagHistoryFailedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    let content = format!("❌ Could not load tag history: {}", sanitize_reason(&payload.reason));
    Ok(vec![reply(chat::HISTORY_REPLY, &payload.guild_id, ReplyOutcome::Failure, &content)?])
}

/// An empty image means there was nothing to plot; say so in text.
pub async fn handle_graph(ctx: MessageContext, payload: TagGraphRetrievedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require(&ctx, "member_id", &payload.member_id)?;
    if payload.png.is_empty() {
        return Ok(vec![reply(
            chat::HISTORY_REPLY,
            &payload.guild_id,
            ReplyOutcome::Failure,
            NOTHING_TO_CHART,
        )?]);
    }
    let chart = ChartReplyPayload {
        guild_id: payload.guild_id,
        member_id: payload.member_id,
        png: payload.png,
    };
    Ok(vec![OutboundResult::new(chat::CHART_REPLY, &chart)?])
}

pub async fn handle_graph_failed(ctx: MessageContext, payload: TagGraphFailedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    let content = format!("❌ Could not generate the chart: {}", sanitize_reason(&payload.reason));
    Ok(vec![reply(chat::HISTORY_REPLY, &payload.guild_id, ReplyOutcome::Failure, &content)?])
}
