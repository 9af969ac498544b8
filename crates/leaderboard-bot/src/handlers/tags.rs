use leaderboard_nats::topics::{backend, chat};
use leaderboard_types::{
    BatchTagAssignedPayload, ReplyOutcome, TagAssignedPayload, TagAssignmentFailedPayload,
    TagAssignmentRequestedPayload, TagAvailabilityFailedPayload, TagAvailabilityRequestedPayload,
    TagAvailabilityResultPayload, TagSwapFailedPayload, TagSwapProcessedPayload, TagSwapRequestedPayload,
};
use tracing::debug;

use crate::errors::LeaderboardError;
use crate::handlers::{optional_uuid, reply, require, require_uuid};
use crate::render::sanitize_reason;
use crate::router::{HandlerResult, MessageContext, OutboundResult};

pub fn claimed_text(tag_number: u32) -> String {
    format!("✅ Successfully claimed tag #{tag_number}!")
}

/// `tag.assign.requested` → `tag.assignment.requested`. The update ID is
/// passed through untouched.
pub async fn handle_assign_requested(ctx: MessageContext, payload: TagAssignmentRequestedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require(&ctx, "user_id", &payload.user_id)?;
    if payload.tag_number == 0 {
        return Err(LeaderboardError::invalid_event(&ctx.topic, "tag_number must be positive"));
    }
    debug!(guild_id = %payload.guild_id, tag_number = payload.tag_number, "Forwarding tag assignment");
    Ok(vec![OutboundResult::new(backend::TAG_ASSIGNMENT_REQUESTED, &payload)?])
}

pub async fn handle_swap_requested(ctx: MessageContext, payload: TagSwapRequestedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require(&ctx, "requestor_id", &payload.requestor_id)?;
    require(&ctx, "target_id", &payload.target_id)?;
    if payload.requestor_id == payload.target_id {
        return Err(LeaderboardError::invalid_event(&ctx.topic, "cannot swap a tag with yourself"));
    }
    Ok(vec![OutboundResult::new(backend::TAG_SWAP_REQUESTED, &payload)?])
}

pub async fn handle_availability_requested(ctx: MessageContext, payload: TagAvailabilityRequestedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require(&ctx, "user_id", &payload.user_id)?;
    Ok(vec![OutboundResult::new(backend::TAG_AVAILABILITY_CHECK_REQUESTED, &payload)?])
}

pub async fn handle_tag_assigned(ctx: MessageContext, payload: TagAssignedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require(&ctx, "user_id", &payload.user_id)?;
    optional_uuid(&ctx, "assignment_id", payload.assignment_id.as_deref())?;
    Ok(vec![reply(
        chat::TAG_REPLY,
        &payload.guild_id,
        ReplyOutcome::Success,
        &claimed_text(payload.tag_number),
    )?])
}

pub async fn handle_batch_assigned(ctx: MessageContext, payload: BatchTagAssignedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require_uuid(&ctx, "batch_id", &payload.batch_id)?;
    require(&ctx, "requesting_user_id", &payload.requesting_user_id)?;

    let content = match payload.assignments.as_slice() {
        [] => return Err(LeaderboardError::invalid_event(&ctx.topic, "batch without assignments")),
        [single] => claimed_text(single.tag_number),
        many => match many
            .iter()
            .find(|a| a.user_id == payload.requesting_user_id)
        {
            Some(own) => claimed_text(own.tag_number),
            None => format!("✅ Assigned {} tags.", many.len()),
        },
    };
    Ok(vec![reply(chat::TAG_REPLY, &payload.guild_id, ReplyOutcome::Success, &content)?])
}

pub async fn handle_assignment_failed(ctx: MessageContext, payload: TagAssignmentFailedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    let reason = sanitize_reason(&payload.reason);
    let content = match payload.tag_number {
        Some(tag) => format!("❌ Could not claim tag #{tag}: {reason}"),
        None => format!("❌ Could not claim tag: {reason}"),
    };
    Ok(vec![reply(chat::TAG_REPLY, &payload.guild_id, ReplyOutcome::Failure, &content)?])
}

pub async fn handle_swap_processed(ctx: MessageContext, payload: TagSwapProcessedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    require(&ctx, "requestor_id", &payload.requestor_id)?;
    require(&ctx, "target_id", &payload.target_id)?;
    let content = match (payload.requestor_tag, payload.target_tag) {
        (Some(mine), Some(theirs)) => format!(
            "🔄 Tags swapped: <@{}> now holds #{} and <@{}> holds #{}.",
            payload.requestor_id, mine, payload.target_id, theirs
        ),
        _ => format!(
            "🔄 Tags swapped between <@{}> and <@{}>.",
            payload.requestor_id, payload.target_id
        ),
    };
    Ok(vec![reply(chat::TAG_REPLY, &payload.guild_id, ReplyOutcome::Success, &content)?])
}

pub async fn handle_swap_failed(ctx: MessageContext, payload: TagSwapFailedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    let content = format!("❌ Tag swap failed: {}", sanitize_reason(&payload.reason));
    Ok(vec![reply(chat::TAG_REPLY, &payload.guild_id, ReplyOutcome::Failure, &content)?])
}

pub async fn handle_availability_result(ctx: MessageContext, payload: TagAvailabilityResultPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    let content = if payload.is_available {
        format!("✅ Tag #{} is available.", payload.tag_number)
    } else {
        match payload.reason.as_deref() {
            Some(reason) => format!(
                "❌ Tag #{} is not available: {}",
                payload.tag_number,
                sanitize_reason(reason)
            ),
            None => format!("❌ Tag #{} is not available.", payload.tag_number),
        }
    };
    Ok(vec![reply(chat::TAG_REPLY, &payload.guild_id, ReplyOutcome::Success, &content)?])
}

pub async fn handle_availability_failed(ctx: MessageContext, payload: TagAvailabilityFailedPayload) -> HandlerResult {
    require(&ctx, "guild_id", &payload.guild_id)?;
    let reason = sanitize_reason(&payload.reason);
    let content = match payload.tag_number {
        Some(tag) => format!("❌ Could not check tag #{tag}: {reason}"),
        None => format!("❌ Could not check tag availability: {reason}"),
    };
    Ok(vec![reply(chat::TAG_REPLY, &payload.guild_id, ReplyOutcome::Failure, &content)?])
}
