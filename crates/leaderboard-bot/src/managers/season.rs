use std::sync::Arc;

use leaderboard_nats::topics::backend;
use leaderboard_types::{
    MessageView, ReplyOutcome, SeasonEndRequestedPayload, SeasonReplyPayload, SeasonStandingsRequestedPayload,
    SeasonStartRequestedPayload,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::LeaderboardError;
use crate::interaction_store::purpose;
use crate::managers::{ADMIN_REQUIRED, CommandInvocation, InteractionResponder};
use crate::router::{HandlerResult, MessageContext};

const SOURCE: &str = "discord_season";
const NAME_REQUIRED: &str = "season name must not be empty";
const BAD_SEASON_ID: &str = "season_id must be a UUID";

/// `/season start|standings|end`. Admin only, and only once setup is done.
pub struct SeasonManager {
    responder: Arc<InteractionResponder>,
}

impl SeasonManager {
    pub fn new(responder: Arc<InteractionResponder>) -> Self {
        Self { responder }
    }

    /// Admin and setup checks; false when the user has already been answered.
    async fn admit(&self, invocation: &CommandInvocation) -> Result<bool, LeaderboardError> {
        if !invocation.is_admin {
            info!(guild_id = %invocation.guild_id, user_id = %invocation.user_id, "Season command denied");
            self.responder
                .reject(&invocation.handle, ADMIN_REQUIRED)
                .await?;
            return Ok(false);
        }
        self.responder.ensure_setup(invocation).await
    }

    async fn invalid(&self, invocation: &CommandInvocation, message: &str) -> Result<(), LeaderboardError> {
        self.responder.reject(&invocation.handle, message).await?;
        Err(LeaderboardError::BadInput(message.to_string()))
    }

    pub async fn start(&self, invocation: &CommandInvocation, name: &str) -> Result<(), LeaderboardError> {
        let name = name.trim();
        if name.is_empty() {
            return self.invalid(invocation, NAME_REQUIRED).await;
        }
        if !self.admit(invocation).await? {
            return Ok(());
        }
        let correlation_id = self
            .responder
            .begin(invocation, purpose::SEASON, true)
            .await?;
        let payload = SeasonStartRequestedPayload {
            guild_id: invocation.guild_id.clone(),
            season_name: name.to_string(),
            requested_by: invocation.user_id.clone(),
            start_date: None,
        };
        self.responder
            .publish_request(
                invocation,
                &correlation_id,
                backend::SEASON_START_REQUESTED,
                &payload,
                SOURCE,
            )
            .await
    }

    pub async fn standings(&self, invocation: &CommandInvocation, season_id: Option<&str>) -> Result<(), LeaderboardError> {
        let season_id = match season_id.map(str::trim).filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => match Uuid::parse_str(raw) {
                Ok(id) => Some(id.to_string()),
                Err(_) => return self.invalid(invocation, BAD_SEASON_ID).await,
            },
        };
        if !self.admit(invocation).await? {
            return Ok(());
        }
        let correlation_id = self
            .responder
            .begin(invocation, purpose::SEASON, true)
            .await?;
        let payload = SeasonStandingsRequestedPayload {
            guild_id: invocation.guild_id.clone(),
            season_id,
        };
        self.responder
            .publish_request(
                invocation,
                &correlation_id,
                backend::SEASON_STANDINGS_REQUESTED,
                &payload,
                SOURCE,
            )
            .await
    }

    pub async fn end(&self, invocation: &CommandInvocation) -> Result<(), LeaderboardError> {
        if !self.admit(invocation).await? {
            return Ok(());
        }
        let correlation_id = self
            .responder
            .begin(invocation, purpose::SEASON, true)
            .await?;
        let payload = SeasonEndRequestedPayload {
            guild_id: invocation.guild_id.clone(),
            requested_by: invocation.user_id.clone(),
        };
        self.responder
            .publish_request(
                invocation,
                &correlation_id,
                backend::SEASON_END_REQUESTED,
                &payload,
                SOURCE,
            )
            .await
    }

    /// Where season announcements go.
    pub async fn get_channel_id(&self, ctx: &MessageContext, carried: Option<&str>, guild_id: &str) -> Option<u64> {
        self.responder
            .get_channel_id(ctx, carried, guild_id)
            .await
    }

    /// `season.reply`: the admin's deferred response gets the text, and a
    /// success is also announced in the leaderboard channel.
    pub async fn handle_reply(&self, ctx: MessageContext, payload: SeasonReplyPayload) -> HandlerResult {
        if let Some(correlation_id) = ctx.correlation_id() {
            self.responder
                .update_interaction_response(correlation_id, MessageView::text(payload.content.as_str()))
                .await?;
        }
        if payload.outcome != ReplyOutcome::Success {
            return Ok(vec![]);
        }

        match self
            .get_channel_id(&ctx, payload.channel_id.as_deref(), &payload.guild_id)
            .await
        {
            Some(channel_id) => {
                self.responder
                    .platform()
                    .send_channel_message(channel_id, MessageView::text(payload.content))
                    .await?;
            }
            None => warn!(guild_id = %payload.guild_id, "No channel for season announcement, skipping"),
        }
        Ok(vec![])
    }
}
