use std::sync::Arc;

use leaderboard_nats::topics::backend;
use leaderboard_types::{
    AttachedFile, ChartReplyPayload, InteractionReplyPayload, MessageView, TagGraphRequestedPayload,
    TagHistoryRequestedPayload,
};
use tracing::{debug, info};

use crate::errors::LeaderboardError;
use crate::interaction_store::purpose;
use crate::managers::{CommandInvocation, InteractionResponder};
use crate::render::{CHART_CONTENT_TYPE, CHART_FILENAME, CHART_GENERATED};
use crate::router::{HandlerResult, MessageContext};

const SOURCE: &str = "discord_history";

#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    pub default: u32,
    pub max: u32,
}

/// `/history member` and `/history chart`. History is readable before setup
/// completes, so there is no setup gate here.
pub struct HistoryManager {
    responder: Arc<InteractionResponder>,
    limits: HistoryLimits,
}

impl HistoryManager {
    pub fn new(responder: Arc<InteractionResponder>, limits: HistoryLimits) -> Self {
        Self { responder, limits }
    }

    fn limit_message(&self) -> String {
        format!("limit must be between 1 and {}", self.limits.max)
    }

    pub async fn request_member(
        &self,
        invocation: &CommandInvocation,
        member_id: Option<String>,
        limit: Option<i64>,
    ) -> Result<(), LeaderboardError> {
        let limit = match limit {
            None => self.limits.default,
            Some(raw) => match u32::try_from(raw).ok().filter(|l| (1..=self.limits.max).contains(l)) {
                Some(limit) => limit,
                None => {
                    self.responder
                        .reject(&invocation.handle, &self.limit_message())
                        .await?;
                    return Err(LeaderboardError::BadInput(self.limit_message()));
                }
            },
        };
        let member_id = member_id.unwrap_or_else(|| invocation.user_id.clone());

        let correlation_id = self
            .responder
            .begin(invocation, purpose::HISTORY, true)
            .await?;
        let payload = TagHistoryRequestedPayload {
            guild_id: invocation.guild_id.clone(),
            member_id,
            limit,
        };
        self.responder
            .publish_request(
                invocation,
                &correlation_id,
                backend::TAG_HISTORY_REQUESTED,
                &payload,
                SOURCE,
            )
            .await
    }

    pub async fn request_chart(&self, invocation: &CommandInvocation, member_id: Option<String>) -> Result<(), LeaderboardError> {
        let member_id = member_id.unwrap_or_else(|| invocation.user_id.clone());
        let correlation_id = self
            .responder
            .begin(invocation, purpose::HISTORY_CHART, true)
            .await?;
        let payload = TagGraphRequestedPayload {
            guild_id: invocation.guild_id.clone(),
            member_id,
        };
        self.responder
            .publish_request(
                invocation,
                &correlation_id,
                backend::TAG_GRAPH_REQUESTED,
                &payload,
                SOURCE,
            )
            .await
    }

    /// `history.reply`
    pub async fn handle_reply(&self, ctx: MessageContext, payload: InteractionReplyPayload) -> HandlerResult {
        let correlation_id = ctx.require_correlation_id()?;
        self.responder
            .update_interaction_response(correlation_id, MessageView::text(payload.content))
            .await?;
        Ok(vec![])
    }

    /// `chart.reply`: the edit says a chart is coming, the PNG goes in a
    /// followup since not every client renders attachments added by an edit.
    pub async fn handle_chart(&self, ctx: MessageContext, payload: ChartReplyPayload) -> HandlerResult {
        let correlation_id = ctx.require_correlation_id()?;
        let Some(entry) = self.responder.lookup(correlation_id).await? else {
            return Ok(vec![]);
        };
        debug!(correlation_id, member_id = %payload.member_id, bytes = payload.png.len(), "Delivering chart");

        let platform = self.responder.platform();
        let edited = platform
            .edit_response(&entry.handle, MessageView::text(CHART_GENERATED))
            .await;
        if edited.is_err() {
            return self
                .responder
                .settle(correlation_id, &entry, edited)
                .await
                .map(|_| vec![]);
        }

        let chart = MessageView {
            ephemeral: true,
            ..Default::default()
        }
        .with_attachment(AttachedFile {
            filename: CHART_FILENAME.to_string(),
            content_type: CHART_CONTENT_TYPE.to_string(),
            data: payload.png,
        });
        let sent = platform.followup(&entry.handle, chart).await;
        let message_id = self.responder.settle(correlation_id, &entry, sent).await?;
        info!(correlation_id, message_id, "Chart delivered");
        Ok(vec![])
    }
}
