use std::ops::RangeInclusive;
use std::sync::Arc;

use leaderboard_nats::topics::backend;
use leaderboard_types::{BatchTagAssignmentRequestedPayload, InteractionReplyPayload, MessageView, TagAssignmentInfo};
use tracing::info;
use uuid::Uuid;

use crate::errors::LeaderboardError;
use crate::interaction_store::purpose;
use crate::managers::{CommandInvocation, InteractionResponder};
use crate::router::{HandlerResult, MessageContext};

const SOURCE: &str = "discord_claim";

/// `/claimtag`: a member claims a tag for themselves.
pub struct ClaimTagManager {
    responder: Arc<InteractionResponder>,
    tag_range: RangeInclusive<u32>,
}

impl ClaimTagManager {
    pub fn new(responder: Arc<InteractionResponder>, tag_range: RangeInclusive<u32>) -> Self {
        Self { responder, tag_range }
    }

    fn range_message(&self) -> String {
        format!(
            "tag number must be between {} and {}",
            self.tag_range.start(),
            self.tag_range.end()
        )
    }

    /// Validate, defer, park and publish a single-entry batch assignment.
    /// The outcome arrives later on the tag reply topic.
    pub async fn handle_claim(&self, invocation: &CommandInvocation, tag_number: i64) -> Result<(), LeaderboardError> {
        let tag = u32::try_from(tag_number)
            .ok()
            .filter(|t| self.tag_range.contains(t));
        let Some(tag) = tag else {
            info!(guild_id = %invocation.guild_id, tag_number, "Rejected claim outside the tag range");
            self.responder
                .reject(&invocation.handle, &self.range_message())
                .await?;
            return Err(LeaderboardError::BadInput(self.range_message()));
        };

        if !self.responder.ensure_setup(invocation).await? {
            return Ok(());
        }

        let correlation_id = self
            .responder
            .begin(invocation, purpose::CLAIM_TAG, true)
            .await?;
        let payload = BatchTagAssignmentRequestedPayload {
            guild_id: invocation.guild_id.clone(),
            batch_id: Uuid::new_v4().to_string(),
            requesting_user_id: invocation.user_id.clone(),
            assignments: vec![TagAssignmentInfo {
                user_id: invocation.user_id.clone(),
                tag_number: tag,
            }],
            update_id: None,
            source: Some(SOURCE.to_string()),
        };
        self.responder
            .publish_request(
                invocation,
                &correlation_id,
                backend::BATCH_TAG_ASSIGNMENT_REQUESTED,
                &payload,
                SOURCE,
            )
            .await
    }

    /// Show the final outcome on the deferred response.
    pub async fn update_interaction_response(
        &self,
        correlation_id: &str,
        view: MessageView,
    ) -> Result<(), LeaderboardError> {
        self.responder
            .update_interaction_response(correlation_id, view)
            .await?;
        Ok(())
    }

    /// `tag.reply`
    pub async fn handle_reply(&self, ctx: MessageContext, payload: InteractionReplyPayload) -> HandlerResult {
        let correlation_id = ctx.require_correlation_id()?;
        self.update_interaction_response(correlation_id, MessageView::text(payload.content))
            .await?;
        Ok(vec![])
    }
}
