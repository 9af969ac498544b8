use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use leaderboard_nats::topics::backend;
use leaderboard_types::{
    DisplayTrigger, InteractionReplyPayload, LeaderboardDisplayPayload, LeaderboardEntry,
    LeaderboardRetrieveRequestedPayload, MessageView,
};
use tracing::{debug, info, warn};

use crate::errors::LeaderboardError;
use crate::interaction_store::purpose;
use crate::managers::{ButtonPress, CommandInvocation, InteractionResponder};
use crate::render::{self, NEXT_BUTTON, PREV_BUTTON};
use crate::router::{HandlerResult, MessageContext};

const SOURCE: &str = "discord_leaderboard";
pub const PAGE_OUT_OF_RANGE: &str = "page out of range";
pub const LEADERBOARD_EXPIRED: &str = "This leaderboard has expired. Run /leaderboard again.";
const MALFORMED: &str = "This button is not recognised.";

/// Entries each rendered leaderboard message was built from, keyed by chat
/// message ID. Oldest messages are forgotten first.
struct Snapshots {
    entries: HashMap<u64, Arc<Vec<LeaderboardEntry>>>,
    order: VecDeque<u64>,
    capacity: usize,
}

impl Snapshots {
    fn insert(&mut self, message_id: u64, entries: Arc<Vec<LeaderboardEntry>>) {
        if self.entries.insert(message_id, entries).is_none() {
            self.order.push_back(message_id);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

/// `/leaderboard`, its pagination buttons, and leaderboard display replies.
pub struct PaginationManager {
    responder: Arc<InteractionResponder>,
    per_page: usize,
    snapshots: Mutex<Snapshots>,
}

impl PaginationManager {
    pub fn new(responder: Arc<InteractionResponder>, per_page: usize, snapshot_capacity: usize) -> Self {
        Self {
            responder,
            per_page: per_page.max(1),
            snapshots: Mutex::new(Snapshots {
                entries: HashMap::new(),
                order: VecDeque::new(),
                capacity: snapshot_capacity.max(1),
            }),
        }
    }

    fn snapshots(&self) -> MutexGuard<'_, Snapshots> {
        self.snapshots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remember(&self, message_id: u64, entries: Vec<LeaderboardEntry>) {
        self.snapshots().insert(message_id, Arc::new(entries));
    }

    fn snapshot(&self, message_id: u64) -> Option<Arc<Vec<LeaderboardEntry>>> {
        self.snapshots().entries.get(&message_id).cloned()
    }

    /// `/leaderboard`: publicly deferred, answered on the display topic.
    pub async fn request_leaderboard(&self, invocation: &CommandInvocation) -> Result<(), LeaderboardError> {
        if !self.responder.ensure_setup(invocation).await? {
            return Ok(());
        }
        let correlation_id = self
            .responder
            .begin(invocation, purpose::LEADERBOARD, false)
            .await?;
        let payload = LeaderboardRetrieveRequestedPayload {
            guild_id: invocation.guild_id.clone(),
            channel_id: invocation.channel_id(),
        };
        self.responder
            .publish_request(
                invocation,
                &correlation_id,
                backend::LEADERBOARD_RETRIEVE_REQUESTED,
                &payload,
                SOURCE,
            )
            .await
    }

    /// A previous/next button press. Soft failures answer the presser
    /// ephemerally and leave the message alone.
    pub async fn handle_pagination(&self, press: &ButtonPress) -> Result<(), LeaderboardError> {
        let parsed = render::parse_custom_id(&press.custom_id)
            .filter(|(name, _)| *name == PREV_BUTTON || *name == NEXT_BUTTON);
        let Some((_, requested)) = parsed else {
            warn!(custom_id = %press.custom_id, "Malformed pagination custom ID");
            self.responder.reject(&press.handle, MALFORMED).await?;
            return Err(LeaderboardError::BadInput(format!(
                "malformed custom ID {}",
                press.custom_id
            )));
        };

        let Some((current, total)) = press
            .description
            .as_deref()
            .and_then(render::parse_page_description)
        else {
            warn!(message_id = press.message_id, description = ?press.description, "Malformed page description");
            self.responder.reject(&press.handle, MALFORMED).await?;
            return Err(LeaderboardError::BadInput("malformed page description".to_string()));
        };

        if requested < 1 || requested > i64::from(total) {
            debug!(message_id = press.message_id, current, total, requested, "Page out of range");
            return self.responder.reject(&press.handle, PAGE_OUT_OF_RANGE).await;
        }

        let Some(entries) = self.snapshot(press.message_id) else {
            info!(message_id = press.message_id, "No snapshot for leaderboard message");
            return self.responder.reject(&press.handle, LEADERBOARD_EXPIRED).await;
        };

        let view = render::leaderboard_page(&entries, requested as u32, self.per_page);
        self.responder
            .platform()
            .update_message(&press.handle, view)
            .await?;
        debug!(message_id = press.message_id, from = current, to = requested, "Leaderboard page turned");
        Ok(())
    }

    /// `display`: render page one for whoever asked, or post a fresh board to
    /// the leaderboard channel after an update.
    pub async fn handle_display(&self, ctx: MessageContext, payload: LeaderboardDisplayPayload) -> HandlerResult {
        let view = render::leaderboard_page(&payload.entries, 1, self.per_page);
        match payload.trigger {
            DisplayTrigger::Requested => {
                let correlation_id = ctx.require_correlation_id()?;
                if let Some(message_id) = self
                    .responder
                    .update_interaction_response(correlation_id, view)
                    .await?
                {
                    self.remember(message_id, payload.entries);
                }
            }
            DisplayTrigger::Updated => {
                let Some(channel_id) = self
                    .responder
                    .get_channel_id(&ctx, payload.channel_id.as_deref(), &payload.guild_id)
                    .await
                else {
                    warn!(guild_id = %payload.guild_id, "No leaderboard channel, skipping update");
                    return Ok(vec![]);
                };
                let message_id = self
                    .responder
                    .platform()
                    .send_channel_message(channel_id, view)
                    .await?;
                info!(guild_id = %payload.guild_id, channel_id, message_id, "Posted updated leaderboard");
                self.remember(message_id, payload.entries);
            }
        }
        Ok(vec![])
    }

    /// `retrieve.reply`: a failed `/leaderboard`.
    pub async fn handle_retrieve_reply(&self, ctx: MessageContext, payload: InteractionReplyPayload) -> HandlerResult {
        let correlation_id = ctx.require_correlation_id()?;
        self.responder
            .update_interaction_response(correlation_id, MessageView::text(payload.content))
            .await?;
        Ok(vec![])
    }
}
