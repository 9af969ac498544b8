use std::sync::Arc;

use leaderboard_nats::EventBus;
use leaderboard_nats::envelope::create_new;
use leaderboard_types::{MessageView, metadata};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{LeaderboardError, PlatformError};
use crate::guild_config::GuildConfigResolver;
use crate::interaction_store::{InteractionStore, StoredInteraction};
use crate::managers::{CONFIG_UNAVAILABLE, CommandInvocation, NOT_CONFIGURED, REQUEST_FAILED};
use crate::platform::{ChatPlatform, InteractionHandle};
use crate::router::MessageContext;

/// Plumbing shared by every manager: the setup gate, parking interactions
/// under a correlation ID, publishing requests and answering parked
/// interactions once the backend replies.
pub struct InteractionResponder {
    bus: Arc<dyn EventBus>,
    store: Arc<dyn InteractionStore>,
    platform: Arc<dyn ChatPlatform>,
    resolver: Arc<GuildConfigResolver>,
}

impl InteractionResponder {
    pub fn new(
        bus: Arc<dyn EventBus>,
        store: Arc<dyn InteractionStore>,
        platform: Arc<dyn ChatPlatform>,
        resolver: Arc<GuildConfigResolver>,
    ) -> Self {
        Self {
            bus,
            store,
            platform,
            resolver,
        }
    }

    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    /// Answer immediately with an ephemeral notice.
    pub async fn reject(&self, handle: &InteractionHandle, text: &str) -> Result<(), LeaderboardError> {
        self.platform
            .respond(handle, MessageView::ephemeral_text(text))
            .await?;
        Ok(())
    }

    /// True when the guild finished setup. Otherwise the user has already
    /// been told why nothing happens.
    pub async fn ensure_setup(&self, invocation: &CommandInvocation) -> Result<bool, LeaderboardError> {
        let guild_id = invocation.guild_id.as_str();
        match self
            .resolver
            .is_setup_complete(&invocation.cancel, guild_id)
            .await
        {
            Ok(true) => Ok(true),
            Ok(false) => {
                info!(guild_id, "Command rejected: guild setup incomplete");
                self.reject(&invocation.handle, NOT_CONFIGURED).await?;
                Ok(false)
            }
            Err(LeaderboardError::Cancelled) => Err(LeaderboardError::Cancelled),
            Err(e) => {
                warn!(guild_id, error = %e, "Guild config unavailable, failing closed");
                self.reject(&invocation.handle, CONFIG_UNAVAILABLE).await?;
                Ok(false)
            }
        }
    }

    /// Defer the interaction and park it under a fresh correlation ID.
    pub async fn begin(
        &self,
        invocation: &CommandInvocation,
        purpose: &str,
        ephemeral: bool,
    ) -> Result<String, LeaderboardError> {
        self.platform.defer(&invocation.handle, ephemeral).await?;

        let correlation_id = Uuid::new_v4().to_string();
        let stored = self
            .store
            .set(
                &correlation_id,
                StoredInteraction::new(invocation.handle.clone(), &invocation.guild_id, purpose),
            )
            .await;
        if let Err(e) = stored {
            warn!(correlation_id = %correlation_id, purpose, error = %e, "Failed to store deferred interaction");
            if let Err(edit_err) = self
                .platform
                .edit_response(&invocation.handle, MessageView::text(REQUEST_FAILED))
                .await
            {
                warn!(correlation_id = %correlation_id, error = %edit_err, "Failed to report store failure");
            }
            return Err(e.into());
        }
        debug!(
            correlation_id = %correlation_id,
            guild_id = %invocation.guild_id,
            purpose,
            "Interaction deferred and stored"
        );
        Ok(correlation_id)
    }

    /// Publish a backend request for a parked interaction. When publishing
    /// fails the user is told and the interaction released.
    pub async fn publish_request<T: Serialize>(
        &self,
        invocation: &CommandInvocation,
        correlation_id: &str,
        topic: &'static str,
        payload: &T,
        source: &str,
    ) -> Result<(), LeaderboardError> {
        let mut envelope = create_new(payload, topic)?
            .with_metadata(metadata::CORRELATION_ID, correlation_id)
            .with_metadata(metadata::GUILD_ID, invocation.guild_id.as_str())
            .with_metadata(metadata::SOURCE, source);
        if let Some(channel_id) = invocation.channel_id() {
            envelope = envelope.with_metadata(metadata::CHANNEL_ID, channel_id);
        }

        match self.bus.publish(envelope).await {
            Ok(()) => {
                info!(correlation_id, topic, guild_id = %invocation.guild_id, "Request published");
                Ok(())
            }
            Err(e) => {
                warn!(correlation_id, topic, error = %e, "Failed to publish request");
                if let Err(edit_err) = self
                    .platform
                    .edit_response(&invocation.handle, MessageView::text(REQUEST_FAILED))
                    .await
                {
                    warn!(correlation_id, error = %edit_err, "Failed to report publish failure");
                }
                self.release(correlation_id).await;
                Err(e.into())
            }
        }
    }

    /// The parked interaction for `correlation_id`, if it has not expired.
    pub async fn lookup(&self, correlation_id: &str) -> Result<Option<StoredInteraction>, LeaderboardError> {
        let entry = self.store.get(correlation_id).await?;
        if entry.is_none() {
            info!(correlation_id, "No stored interaction, it expired or was already answered");
        }
        Ok(entry)
    }

    /// Edit the deferred response of the interaction parked under
    /// `correlation_id` and release it. Returns the edited message's ID, or
    /// `None` when nothing was parked.
    pub async fn update_interaction_response(
        &self,
        correlation_id: &str,
        view: MessageView,
    ) -> Result<Option<u64>, LeaderboardError> {
        let Some(entry) = self.lookup(correlation_id).await? else {
            return Ok(None);
        };
        let edited = self.platform.edit_response(&entry.handle, view).await;
        self.settle(correlation_id, &entry, edited).await.map(Some)
    }

    /// Release the entry after a successful platform call, or after one that
    /// proved the handle dead. Other failures keep it for a redelivery.
    pub async fn settle<T>(
        &self,
        correlation_id: &str,
        entry: &StoredInteraction,
        outcome: Result<T, PlatformError>,
    ) -> Result<T, LeaderboardError> {
        match outcome {
            Ok(value) => {
                self.release(correlation_id).await;
                debug!(correlation_id, purpose = entry.purpose(), "Interaction answered");
                Ok(value)
            }
            Err(e) if e.invalidates_interaction() => {
                warn!(correlation_id, purpose = entry.purpose(), error = %e, "Interaction handle is no longer valid");
                self.release(correlation_id).await;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best effort; a leftover entry only lives until the sweeper.
    pub async fn release(&self, correlation_id: &str) {
        if let Err(e) = self.store.delete(correlation_id).await {
            warn!(correlation_id, error = %e, "Failed to release stored interaction");
        }
    }

    /// Where channel-bound output for `guild_id` goes: the channel carried by
    /// the message, the cached config, then the backend.
    pub async fn get_channel_id(&self, ctx: &MessageContext, carried: Option<&str>, guild_id: &str) -> Option<u64> {
        if let Some(id) = carried.or(ctx.channel_id()).and_then(parse_snowflake) {
            return Some(id);
        }
        if let Some(cached) = self.resolver.cache().get(guild_id) {
            return cached
                .config
                .leaderboard_channel_id
                .as_deref()
                .and_then(parse_snowflake);
        }
        match self.resolver.get_with_context(&ctx.cancel, guild_id).await {
            Ok(resolved) => resolved
                .config
                .leaderboard_channel_id
                .as_deref()
                .and_then(parse_snowflake),
            Err(e) => {
                warn!(guild_id, error = %e, "No channel for guild");
                None
            }
        }
    }
}

fn parse_snowflake(id: &str) -> Option<u64> {
    id.trim().parse().ok().filter(|id| *id != 0)
}
