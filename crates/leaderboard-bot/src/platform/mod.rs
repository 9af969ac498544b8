//! The chat platform seam: everything the managers need from Discord.

pub mod discord;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use leaderboard_types::MessageView;
use serde::{Deserialize, Serialize};

use crate::errors::PlatformError;

/// What is needed to answer an interaction after the fact. Stored in the
/// interaction store between request publication and the backend response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionHandle {
    pub interaction_id: u64,
    pub token: String,
    #[serde(default)]
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub channel_id: Option<u64>,
    pub user_id: u64,
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Answer the interaction immediately.
    async fn respond(&self, handle: &InteractionHandle, view: MessageView) -> Result<(), PlatformError>;

    /// Acknowledge now, answer later through [`ChatPlatform::edit_response`].
    async fn defer(&self, handle: &InteractionHandle, ephemeral: bool) -> Result<(), PlatformError>;

    /// Replace the (deferred) original response. Returns its message ID.
    async fn edit_response(&self, handle: &InteractionHandle, view: MessageView) -> Result<u64, PlatformError>;

    async fn followup(&self, handle: &InteractionHandle, view: MessageView) -> Result<u64, PlatformError>;

    /// Answer a component interaction by rewriting the message it came from.
    async fn update_message(&self, handle: &InteractionHandle, view: MessageView) -> Result<(), PlatformError>;

    async fn send_channel_message(&self, channel_id: u64, view: MessageView) -> Result<u64, PlatformError>;
}
