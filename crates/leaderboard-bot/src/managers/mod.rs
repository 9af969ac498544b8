//! Interaction managers: one per command family. Each validates the chat
//! input, parks the interaction under a fresh correlation ID and publishes a
//! backend request; the matching reply handler later answers the parked
//! interaction.

pub mod claim_tag;
pub mod history;
pub mod pagination;
pub mod responder;
pub mod season;


use tokio_util::sync::CancellationToken;

pub use claim_tag::ClaimTagManager;
pub use history::HistoryManager;
pub use pagination::PaginationManager;
pub use responder::InteractionResponder;
pub use season::SeasonManager;

use crate::platform::InteractionHandle;

pub const NOT_CONFIGURED: &str =
    "⚠️ This server is not yet configured. Ask an admin to finish leaderboard setup first.";
pub const CONFIG_UNAVAILABLE: &str =
    "⚠️ Leaderboard settings could not be loaded right now. Please try again in a moment.";
pub const REQUEST_FAILED: &str = "❌ Request failed. Please try again.";
pub const ADMIN_REQUIRED: &str = "❌ You need the Administrator permission to manage seasons.";

/// A slash command invocation, stripped of platform types.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub handle: InteractionHandle,
    pub guild_id: String,
    pub user_id: String,
    pub is_admin: bool,
    /// Fires when the interaction token lifetime runs out or on shutdown.
    pub cancel: CancellationToken,
}

impl CommandInvocation {
    pub fn channel_id(&self) -> Option<String> {
        self.handle.channel_id.map(|c| c.to_string())
    }
}

/// A press on one of our message buttons.
#[derive(Debug, Clone)]
pub struct ButtonPress {
    pub handle: InteractionHandle,
    /// The message carrying the button.
    pub message_id: u64,
    pub custom_id: String,
    /// Description of the message's first embed.
    pub description: Option<String>,
}
