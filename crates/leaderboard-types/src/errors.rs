//! Discord API error codes the bot reacts to.
//!
//! Only the codes that change how an interaction reply is handled get a named
//! variant; everything else falls through to [`DiscordErrorCode::Unknown`].

use serde::{Deserialize, Serialize};

/// High-level category of a Discord API error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rate limit hit; wait before retrying.
    RateLimit,
    /// Target resource (interaction, webhook, message, channel) not found.
    NotFound,
    /// Insufficient bot permissions for the requested action.
    PermissionDenied,
    /// Malformed or semantically invalid request.
    InvalidInput,
    /// Network, I/O or upstream overload.
    Network,
    Unknown,
}

/// Discord JSON error code (subset relevant to interaction replies).
///
/// See <https://discord.com/developers/docs/topics/opcodes-and-status-codes#json>.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscordErrorCode {
    /// 10003
    UnknownChannel,
    /// 10004
    UnknownGuild,
    /// 10008: the message backing the reply was deleted.
    UnknownMessage,
    /// 10015: the interaction webhook no longer exists.
    UnknownWebhook,
    /// 10062: token expired or the interaction was already acknowledged.
    UnknownInteraction,
    /// 40060: the interaction was already acknowledged.
    InteractionAlreadyAcknowledged,
    /// 50001
    MissingAccess,
    /// 50013
    MissingPermissions,
    /// 50027: interaction token is no longer valid.
    InvalidWebhookToken,
    /// 50035: request body failed validation (e.g. content too long).
    InvalidFormBody,
    /// HTTP 429.
    RateLimited,
    /// 130000
    ApiOverloaded,
    /// Client-side network failure; no Discord code available.
    NetworkError,
    Unknown,
}

impl DiscordErrorCode {
    /// Derive the code from a raw Discord JSON error code integer.
    pub fn from_raw(code: u32) -> Self {
        match code {
            10003 => Self::UnknownChannel,
            10004 => Self::UnknownGuild,
            10008 => Self::UnknownMessage,
            10015 => Self::UnknownWebhook,
            10062 => Self::UnknownInteraction,
            40060 => Self::InteractionAlreadyAcknowledged,
            50001 => Self::MissingAccess,
            50013 => Self::MissingPermissions,
            50027 => Self::InvalidWebhookToken,
            50035 => Self::InvalidFormBody,
            130000 => Self::ApiOverloaded,
            _ => Self::Unknown,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownChannel
            | Self::UnknownGuild
            | Self::UnknownMessage
            | Self::UnknownWebhook
            | Self::UnknownInteraction => ErrorCategory::NotFound,
            Self::MissingAccess | Self::MissingPermissions => ErrorCategory::PermissionDenied,
            Self::InteractionAlreadyAcknowledged
            | Self::InvalidWebhookToken
            | Self::InvalidFormBody => ErrorCategory::InvalidInput,
            Self::RateLimited => ErrorCategory::RateLimit,
            Self::ApiOverloaded | Self::NetworkError => ErrorCategory::Network,
            Self::Unknown => ErrorCategory::Unknown,
        }
    }

    /// True if the interaction handle can never be used again.
    ///
    /// A stored handle that fails with one of these codes is released instead
    /// of being kept around for a redelivered response.
    pub fn invalidates_interaction(&self) -> bool {
        matches!(
            self,
            Self::UnknownInteraction
                | Self::UnknownWebhook
                | Self::InvalidWebhookToken
                | Self::UnknownMessage
        )
    }

    /// True if the operation should **not** be retried.
    pub fn is_permanent(&self) -> bool {
        self.invalidates_interaction()
            || matches!(
                self,
                Self::UnknownChannel
                    | Self::UnknownGuild
                    | Self::MissingAccess
                    | Self::MissingPermissions
                    | Self::InvalidFormBody
                    | Self::InteractionAlreadyAcknowledged
            )
    }

    /// True if retrying after a delay is worthwhile.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::NetworkError | Self::ApiOverloaded
        )
    }
}
