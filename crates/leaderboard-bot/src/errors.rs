//! Error kinds shared by the managers, the translation handlers and the
//! dispatcher, plus classification of serenity failures.
//!
//! The dispatcher only looks at [`ErrorKind`]: transient errors are nacked
//! for redelivery, everything else is acked.

use std::time::Duration;

use leaderboard_nats::{BusError, EnvelopeError};
use leaderboard_types::errors::DiscordErrorCode;
use serenity::http::HttpError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::interaction_store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// User input that failed validation.
    BadInput,
    /// An inbound bus payload that does not decode or fails validation.
    BadPayload,
    /// The guild config could not be resolved in time.
    ConfigUnavailable,
    /// The chat platform rejected a call for good.
    Platform,
    /// The backend reported a failure.
    Backend,
    Internal,
    /// Worth retrying: bus, store or platform hiccups.
    Transient,
    Cancelled,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadInput => "bad_input",
            ErrorKind::BadPayload => "bad_payload",
            ErrorKind::ConfigUnavailable => "config_unavailable",
            ErrorKind::Platform => "platform",
            ErrorKind::Backend => "backend",
            ErrorKind::Internal => "internal",
            ErrorKind::Transient => "transient",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error("{0}")]
    BadInput(String),

    #[error("invalid event on {topic}: {reason}")]
    InvalidEvent { topic: String, reason: String },

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("guild config unavailable for {guild_id}")]
    ConfigUnavailable { guild_id: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("handler panicked: {0}")]
    Panic(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<LeaderboardError>,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl LeaderboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LeaderboardError::BadInput(_) => ErrorKind::BadInput,
            LeaderboardError::InvalidEvent { .. } => ErrorKind::BadPayload,
            LeaderboardError::Envelope(EnvelopeError::BadPayload { .. }) => ErrorKind::BadPayload,
            LeaderboardError::Envelope(EnvelopeError::Serialize(_)) => ErrorKind::Internal,
            LeaderboardError::ConfigUnavailable { .. } => ErrorKind::ConfigUnavailable,
            LeaderboardError::Platform(e) if e.is_transient() => ErrorKind::Transient,
            LeaderboardError::Platform(_) => ErrorKind::Platform,
            LeaderboardError::Backend(_) => ErrorKind::Backend,
            LeaderboardError::Bus(_) | LeaderboardError::Store(_) => ErrorKind::Transient,
            LeaderboardError::Panic(_)
            | LeaderboardError::Internal(_)
            | LeaderboardError::RetriesExhausted { .. } => ErrorKind::Internal,
            LeaderboardError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn invalid_event(topic: &str, reason: impl Into<String>) -> Self {
        LeaderboardError::InvalidEvent {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }

    /// True if the failed platform call proved the interaction handle dead.
    pub fn invalidates_interaction(&self) -> bool {
        matches!(self, LeaderboardError::Platform(e) if e.invalidates_interaction())
    }
}

/// A failed chat platform call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed (HTTP {http_status}, {code:?}): {message}")]
pub struct PlatformError {
    pub operation: &'static str,
    pub code: DiscordErrorCode,
    pub http_status: u16,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl PlatformError {
    pub fn new(operation: &'static str, code: DiscordErrorCode, http_status: u16, message: impl Into<String>) -> Self {
        Self {
            operation,
            code,
            http_status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn invalidates_interaction(&self) -> bool {
        self.code.invalidates_interaction()
    }

    pub fn is_transient(&self) -> bool {
        if self.code.is_permanent() {
            return false;
        }
        self.code.is_retryable() || self.http_status == 429 || self.http_status >= 500
    }
}

/// Classify a serenity `Error` raised by `operation`.
pub fn classify(operation: &'static str, err: &serenity::Error) -> PlatformError {
    match err {
        serenity::Error::Http(http_err) => classify_http(operation, http_err),
        _ => {
            debug!(operation, error = %err, "Non-HTTP serenity error");
            PlatformError::new(operation, DiscordErrorCode::NetworkError, 0, err.to_string())
        }
    }
}

fn classify_http(operation: &'static str, http_err: &HttpError) -> PlatformError {
    match http_err {
        HttpError::UnsuccessfulRequest(resp) => {
            let status = resp.status_code.as_u16();

            if status == 429 {
                warn!(operation, "Rate limited by Discord");
                let mut err = PlatformError::new(
                    operation,
                    DiscordErrorCode::RateLimited,
                    status,
                    resp.error.message.clone(),
                );
                err.retry_after = Some(Duration::from_secs(1));
                return err;
            }

            let raw_code = resp.error.code as u32;
            let code = DiscordErrorCode::from_raw(raw_code);
            let err = PlatformError::new(operation, code, status, resp.error.message.clone());
            if err.is_transient() {
                debug!(operation, status, raw_code, message = %err.message, "Transient Discord error");
            } else {
                warn!(operation, status, raw_code, message = %err.message, "Discord rejected request");
            }
            err
        }
        _ => {
            debug!(operation, error = %http_err, "Network-level HTTP error");
            PlatformError::new(operation, DiscordErrorCode::NetworkError, 0, http_err.to_string())
        }
    }
}
