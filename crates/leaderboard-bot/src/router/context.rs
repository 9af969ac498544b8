use leaderboard_nats::{Envelope, Metadata};
use leaderboard_types::metadata;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::LeaderboardError;

/// Per-delivery state handed down the middleware chain to the handler.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub handler: &'static str,
    pub topic: String,
    pub message_id: Uuid,
    /// 1 on first delivery.
    pub attempt: u32,
    /// Inbound metadata plus whatever middleware stamped on.
    pub metadata: Metadata,
    pub guild_id: Option<String>,
    correlation_id: Option<String>,
    pub cancel: CancellationToken,
    /// The bus redelivers after this point whether or not we finished.
    pub deadline: Instant,
}

impl MessageContext {
    pub fn new(
        handler: &'static str,
        topic: &str,
        envelope: &Envelope,
        attempt: u32,
        cancel: CancellationToken,
        deadline: Instant,
    ) -> Self {
        Self {
            handler,
            topic: topic.to_string(),
            message_id: envelope.uuid(),
            attempt,
            metadata: envelope.metadata().clone(),
            guild_id: None,
            correlation_id: None,
            cancel,
            deadline,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// The first writer wins; returns false if an ID was already set.
    pub fn set_correlation_id(&mut self, id: impl Into<String>) -> bool {
        if self.correlation_id.is_some() {
            return false;
        }
        self.correlation_id = Some(id.into());
        true
    }

    pub fn require_correlation_id(&self) -> Result<&str, LeaderboardError> {
        self.correlation_id()
            .ok_or_else(|| LeaderboardError::invalid_event(&self.topic, "missing correlation_id"))
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.metadata.get(metadata::CHANNEL_ID).map(String::as_str)
    }

    #[cfg(test)]
    pub fn for_test(topic: &str, correlation_id: Option<&str>) -> Self {
        let mut ctx = Self {
            handler: "test",
            topic: topic.to_string(),
            message_id: Uuid::new_v4(),
            attempt: 1,
            metadata: Metadata::new(),
            guild_id: None,
            correlation_id: None,
            cancel: CancellationToken::new(),
            deadline: Instant::now() + std::time::Duration::from_secs(30),
        };
        if let Some(id) = correlation_id {
            ctx.set_correlation_id(id);
        }
        ctx
    }
}

/// A message a handler wants published once it returns successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundResult {
    pub topic: &'static str,
    pub payload: serde_json::Value,
    /// Overrides the metadata inherited from the inbound envelope.
    pub metadata: Metadata,
}

impl OutboundResult {
    pub fn new<T: Serialize>(topic: &'static str, payload: &T) -> Result<Self, LeaderboardError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| LeaderboardError::Envelope(leaderboard_nats::EnvelopeError::Serialize(e)))?;
        Ok(Self {
            topic,
            payload,
            metadata: Metadata::new(),
        })
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[cfg(test)]
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.payload.clone()).unwrap()
    }
}

pub type HandlerResult = Result<Vec<OutboundResult>, LeaderboardError>;
