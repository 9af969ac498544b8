//! Error types for leaderboard-nats

use thiserror::Error;

/// Transport-level failures. All of them are worth retrying.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Publish to '{topic}' failed: {error}")]
    Publish { topic: String, error: String },

    #[error("Subscribe to '{topic}' failed: {error}")]
    Subscribe { topic: String, error: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Acknowledgement failed: {0}")]
    Ack(String),

    #[error("Envelope has no topic")]
    MissingTopic,
}

/// Failures turning payloads into envelopes and back.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Inbound bytes did not match the expected schema.
    #[error("Bad payload on '{topic}': {source}")]
    BadPayload {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
