//! Message envelopes: payload bytes, a string metadata map and a UUID.
//!
//! On the wire the payload is the NATS message body, metadata travels as
//! headers and the UUID as `Nats-Msg-Id` so JetStream deduplicates
//! re-publishes of the same envelope.

use std::collections::BTreeMap;

use bytes::Bytes;
use leaderboard_types::metadata;
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::error::EnvelopeError;

pub type Metadata = BTreeMap<String, String>;

/// Immutable bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    uuid: Uuid,
    payload: Bytes,
    metadata: Metadata,
}

impl Envelope {
    pub fn new(uuid: Uuid, payload: Bytes, metadata: Metadata) -> Self {
        Self {
            uuid,
            payload,
            metadata,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn topic(&self) -> Option<&str> {
        self.get(metadata::TOPIC)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.get(metadata::CORRELATION_ID)
    }

    pub fn guild_id(&self) -> Option<&str> {
        self.get(metadata::GUILD_ID)
    }

    /// Returns a copy with `key` set; an existing value is replaced.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns a copy carrying a different message identity.
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }
}

/// Serialize `payload`, mint a message UUID and a fresh correlation ID, and
/// stamp `topic`.
pub fn create_new<T: Serialize + ?Sized>(payload: &T, topic: &str) -> Result<Envelope, EnvelopeError> {
    let bytes = serde_json::to_vec(payload)?;
    let mut meta = Metadata::new();
    meta.insert(metadata::TOPIC.to_string(), topic.to_string());
    meta.insert(
        metadata::CORRELATION_ID.to_string(),
        Uuid::new_v4().to_string(),
    );
    Ok(Envelope::new(Uuid::new_v4(), Bytes::from(bytes), meta))
}

/// Like [`create_new`], but continues the causal chain of `inbound`: its
/// correlation ID and the retained keys (`guild_id`, `channel_id`,
/// `message_id`) are copied over.
pub fn create_result<T: Serialize + ?Sized>(
    inbound: &Envelope,
    payload: &T,
    topic: &str,
) -> Result<Envelope, EnvelopeError> {
    let mut envelope = create_new(payload, topic)?;
    if let Some(correlation_id) = inbound.correlation_id() {
        envelope
            .metadata
            .insert(metadata::CORRELATION_ID.to_string(), correlation_id.to_string());
    }
    for key in metadata::RETAINED_KEYS {
        if let Some(value) = inbound.get(key) {
            envelope.metadata.insert(key.to_string(), value.to_string());
        }
    }
    Ok(envelope)
}

/// Parse the payload into `T`; schema mismatches are `BadPayload`.
pub fn unmarshal<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, EnvelopeError> {
    serde_json::from_slice(&envelope.payload).map_err(|source| EnvelopeError::BadPayload {
        topic: envelope.topic().unwrap_or_default().to_string(),
        source,
    })
}
