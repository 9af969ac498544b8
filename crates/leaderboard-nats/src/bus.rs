//! The event bus contract consumed by the dispatcher and the managers.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::envelope::Envelope;
use crate::error::BusError;

/// Settles one delivery with the bus.
#[async_trait]
pub trait Acker: Send {
    async fn ack(self: Box<Self>) -> Result<(), BusError>;

    /// Ask for redelivery after `delay`.
    async fn nack(self: Box<Self>, delay: Duration) -> Result<(), BusError>;
}

/// One inbound message plus the handle to settle it.
pub struct Delivery {
    pub envelope: Envelope,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,
    acker: Box<dyn Acker>,
}

impl Delivery {
    pub fn new(envelope: Envelope, attempt: u32, acker: Box<dyn Acker>) -> Self {
        Self {
            envelope,
            attempt,
            acker,
        }
    }

    pub async fn ack(self) -> Result<(), BusError> {
        self.acker.ack().await
    }

    pub async fn nack(self, delay: Duration) -> Result<(), BusError> {
        self.acker.nack(delay).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("envelope", &self.envelope)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

pub type DeliveryStream = BoxStream<'static, Delivery>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusHealth {
    Connected,
    Disconnected,
}

/// Durable pub/sub with at-least-once delivery.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish to the envelope's `topic` metadata key.
    async fn publish(&self, envelope: Envelope) -> Result<(), BusError>;

    /// Members of the same `group` load-balance deliveries of `topic`.
    async fn subscribe(&self, topic: &str, group: &str) -> Result<DeliveryStream, BusError>;

    /// Every caller receives every message of `topic`; used for cache refresh
    /// events each replica must observe.
    async fn subscribe_broadcast(&self, topic: &str) -> Result<DeliveryStream, BusError>;

    /// Idempotent.
    async fn create_stream(&self, name: &str, subjects: &[String]) -> Result<(), BusError>;

    fn health(&self) -> BusHealth;
}
