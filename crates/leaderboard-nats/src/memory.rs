//! In-process [`EventBus`] for tests and local runs without NATS.
//!
//! Records every publish and every ack/nack, and redelivers nacked messages
//! after the requested delay until `max_deliver` attempts were made.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::bus::{Acker, BusHealth, Delivery, DeliveryStream, EventBus};
use crate::envelope::Envelope;
use crate::error::BusError;

/// Settlement recorded for a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckEvent {
    Ack {
        message_id: Uuid,
        attempt: u32,
    },
    Nack {
        message_id: Uuid,
        attempt: u32,
        delay: Duration,
    },
}

impl AckEvent {
    pub fn message_id(&self) -> Uuid {
        match self {
            AckEvent::Ack { message_id, .. } | AckEvent::Nack { message_id, .. } => *message_id,
        }
    }
}

type SubscriptionKey = (String, String);

struct Inner {
    subscriptions: Mutex<HashMap<SubscriptionKey, mpsc::UnboundedSender<Delivery>>>,
    published: Mutex<Vec<Envelope>>,
    settlements: Mutex<Vec<AckEvent>>,
    max_deliver: u32,
    failing_publishes: AtomicU32,
    connected: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<Inner>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(4)
    }
}

impl InMemoryBus {
    /// `max_deliver` counts the first delivery.
    pub fn new(max_deliver: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscriptions: Mutex::new(HashMap::new()),
                published: Mutex::new(Vec::new()),
                settlements: Mutex::new(Vec::new()),
                max_deliver,
                failing_publishes: AtomicU32::new(0),
                connected: AtomicBool::new(true),
            }),
        }
    }

    /// Route an inbound envelope to subscribers without recording it as
    /// published by the code under test.
    pub fn deliver(&self, envelope: Envelope) -> Result<(), BusError> {
        let topic = envelope.topic().ok_or(BusError::MissingTopic)?.to_string();
        let senders: Vec<(SubscriptionKey, mpsc::UnboundedSender<Delivery>)> =
            lock(&self.inner.subscriptions)
                .iter()
                .filter(|((t, _), _)| *t == topic)
                .map(|(k, s)| (k.clone(), s.clone()))
                .collect();
        for (key, sender) in senders {
            let delivery = self.delivery(key.clone(), envelope.clone(), 1);
            if sender.send(delivery).is_err() {
                lock(&self.inner.subscriptions).remove(&key);
            }
        }
        Ok(())
    }

    fn delivery(&self, key: SubscriptionKey, envelope: Envelope, attempt: u32) -> Delivery {
        let acker = MemoryAcker {
            bus: self.clone(),
            key,
            envelope: envelope.clone(),
            attempt,
        };
        Delivery::new(envelope, attempt, Box::new(acker))
    }

    pub fn published(&self) -> Vec<Envelope> {
        lock(&self.inner.published).clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Envelope> {
        lock(&self.inner.published)
            .iter()
            .filter(|e| e.topic() == Some(topic))
            .cloned()
            .collect()
    }

    pub fn settlements(&self) -> Vec<AckEvent> {
        lock(&self.inner.settlements).clone()
    }

    pub fn settlements_for(&self, message_id: Uuid) -> Vec<AckEvent> {
        lock(&self.inner.settlements)
            .iter()
            .filter(|e| e.message_id() == message_id)
            .cloned()
            .collect()
    }

    /// The next `count` publishes fail with a transport error.
    pub fn fail_next_publishes(&self, count: u32) {
        self.inner.failing_publishes.store(count, Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.connected.store(connected, Ordering::SeqCst);
    }

    fn record(&self, event: AckEvent) {
        lock(&self.inner.settlements).push(event);
    }

    fn redeliver(&self, key: SubscriptionKey, envelope: Envelope, attempt: u32, delay: Duration) {
        let sender = lock(&self.inner.subscriptions).get(&key).cloned();
        let Some(sender) = sender else {
            return;
        };
        let delivery = self.delivery(key, envelope, attempt);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send(delivery);
        });
    }
}

struct MemoryAcker {
    bus: InMemoryBus,
    key: SubscriptionKey,
    envelope: Envelope,
    attempt: u32,
}

#[async_trait]
impl Acker for MemoryAcker {
    async fn ack(self: Box<Self>) -> Result<(), BusError> {
        self.bus.record(AckEvent::Ack {
            message_id: self.envelope.uuid(),
            attempt: self.attempt,
        });
        Ok(())
    }

    async fn nack(self: Box<Self>, delay: Duration) -> Result<(), BusError> {
        self.bus.record(AckEvent::Nack {
            message_id: self.envelope.uuid(),
            attempt: self.attempt,
            delay,
        });
        if self.attempt < self.bus.inner.max_deliver {
            let MemoryAcker {
                bus,
                key,
                envelope,
                attempt,
            } = *self;
            bus.redeliver(key, envelope, attempt + 1, delay);
        }
        Ok(())
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, envelope: Envelope) -> Result<(), BusError> {
        let topic = envelope.topic().ok_or(BusError::MissingTopic)?.to_string();
        let failing = self
            .inner
            .failing_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(BusError::Publish {
                topic,
                error: "injected failure".to_string(),
            });
        }
        lock(&self.inner.published).push(envelope.clone());
        self.deliver(envelope)
    }

    async fn subscribe(&self, topic: &str, group: &str) -> Result<DeliveryStream, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner.subscriptions).insert((topic.to_string(), group.to_string()), tx);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|delivery| (delivery, rx))
        });
        Ok(stream.boxed())
    }

    async fn subscribe_broadcast(&self, topic: &str) -> Result<DeliveryStream, BusError> {
        let group = format!("broadcast-{}", Uuid::new_v4().simple());
        self.subscribe(topic, &group).await
    }

    async fn create_stream(&self, _name: &str, _subjects: &[String]) -> Result<(), BusError> {
        Ok(())
    }

    fn health(&self) -> BusHealth {
        if self.inner.connected.load(Ordering::SeqCst) {
            BusHealth::Connected
        } else {
            BusHealth::Disconnected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::create_new;

    fn envelope(topic: &str) -> Envelope {
        create_new(&serde_json::json!({"guild_id": "G1"}), topic).unwrap()
    }

    #[tokio::test]
    async fn publish_records_and_delivers_to_subscribers() {
        let bus = InMemoryBus::default();
        let mut stream = bus.subscribe("a", "g").await.unwrap();

        bus.publish(envelope("a")).await.unwrap();
        bus.publish(envelope("b")).await.unwrap();

        let delivery = stream.next().await.unwrap();
        assert_eq!(delivery.envelope.topic(), Some("a"));
        assert_eq!(delivery.attempt, 1);
        assert_eq!(bus.published().len(), 2);
        assert_eq!(bus.published_on("b").len(), 1);
    }

    #[tokio::test]
    async fn deliver_does_not_record_a_publish() {
        let bus = InMemoryBus::default();
        let mut stream = bus.subscribe("a", "g").await.unwrap();
        bus.deliver(envelope("a")).unwrap();
        assert!(stream.next().await.is_some());
        assert!(bus.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn nack_redelivers_until_max_deliver() {
        let bus = InMemoryBus::new(2);
        let mut stream = bus.subscribe("a", "g").await.unwrap();
        let sent = envelope("a");
        let id = sent.uuid();
        bus.deliver(sent).unwrap();

        let first = stream.next().await.unwrap();
        first.nack(Duration::from_millis(10)).await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!(second.attempt, 2);
        assert_eq!(second.envelope.uuid(), id);
        second.nack(Duration::from_millis(10)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(bus.settlements_for(id).len(), 2);
        let pending = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(pending.is_err(), "no third delivery expected");
    }

    #[tokio::test]
    async fn ack_is_recorded() {
        let bus = InMemoryBus::default();
        let mut stream = bus.subscribe("a", "g").await.unwrap();
        bus.deliver(envelope("a")).unwrap();
        let delivery = stream.next().await.unwrap();
        let id = delivery.envelope.uuid();
        delivery.ack().await.unwrap();
        assert_eq!(
            bus.settlements(),
            vec![AckEvent::Ack {
                message_id: id,
                attempt: 1
            }]
        );
    }

    #[tokio::test]
    async fn injected_publish_failures_are_consumed() {
        let bus = InMemoryBus::default();
        bus.fail_next_publishes(1);
        assert!(bus.publish(envelope("a")).await.is_err());
        assert!(bus.publish(envelope("a")).await.is_ok());
        assert_eq!(bus.published().len(), 1);
    }

    #[tokio::test]
    async fn broadcast_subscribers_each_receive_every_message() {
        let bus = InMemoryBus::default();
        let mut shared = bus.subscribe("a", "g").await.unwrap();
        let mut first = bus.subscribe_broadcast("a").await.unwrap();
        let mut second = bus.subscribe_broadcast("a").await.unwrap();

        bus.deliver(envelope("a")).unwrap();

        assert!(shared.next().await.is_some());
        assert!(first.next().await.is_some());
        assert!(second.next().await.is_some());
    }

    #[test]
    fn health_follows_connected_flag() {
        let bus = InMemoryBus::default();
        assert_eq!(bus.health(), BusHealth::Connected);
        bus.set_connected(false);
        assert_eq!(bus.health(), BusHealth::Disconnected);
    }
}
