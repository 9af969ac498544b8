//! JetStream-backed [`EventBus`].
//!
//! Each (group, topic) pair binds a durable pull consumer with explicit acks,
//! so replicas sharing a group load-balance and unacked messages come back
//! after `ack_wait`.

use std::time::Duration;

use async_nats::Client;
use async_nats::header::HeaderMap;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy, pull};
use async_nats::jetstream::{self, AckKind, stream};
use async_trait::async_trait;
use futures::StreamExt;
use leaderboard_types::metadata;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bus::{Acker, BusHealth, Delivery, DeliveryStream, EventBus};
use crate::envelope::{Envelope, Metadata};
use crate::error::BusError;
use crate::topics;
use crate::trace::inject_trace_context;

/// Header JetStream uses for publish deduplication.
pub const MSG_ID_HEADER: &str = "Nats-Msg-Id";

const DUPLICATE_WINDOW: Duration = Duration::from_secs(120);

/// Ephemeral broadcast consumers are reaped this long after their replica
/// stops pulling.
const BROADCAST_INACTIVE_THRESHOLD: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct JetStreamBus {
    client: Client,
    context: jetstream::Context,
    ack_wait: Duration,
    max_deliver: i64,
}

impl JetStreamBus {
    /// `max_redeliveries` is the number of redeliveries after the first
    /// delivery; JetStream stops after `max_redeliveries + 1` attempts.
    pub fn new(client: Client, ack_wait: Duration, max_redeliveries: u32) -> Self {
        let context = jetstream::new(client.clone());
        Self {
            client,
            context,
            ack_wait,
            max_deliver: i64::from(max_redeliveries) + 1,
        }
    }

    pub fn context(&self) -> &jetstream::Context {
        &self.context
    }

    async fn stream_for(&self, topic: &str) -> Result<stream::Stream, BusError> {
        let stream_name = self
            .context
            .stream_by_subject(topic)
            .await
            .map_err(|e| subscribe_err(topic, e))?;
        self.context
            .get_stream(&stream_name)
            .await
            .map_err(|e| subscribe_err(topic, e))
    }
}

fn subscribe_err(topic: &str, error: impl std::fmt::Display) -> BusError {
    BusError::Subscribe {
        topic: topic.to_string(),
        error: error.to_string(),
    }
}

async fn deliveries(
    topic: &str,
    consumer: jetstream::consumer::Consumer<pull::Config>,
) -> Result<DeliveryStream, BusError> {
    let messages = consumer
        .messages()
        .await
        .map_err(|e| subscribe_err(topic, e))?;

    let topic = topic.to_string();
    let deliveries = messages.filter_map(move |item| {
        let topic = topic.clone();
        async move {
            match item {
                Ok(message) => Some(to_delivery(message)),
                Err(e) => {
                    warn!(topic = %topic, error = %e, "JetStream pull failed");
                    None
                }
            }
        }
    });
    Ok(deliveries.boxed())
}

fn to_headers(envelope: &Envelope) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (key, value) in envelope.metadata() {
        headers.insert(key.as_str(), value.as_str());
    }
    headers.insert(MSG_ID_HEADER, envelope.uuid().to_string().as_str());
    inject_trace_context(&mut headers);
    headers
}

fn to_delivery(message: jetstream::Message) -> Delivery {
    let attempt = message
        .info()
        .map(|info| u32::try_from(info.delivered.max(1)).unwrap_or(u32::MAX))
        .unwrap_or(1);

    let mut meta = Metadata::new();
    if let Some(headers) = message.headers.as_ref() {
        for (name, values) in headers.iter() {
            if let Some(value) = values.first() {
                meta.insert(name.to_string(), value.as_str().to_string());
            }
        }
    }
    let uuid = meta
        .remove(MSG_ID_HEADER)
        .and_then(|id| Uuid::parse_str(&id).ok())
        .unwrap_or_else(Uuid::new_v4);
    meta.entry(metadata::TOPIC.to_string())
        .or_insert_with(|| message.subject.to_string());

    let envelope = Envelope::new(uuid, message.payload.clone(), meta);
    Delivery::new(envelope, attempt, Box::new(JetStreamAcker { message }))
}

struct JetStreamAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acker for JetStreamAcker {
    async fn ack(self: Box<Self>) -> Result<(), BusError> {
        self.message
            .ack()
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }

    async fn nack(self: Box<Self>, delay: Duration) -> Result<(), BusError> {
        self.message
            .ack_with(AckKind::Nak(Some(delay)))
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }
}

#[async_trait]
impl EventBus for JetStreamBus {
    async fn publish(&self, envelope: Envelope) -> Result<(), BusError> {
        let topic = envelope.topic().ok_or(BusError::MissingTopic)?.to_string();
        let headers = to_headers(&envelope);

        let ack = self
            .context
            .publish_with_headers(topic.clone(), headers, envelope.payload().clone())
            .await
            .map_err(|e| BusError::Publish {
                topic: topic.clone(),
                error: e.to_string(),
            })?;
        ack.await.map_err(|e| BusError::Publish {
            topic: topic.clone(),
            error: e.to_string(),
        })?;

        debug!(topic = %topic, message_id = %envelope.uuid(), "Published envelope");
        Ok(())
    }

    async fn subscribe(&self, topic: &str, group: &str) -> Result<DeliveryStream, BusError> {
        let stream = self.stream_for(topic).await?;
        let durable = topics::durable_name(group, topic);
        let consumer: jetstream::consumer::Consumer<pull::Config> = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    filter_subject: topic.to_string(),
                    ack_policy: AckPolicy::Explicit,
                    deliver_policy: DeliverPolicy::New,
                    ack_wait: self.ack_wait,
                    max_deliver: self.max_deliver,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| subscribe_err(topic, e))?;
        deliveries(topic, consumer).await
    }

    async fn subscribe_broadcast(&self, topic: &str) -> Result<DeliveryStream, BusError> {
        let stream = self.stream_for(topic).await?;
        let consumer: jetstream::consumer::Consumer<pull::Config> = stream
            .create_consumer(pull::Config {
                filter_subject: topic.to_string(),
                ack_policy: AckPolicy::Explicit,
                deliver_policy: DeliverPolicy::New,
                ack_wait: self.ack_wait,
                max_deliver: self.max_deliver,
                inactive_threshold: BROADCAST_INACTIVE_THRESHOLD,
                ..Default::default()
            })
            .await
            .map_err(|e| subscribe_err(topic, e))?;
        deliveries(topic, consumer).await
    }

    async fn create_stream(&self, name: &str, subjects: &[String]) -> Result<(), BusError> {
        self.context
            .get_or_create_stream(stream::Config {
                name: name.to_string(),
                subjects: subjects.to_vec(),
                duplicate_window: DUPLICATE_WINDOW,
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::Stream(format!("{}: {}", name, e)))?;
        debug!(stream = name, ?subjects, "Stream ready");
        Ok(())
    }

    fn health(&self) -> BusHealth {
        match self.client.connection_state() {
            async_nats::connection::State::Connected => BusHealth::Connected,
            _ => BusHealth::Disconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::create_new;

    const NATS_URL: &str = "nats://localhost:14222";

    async fn try_connect() -> Option<Client> {
        async_nats::connect(NATS_URL).await.ok()
    }

    #[tokio::test]
    async fn publish_subscribe_roundtrip_preserves_envelope() {
        let Some(client) = try_connect().await else {
            eprintln!("SKIP: NATS not available");
            return;
        };
        let bus = JetStreamBus::new(client, Duration::from_secs(5), 3);
        let suffix = Uuid::new_v4().simple().to_string();
        let subject = format!("test.leaderboard.{}", suffix);
        bus.create_stream(&format!("TEST_{}", suffix), std::slice::from_ref(&subject))
            .await
            .unwrap();

        let mut deliveries = bus.subscribe(&subject, "test-group").await.unwrap();
        let sent = create_new(&serde_json::json!({"guild_id": "G1"}), &subject)
            .unwrap()
            .with_metadata(metadata::GUILD_ID, "G1");
        bus.publish(sent.clone()).await.unwrap();

        let delivery = tokio::time::timeout(Duration::from_secs(5), deliveries.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.attempt, 1);
        assert_eq!(delivery.envelope.uuid(), sent.uuid());
        assert_eq!(delivery.envelope.correlation_id(), sent.correlation_id());
        assert_eq!(delivery.envelope.guild_id(), Some("G1"));
        assert_eq!(delivery.envelope.payload(), sent.payload());
        delivery.ack().await.unwrap();
    }

    #[test]
    fn headers_carry_metadata_and_message_id() {
        let envelope = create_new(&serde_json::json!({"guild_id": "G1"}), "leaderboard.tag.assigned")
            .unwrap()
            .with_metadata(metadata::GUILD_ID, "G1");
        let headers = to_headers(&envelope);

        assert_eq!(
            headers.get(MSG_ID_HEADER).map(|v| v.as_str()),
            Some(envelope.uuid().to_string().as_str())
        );
        assert_eq!(
            headers.get(metadata::TOPIC).map(|v| v.as_str()),
            Some("leaderboard.tag.assigned")
        );
        assert_eq!(headers.get(metadata::GUILD_ID).map(|v| v.as_str()), Some("G1"));
        assert_eq!(
            headers.get(metadata::CORRELATION_ID).map(|v| v.as_str()),
            envelope.correlation_id()
        );
    }
}
