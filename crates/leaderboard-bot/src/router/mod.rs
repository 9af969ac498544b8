//! Typed message dispatcher.
//!
//! Handlers are registered per topic with their payload type. Each delivery
//! runs through the middleware chain; results are staged and only published
//! once the handler returned successfully, then the delivery is settled:
//!
//! - success, undecodable payload, cancellation, panic, terminal error → ack
//! - transient error within the retry budget → nack with backoff

mod context;
pub mod middleware;


use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use leaderboard_nats::envelope::{self, Envelope};
use leaderboard_nats::{BusError, Delivery, EventBus, RetryPolicy};
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use context::{HandlerResult, MessageContext, OutboundResult};
use middleware::Middleware;

use crate::errors::{ErrorKind, LeaderboardError};
use crate::telemetry::Metrics;

pub type HandlerFn =
    Arc<dyn Fn(MessageContext, Envelope) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Consumer group shared by replicas, `leaderboard-handlers-<env>`.
    pub group: String,
    /// Concurrent deliveries in flight per subject.
    pub consumers: usize,
    /// Redelivery budget and backoff for transient handler failures.
    pub retry: RetryPolicy,
    /// In-process retries when publishing results.
    pub publish_retry: RetryPolicy,
    /// Per-delivery deadline; matches the bus redelivery window.
    pub deadline: Duration,
}

impl DispatcherSettings {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            consumers: 8,
            retry: RetryPolicy::standard(),
            publish_retry: RetryPolicy {
                max_retries: 2,
                initial_retry_delay: Duration::from_millis(100),
            },
            deadline: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subscription {
    /// Load-balanced across the consumer group.
    Shared,
    /// Every replica sees every message.
    Broadcast,
}

struct Route {
    name: &'static str,
    topic: &'static str,
    subscription: Subscription,
    handler: HandlerFn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Ack(&'static str),
    Nack(Duration),
}

pub struct Router {
    bus: Arc<dyn EventBus>,
    settings: DispatcherSettings,
    metrics: Metrics,
    routes: Vec<Route>,
    middleware: Vec<Arc<dyn Middleware>>,
}

fn typed<P, F, Fut>(handler: F) -> HandlerFn
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(MessageContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |ctx: MessageContext, envelope: Envelope| {
        let handler = handler.clone();
        Box::pin(async move {
            let payload: P = envelope::unmarshal(&envelope)?;
            handler(ctx, payload).await
        }) as BoxFuture<'static, HandlerResult>
    })
}

impl Router {
    pub fn new(bus: Arc<dyn EventBus>, settings: DispatcherSettings, metrics: Metrics) -> Self {
        Self {
            bus,
            settings,
            metrics,
            routes: Vec::new(),
            middleware: Vec::new(),
        }
    }

    /// Tracing, panic recovery, correlation, common, guild and routing
    /// metadata, retry; outermost first.
    pub fn with_standard_middleware(mut self) -> Self {
        self.add_middleware(middleware::Tracing);
        self.add_middleware(middleware::Recoverer::new(self.metrics.clone()));
        self.add_middleware(middleware::CorrelationId);
        self.add_middleware(middleware::CommonMetadata);
        self.add_middleware(middleware::GuildMetadata);
        self.add_middleware(middleware::RoutingMetadata);
        self.add_middleware(middleware::Retry::new(self.settings.retry));
        self
    }

    pub fn add_middleware(&mut self, middleware: impl Middleware + 'static) {
        self.middleware.push(Arc::new(middleware));
    }

    pub fn add_handler<P, F, Fut>(&mut self, name: &'static str, topic: &'static str, handler: F)
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(MessageContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.push(name, topic, Subscription::Shared, typed(handler));
    }

    /// Like [`Router::add_handler`], but every replica gets every message.
    pub fn add_broadcast_handler<P, F, Fut>(&mut self, name: &'static str, topic: &'static str, handler: F)
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(MessageContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.push(name, topic, Subscription::Broadcast, typed(handler));
    }

    fn push(&mut self, name: &'static str, topic: &'static str, subscription: Subscription, handler: HandlerFn) {
        if self.routes.iter().any(|r| r.topic == topic) {
            warn!(topic, handler = name, "Topic already has a handler; both will run");
        }
        self.routes.push(Route {
            name,
            topic,
            subscription,
            handler,
        });
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.routes.iter().map(|r| r.topic).collect()
    }

    fn chain(&self, handler: HandlerFn) -> HandlerFn {
        self.middleware
            .iter()
            .rev()
            .fold(handler, |next, middleware| middleware.wrap(next))
    }

    /// Subscribe every route and process deliveries until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BusError> {
        let router = Arc::new(self);
        let mut tasks = Vec::with_capacity(router.routes.len());

        for index in 0..router.routes.len() {
            let route = &router.routes[index];
            let stream = match route.subscription {
                Subscription::Shared => {
                    router
                        .bus
                        .subscribe(route.topic, &router.settings.group)
                        .await?
                }
                Subscription::Broadcast => router.bus.subscribe_broadcast(route.topic).await?,
            };
            let chain = router.chain(route.handler.clone());
            info!(
                topic = route.topic,
                handler = route.name,
                group = %router.settings.group,
                consumers = router.settings.consumers,
                "Subscribed"
            );

            let router = router.clone();
            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                let consumers = router.settings.consumers;
                let topic = router.routes[index].topic;
                stream
                    .take_until(shutdown.clone().cancelled_owned())
                    .for_each_concurrent(consumers, |delivery| {
                        let router = router.clone();
                        let chain = chain.clone();
                        let shutdown = shutdown.clone();
                        async move { router.process(index, &chain, delivery, &shutdown).await }
                    })
                    .await;
                debug!(topic, "Consumer loop stopped");
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Consumer task failed");
            }
        }
        info!("Dispatcher stopped");
        Ok(())
    }

    async fn process(&self, index: usize, chain: &HandlerFn, delivery: Delivery, shutdown: &CancellationToken) {
        let route = &self.routes[index];
        let envelope = delivery.envelope.clone();
        let attempt = delivery.attempt;
        let cancel = shutdown.child_token();
        let ctx = MessageContext::new(
            route.name,
            route.topic,
            &envelope,
            attempt,
            cancel.clone(),
            Instant::now() + self.settings.deadline,
        );
        let started = std::time::Instant::now();

        let result = tokio::select! {
            result = chain(ctx, envelope.clone()) => result,
            _ = cancel.cancelled() => Err(LeaderboardError::Cancelled),
            _ = tokio::time::sleep(self.settings.deadline) => {
                cancel.cancel();
                warn!(topic = route.topic, attempt, "Handler exceeded its deadline");
                Err(LeaderboardError::Cancelled)
            }
        };

        let disposition = match result {
            Ok(results) => match self.publish_results(&envelope, results).await {
                Ok(count) => {
                    debug!(topic = route.topic, published = count, "Delivery handled");
                    Disposition::Ack("success")
                }
                Err(e) => self.on_failure(route.topic, &e, attempt),
            },
            Err(e) => self.on_failure(route.topic, &e, attempt),
        };

        let (settled, outcome) = match disposition {
            Disposition::Ack(outcome) => (delivery.ack().await, outcome),
            Disposition::Nack(delay) => (delivery.nack(delay).await, "retry"),
        };
        if let Err(e) = settled {
            warn!(topic = route.topic, error = %e, "Failed to settle delivery");
        }
        self.metrics
            .record_message(route.topic, outcome, started.elapsed().as_secs_f64());
    }

    fn on_failure(&self, topic: &str, err: &LeaderboardError, attempt: u32) -> Disposition {
        match err.kind() {
            ErrorKind::BadPayload => {
                self.metrics.record_poison(topic);
                warn!(topic, error = %err, "Dropping message with bad payload");
                Disposition::Ack("poison")
            }
            ErrorKind::Cancelled => {
                debug!(topic, "Handler cancelled");
                Disposition::Ack("cancelled")
            }
            ErrorKind::Transient if self.settings.retry.allows_retry_after(attempt) => {
                Disposition::Nack(self.settings.retry.delay_for(attempt))
            }
            ErrorKind::Transient => {
                error!(topic, attempt, error = %err, "Retries exhausted, dropping message");
                Disposition::Ack("failed")
            }
            _ if matches!(err, LeaderboardError::Panic(_)) => Disposition::Ack("panic"),
            _ => {
                warn!(topic, kind = err.kind().as_str(), error = %err, "Handler failed");
                Disposition::Ack("failed")
            }
        }
    }

    /// Stage every result first so a serialization failure publishes none,
    /// then publish in order. Result IDs derive from the inbound message ID,
    /// so a redelivery re-publishes the same IDs and the bus deduplicates.
    async fn publish_results(&self, inbound: &Envelope, results: Vec<OutboundResult>) -> Result<usize, LeaderboardError> {
        let staged = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| stage(inbound, index, result))
            .collect::<Result<Vec<_>, _>>()?;

        let count = staged.len();
        for envelope in staged {
            let topic = envelope.topic().unwrap_or_default().to_string();
            self.settings
                .publish_retry
                .execute(|| self.bus.publish(envelope.clone()), &topic)
                .await?;
        }
        Ok(count)
    }
}

fn stage(inbound: &Envelope, index: usize, result: OutboundResult) -> Result<Envelope, LeaderboardError> {
    let mut staged = envelope::create_result(inbound, &result.payload, result.topic)?;
    for (key, value) in result.metadata {
        staged = staged.with_metadata(key, value);
    }
    let id = Uuid::new_v5(&inbound.uuid(), format!("{}#{}", result.topic, index).as_bytes());
    Ok(staged.with_uuid(id))
}
