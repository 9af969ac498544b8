//! Dispatcher middleware. Each layer wraps the next [`HandlerFn`]; the first
//! registered layer is the outermost.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use leaderboard_nats::{Envelope, RetryPolicy};
use leaderboard_types::metadata;
use serde::Deserialize;
use tracing::{Instrument, debug, error, field, info_span, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::errors::LeaderboardError;
use crate::router::{HandlerFn, MessageContext};
use crate::telemetry::Metrics;

pub const DOMAIN: &str = "leaderboard";

pub trait Middleware: Send + Sync {
    fn wrap(&self, next: HandlerFn) -> HandlerFn;
}

/// One span per delivery, parented on the publisher's trace context.
pub struct Tracing;

impl Middleware for Tracing {
    fn wrap(&self, next: HandlerFn) -> HandlerFn {
        Arc::new(move |ctx: MessageContext, envelope: Envelope| {
            let span = info_span!(
                "handle_message",
                handler = ctx.handler,
                topic = %ctx.topic,
                message_id = %ctx.message_id,
                attempt = ctx.attempt,
                correlation_id = field::Empty,
                guild_id = field::Empty,
            );
            if let Some(correlation_id) = envelope.correlation_id() {
                span.record("correlation_id", correlation_id);
            }
            if let Some(guild_id) = envelope.guild_id() {
                span.record("guild_id", guild_id);
            }
            let _ = span.set_parent(leaderboard_nats::trace::extract_trace_context(envelope.metadata()));

            let next = next.clone();
            async move {
                let started = Instant::now();
                let result = next(ctx, envelope).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                match &result {
                    Ok(results) => debug!(results = results.len(), elapsed_ms, "Handler succeeded"),
                    Err(e) => debug!(error = %e, kind = e.kind().as_str(), elapsed_ms, "Handler failed"),
                }
                result
            }
            .instrument(span)
            .boxed()
        })
    }
}

/// Turns a handler panic into a terminal error and counts it.
pub struct Recoverer {
    metrics: Metrics,
}

impl Recoverer {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Middleware for Recoverer {
    fn wrap(&self, next: HandlerFn) -> HandlerFn {
        let metrics = self.metrics.clone();
        Arc::new(move |ctx: MessageContext, envelope: Envelope| {
            let next = next.clone();
            let metrics = metrics.clone();
            let handler = ctx.handler;
            let topic = ctx.topic.clone();
            async move {
                match AssertUnwindSafe(async move { next(ctx, envelope).await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(handler, topic = %topic, panic = %message, "Handler panicked");
                        metrics.record_panic(handler);
                        Err(LeaderboardError::Panic(message))
                    }
                }
            }
            .boxed()
        })
    }
}

/// Establishes the correlation ID exactly once and carries it onto every
/// result.
pub struct CorrelationId;

impl Middleware for CorrelationId {
    fn wrap(&self, next: HandlerFn) -> HandlerFn {
        Arc::new(move |mut ctx: MessageContext, envelope: Envelope| {
            if ctx.correlation_id().is_none() {
                let id = match envelope.correlation_id() {
                    Some(id) => id.to_string(),
                    None => {
                        let minted = Uuid::new_v4().to_string();
                        debug!(topic = %ctx.topic, correlation_id = %minted, "Inbound message had no correlation ID");
                        minted
                    }
                };
                ctx.set_correlation_id(id);
            }
            let correlation_id = ctx.correlation_id().map(str::to_owned);
            let next = next.clone();
            async move {
                let mut results = next(ctx, envelope).await?;
                if let Some(correlation_id) = correlation_id {
                    for result in &mut results {
                        result
                            .metadata
                            .entry(metadata::CORRELATION_ID.to_string())
                            .or_insert_with(|| correlation_id.clone());
                    }
                }
                Ok(results)
            }
            .boxed()
        })
    }
}

/// Stamps topic, handler name and receive time.
pub struct CommonMetadata;

impl Middleware for CommonMetadata {
    fn wrap(&self, next: HandlerFn) -> HandlerFn {
        Arc::new(move |mut ctx: MessageContext, envelope: Envelope| {
            ctx.metadata
                .entry(metadata::TOPIC.to_string())
                .or_insert_with(|| ctx.topic.clone());
            ctx.metadata
                .insert(metadata::HANDLER_NAME.to_string(), ctx.handler.to_string());
            ctx.metadata
                .insert(metadata::RECEIVED_AT.to_string(), Utc::now().to_rfc3339());
            next(ctx, envelope)
        })
    }
}

#[derive(Deserialize)]
struct GuildPeek {
    #[serde(default)]
    guild_id: Option<String>,
}

/// Resolves the tenant from metadata, falling back to the payload's
/// `guild_id`, and makes sure results carry it.
pub struct GuildMetadata;

impl Middleware for GuildMetadata {
    fn wrap(&self, next: HandlerFn) -> HandlerFn {
        Arc::new(move |mut ctx: MessageContext, envelope: Envelope| {
            let guild_id = envelope
                .guild_id()
                .map(str::to_owned)
                .filter(|g| !g.is_empty())
                .or_else(|| {
                    serde_json::from_slice::<GuildPeek>(envelope.payload())
                        .ok()
                        .and_then(|peek| peek.guild_id)
                        .filter(|g| !g.is_empty())
                });
            if let Some(guild_id) = &guild_id {
                ctx.metadata
                    .insert(metadata::GUILD_ID.to_string(), guild_id.clone());
            }
            ctx.guild_id = guild_id.clone();

            let next = next.clone();
            async move {
                let mut results = next(ctx, envelope).await?;
                if let Some(guild_id) = guild_id {
                    for result in &mut results {
                        result
                            .metadata
                            .entry(metadata::GUILD_ID.to_string())
                            .or_insert_with(|| guild_id.clone());
                    }
                }
                Ok(results)
            }
            .boxed()
        })
    }
}

/// Marks the domain and which handler produced each result.
pub struct RoutingMetadata;

impl Middleware for RoutingMetadata {
    fn wrap(&self, next: HandlerFn) -> HandlerFn {
        Arc::new(move |mut ctx: MessageContext, envelope: Envelope| {
            ctx.metadata
                .insert(metadata::DOMAIN.to_string(), DOMAIN.to_string());
            let handler = ctx.handler;
            let next = next.clone();
            async move {
                let mut results = next(ctx, envelope).await?;
                for result in &mut results {
                    result
                        .metadata
                        .insert(metadata::DOMAIN.to_string(), DOMAIN.to_string());
                    result
                        .metadata
                        .insert(metadata::SOURCE.to_string(), handler.to_string());
                }
                Ok(results)
            }
            .boxed()
        })
    }
}

/// Bounds redelivery: a transient failure on the last allowed attempt
/// becomes terminal so the dispatcher acks it.
pub struct Retry {
    policy: RetryPolicy,
}

impl Retry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl Middleware for Retry {
    fn wrap(&self, next: HandlerFn) -> HandlerFn {
        let policy = self.policy;
        Arc::new(move |ctx: MessageContext, envelope: Envelope| {
            let attempt = ctx.attempt;
            let topic = ctx.topic.clone();
            let next = next.clone();
            async move {
                match next(ctx, envelope).await {
                    Err(e) if e.kind().is_retryable() && !policy.allows_retry_after(attempt) => {
                        error!(topic = %topic, attempt, error = %e, "Retries exhausted, dropping message");
                        Err(LeaderboardError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(e),
                        })
                    }
                    Err(e) if e.kind().is_retryable() => {
                        warn!(
                            topic = %topic,
                            attempt,
                            max_retries = policy.max_retries,
                            delay_ms = policy.delay_for(attempt).as_millis() as u64,
                            error = %e,
                            "Transient failure, scheduling redelivery"
                        );
                        Err(e)
                    }
                    other => other,
                }
            }
            .boxed()
        })
    }
}
