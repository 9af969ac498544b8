use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use leaderboard_nats::envelope::create_new;
use leaderboard_nats::topics::guild;
use leaderboard_nats::EventBus;
use leaderboard_types::{
    GuildConfig, GuildConfigRetrievalFailedPayload, GuildConfigRetrievalRequestedPayload,
    GuildConfigRetrievedPayload, GuildConfigUpdatedPayload, metadata,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::LeaderboardError;
use crate::guild_config::{CachedGuildConfig, GuildConfigCache};
use crate::render::sanitize_reason;
use crate::router::{HandlerResult, MessageContext};
use crate::telemetry::Metrics;

type Resolution = Result<Arc<CachedGuildConfig>, String>;

struct Inflight {
    tx: watch::Sender<Option<Resolution>>,
    started: Instant,
}

/// Resolves guild configs through the cache, asking the backend on a miss.
///
/// Concurrent misses for one guild share a single backend request. Waiters
/// give up after `timeout`; a request older than that is considered lost and
/// the next caller issues a fresh one.
pub struct GuildConfigResolver {
    cache: Arc<GuildConfigCache>,
    bus: Arc<dyn EventBus>,
    inflight: Mutex<HashMap<String, Inflight>>,
    timeout: Duration,
    metrics: Metrics,
}

impl GuildConfigResolver {
    pub fn new(cache: Arc<GuildConfigCache>, bus: Arc<dyn EventBus>, timeout: Duration, metrics: Metrics) -> Self {
        Self {
            cache,
            bus,
            inflight: Mutex::new(HashMap::new()),
            timeout,
            metrics,
        }
    }

    pub fn cache(&self) -> &Arc<GuildConfigCache> {
        &self.cache
    }

    fn inflight(&self) -> MutexGuard<'_, HashMap<String, Inflight>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the in-flight request for `guild_id` or start one. The bool is
    /// true when the caller must publish the request.
    fn join(&self, guild_id: &str) -> (watch::Receiver<Option<Resolution>>, bool) {
        let mut inflight = self.inflight();
        if let Some(existing) = inflight.get(guild_id)
            && existing.started.elapsed() < self.timeout
        {
            return (existing.tx.subscribe(), false);
        }
        let (tx, rx) = watch::channel(None);
        inflight.insert(
            guild_id.to_string(),
            Inflight {
                tx,
                started: Instant::now(),
            },
        );
        (rx, true)
    }

    fn abandon(&self, guild_id: &str) {
        self.inflight().remove(guild_id);
    }

    /// Forget the request for `guild_id` once its window has passed. A newer
    /// request started by another caller is left alone.
    fn expire(&self, guild_id: &str) {
        let mut inflight = self.inflight();
        if inflight
            .get(guild_id)
            .is_some_and(|f| f.started.elapsed() >= self.timeout)
        {
            inflight.remove(guild_id);
        }
    }

    async fn request(&self, guild_id: &str) -> Result<(), LeaderboardError> {
        let envelope = create_new(
            &GuildConfigRetrievalRequestedPayload {
                guild_id: guild_id.to_string(),
            },
            guild::CONFIG_RETRIEVAL_REQUESTED,
        )?
        .with_metadata(metadata::GUILD_ID, guild_id);
        debug!(guild_id, "Requesting guild config");
        self.bus.publish(envelope).await?;
        Ok(())
    }

    /// Cached config, or the backend's answer within the timeout.
    pub async fn get_with_context(
        &self,
        cancel: &CancellationToken,
        guild_id: &str,
    ) -> Result<Arc<CachedGuildConfig>, LeaderboardError> {
        if let Some(hit) = self.cache.get(guild_id) {
            self.metrics.record_config_request("cache_hit");
            return Ok(hit);
        }

        let unavailable = || LeaderboardError::ConfigUnavailable {
            guild_id: guild_id.to_string(),
        };

        let (mut rx, leader) = self.join(guild_id);
        if leader && let Err(e) = self.request(guild_id).await {
            warn!(guild_id, error = %e, "Failed to request guild config");
            self.abandon(guild_id);
            self.metrics.record_config_request("publish_failed");
            return Err(unavailable());
        }

        let waited = tokio::select! {
            _ = cancel.cancelled() => return Err(LeaderboardError::Cancelled),
            waited = tokio::time::timeout(self.timeout, rx.wait_for(Option::is_some)) => waited,
        };
        let resolution = match waited {
            Ok(Ok(value)) => value.clone(),
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(guild_id, timeout_ms = self.timeout.as_millis() as u64, "Guild config request timed out");
                self.expire(guild_id);
                self.metrics.record_config_request("timeout");
                return Err(unavailable());
            }
        };

        match resolution {
            Some(Ok(config)) => {
                self.metrics.record_config_request("resolved");
                Ok(config)
            }
            Some(Err(reason)) => {
                self.metrics.record_config_request("backend_error");
                Err(LeaderboardError::Backend(reason))
            }
            None => Err(unavailable()),
        }
    }

    pub async fn is_setup_complete(&self, cancel: &CancellationToken, guild_id: &str) -> Result<bool, LeaderboardError> {
        Ok(self
            .get_with_context(cancel, guild_id)
            .await?
            .config
            .setup_complete)
    }

    /// Complete the in-flight request for `guild_id`, caching a successful
    /// config even when nobody is waiting.
    pub fn resolve(&self, guild_id: &str, result: Result<GuildConfig, String>) {
        let resolution = result.map(|config| self.cache.put(config));
        if let Some(inflight) = self.inflight().remove(guild_id) {
            inflight.tx.send_replace(Some(resolution));
        }
    }

    pub async fn handle_retrieved(&self, ctx: MessageContext, payload: GuildConfigRetrievedPayload) -> HandlerResult {
        let guild_id = checked_guild(&ctx, &payload.guild_id, &payload.config)?;
        debug!(guild_id, setup_complete = payload.config.setup_complete, "Guild config retrieved");
        self.resolve(guild_id, Ok(payload.config));
        Ok(vec![])
    }

    pub async fn handle_retrieval_failed(&self, ctx: MessageContext, payload: GuildConfigRetrievalFailedPayload) -> HandlerResult {
        if payload.guild_id.trim().is_empty() {
            return Err(LeaderboardError::invalid_event(&ctx.topic, "missing guild_id"));
        }
        let reason = sanitize_reason(&payload.reason);
        warn!(guild_id = %payload.guild_id, reason = %reason, "Guild config retrieval failed");
        self.resolve(&payload.guild_id, Err(reason));
        Ok(vec![])
    }

    pub async fn handle_updated(&self, ctx: MessageContext, payload: GuildConfigUpdatedPayload) -> HandlerResult {
        let guild_id = checked_guild(&ctx, &payload.guild_id, &payload.config)?;
        info!(guild_id, setup_complete = payload.config.setup_complete, "Guild config updated");
        self.resolve(guild_id, Ok(payload.config));
        Ok(vec![])
    }
}

fn checked_guild<'a>(ctx: &MessageContext, guild_id: &'a str, config: &GuildConfig) -> Result<&'a str, LeaderboardError> {
    if guild_id.trim().is_empty() {
        return Err(LeaderboardError::invalid_event(&ctx.topic, "missing guild_id"));
    }
    if config.guild_id != guild_id {
        return Err(LeaderboardError::invalid_event(
            &ctx.topic,
            format!("config for {} delivered as {}", config.guild_id, guild_id),
        ));
    }
    Ok(guild_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::telemetry::metrics::testing::MetricsHarness;
    use leaderboard_nats::InMemoryBus;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn config(guild: &str, complete: bool) -> GuildConfig {
        GuildConfig {
            guild_id: guild.to_string(),
            leaderboard_channel_id: Some("500".to_string()),
            signup_channel_id: None,
            setup_complete: complete,
        }
    }

    fn resolver() -> (Arc<GuildConfigResolver>, InMemoryBus, MetricsHarness) {
        let bus = InMemoryBus::default();
        let harness = MetricsHarness::new();
        let resolver = GuildConfigResolver::new(
            Arc::new(GuildConfigCache::new()),
            Arc::new(bus.clone()),
            TIMEOUT,
            harness.metrics.clone(),
        );
        (Arc::new(resolver), bus, harness)
    }

    async fn answer_once_requested(resolver: &GuildConfigResolver, bus: &InMemoryBus, result: Result<GuildConfig, String>) {
        while bus.published_on(guild::CONFIG_RETRIEVAL_REQUESTED).is_empty() {
            tokio::task::yield_now().await;
        }
        resolver.resolve("G1", result);
    }

    #[tokio::test]
    async fn cache_hit_skips_the_backend() {
        let (resolver, bus, harness) = resolver();
        resolver.cache().put(config("G1", true));

        let got = resolver
            .get_with_context(&CancellationToken::new(), "G1")
            .await
            .unwrap();
        assert!(got.config.setup_complete);
        assert!(bus.published().is_empty());
        assert_eq!(
            harness.counter("leaderboard.guild_config.requests", Some(("outcome", "cache_hit"))),
            1
        );
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_request() {
        let (resolver, bus, _) = resolver();
        let cancel = CancellationToken::new();

        let (a, b, ()) = tokio::join!(
            resolver.get_with_context(&cancel, "G1"),
            resolver.get_with_context(&cancel, "G1"),
            answer_once_requested(&resolver, &bus, Ok(config("G1", true))),
        );

        assert_eq!(a.unwrap().config, config("G1", true));
        assert_eq!(b.unwrap().config, config("G1", true));
        let requests = bus.published_on(guild::CONFIG_RETRIEVAL_REQUESTED);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].guild_id(), Some("G1"));
        assert!(resolver.cache().get("G1").is_some());
    }

    #[tokio::test]
    async fn backend_failure_reaches_every_waiter() {
        let (resolver, bus, _) = resolver();
        let cancel = CancellationToken::new();

        let (a, b, ()) = tokio::join!(
            resolver.get_with_context(&cancel, "G1"),
            resolver.is_setup_complete(&cancel, "G1"),
            answer_once_requested(&resolver, &bus, Err("no such guild".to_string())),
        );

        assert!(matches!(a, Err(LeaderboardError::Backend(ref r)) if r == "no such guild"));
        assert_eq!(b.unwrap_err().kind(), ErrorKind::Backend);
        assert!(resolver.cache().get("G1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn silence_times_out_as_config_unavailable() {
        let (resolver, bus, harness) = resolver();

        let err = resolver
            .get_with_context(&CancellationToken::new(), "G1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigUnavailable);
        assert_eq!(
            harness.counter("leaderboard.guild_config.requests", Some(("outcome", "timeout"))),
            1
        );

        // A later caller after the window asks again.
        let _ = resolver
            .get_with_context(&CancellationToken::new(), "G1")
            .await;
        assert_eq!(bus.published_on(guild::CONFIG_RETRIEVAL_REQUESTED).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_request_is_forgotten() {
        let (resolver, bus, _) = resolver();
        let cancel = CancellationToken::new();

        let err = resolver.get_with_context(&cancel, "G1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigUnavailable);
        assert!(!resolver.inflight().contains_key("G1"));

        // A late answer finds nobody waiting but still fills the cache.
        resolver.resolve("G1", Ok(config("G1", true)));
        assert!(resolver.inflight().is_empty());
        assert!(resolver.cache().get("G1").is_some());
        assert_eq!(bus.published_on(guild::CONFIG_RETRIEVAL_REQUESTED).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_keeps_a_newer_request() {
        let (resolver, _, _) = resolver();
        let (_rx, leader) = resolver.join("G1");
        assert!(leader);
        tokio::time::advance(TIMEOUT / 2).await;

        resolver.expire("G1");
        assert!(resolver.inflight().contains_key("G1"));

        tokio::time::advance(TIMEOUT).await;
        resolver.expire("G1");
        assert!(!resolver.inflight().contains_key("G1"));
    }

    #[tokio::test]
    async fn publish_failure_is_config_unavailable() {
        let (resolver, bus, _) = resolver();
        bus.fail_next_publishes(1);
        let err = resolver
            .get_with_context(&CancellationToken::new(), "G1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigUnavailable);
    }

    #[tokio::test]
    async fn cancellation_wins_over_waiting() {
        let (resolver, _, _) = resolver();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = resolver.get_with_context(&cancel, "G1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn updated_event_refreshes_cache() {
        let (resolver, _, _) = resolver();
        resolver.cache().put(config("G1", false));

        let ctx = MessageContext::for_test(guild::CONFIG_UPDATED, None);
        resolver
            .handle_updated(
                ctx,
                GuildConfigUpdatedPayload {
                    guild_id: "G1".to_string(),
                    config: config("G1", true),
                },
            )
            .await
            .unwrap();
        assert!(resolver.cache().get("G1").unwrap().config.setup_complete);
    }

    #[tokio::test]
    async fn mismatched_config_is_rejected() {
        let (resolver, _, _) = resolver();
        let ctx = MessageContext::for_test(guild::CONFIG_RETRIEVED, None);
        let err = resolver
            .handle_retrieved(
                ctx,
                GuildConfigRetrievedPayload {
                    guild_id: "G1".to_string(),
                    config: config("G2", true),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadPayload);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn failure_reason_is_sanitized() {
        let (resolver, bus, _) = resolver();
        let cancel = CancellationToken::new();
        let failing = async {
            while bus.published_on(guild::CONFIG_RETRIEVAL_REQUESTED).is_empty() {
                tokio::task::yield_now().await;
            }
            resolver
                .handle_retrieval_failed(
                    MessageContext::for_test(guild::CONFIG_RETRIEVAL_FAILED, None),
                    GuildConfigRetrievalFailedPayload {
                        guild_id: "G1".to_string(),
                        reason: "`db` unreachable".to_string(),
                    },
                )
                .await
                .unwrap();
        };
        let (result, ()) = tokio::join!(resolver.get_with_context(&cancel, "G1"), failing);
        assert!(matches!(result, Err(LeaderboardError::Backend(ref r)) if r == "db unreachable"));
    }
}
