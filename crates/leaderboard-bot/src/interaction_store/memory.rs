use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::interaction_store::{InteractionStore, StoreError, StoredInteraction};
use crate::telemetry::Metrics;

struct Entry {
    value: StoredInteraction,
    created_at: Instant,
}

/// Process-local store with a TTL and a size cap.
///
/// At capacity the oldest entry is evicted to make room and the saturation
/// counter is bumped.
pub struct MemoryInteractionStore<C: Clock = SystemClock> {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
    capacity: usize,
    clock: C,
    metrics: Metrics,
}

impl MemoryInteractionStore<SystemClock> {
    pub fn new(ttl: Duration, capacity: usize, metrics: Metrics) -> Self {
        Self::with_clock(ttl, capacity, metrics, SystemClock)
    }
}

impl<C: Clock> MemoryInteractionStore<C> {
    pub fn with_clock(ttl: Duration, capacity: usize, metrics: Metrics, clock: C) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
            clock,
            metrics,
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) >= self.ttl
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, entry| {
            if self.is_expired(entry, now) {
                info!(
                    correlation_id = %key,
                    purpose = entry.value.purpose(),
                    guild_id = entry.value.guild_id.as_deref().unwrap_or(""),
                    "Interaction expired before a response arrived"
                );
                self.metrics.record_store_expired(entry.value.purpose());
                false
            } else {
                true
            }
        });
        before - entries.len()
    }

    /// Run [`Self::sweep`] every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Interaction store sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let removed = self.sweep().await;
                        if removed > 0 {
                            debug!(removed, "Swept expired interactions");
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl<C: Clock> InteractionStore for MemoryInteractionStore<C> {
    async fn set(&self, key: &str, entry: StoredInteraction) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            debug!(correlation_id = %key, "Replacing stored interaction");
        } else if entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                warn!(
                    evicted = %oldest,
                    capacity = self.capacity,
                    "Interaction store full, evicted oldest entry"
                );
                self.metrics.record_store_saturation();
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: entry,
                created_at: now,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredInteraction>, StoreError> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !self.is_expired(e, now))
            .map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn len(&self) -> Option<usize> {
        Some(self.entries.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::interaction_store::purpose;
    use crate::platform::InteractionHandle;
    use crate::telemetry::metrics::testing::MetricsHarness;

    const TTL: Duration = Duration::from_secs(14 * 60);

    fn entry(id: u64) -> StoredInteraction {
        StoredInteraction::new(
            InteractionHandle {
                interaction_id: id,
                token: format!("token-{id}"),
                guild_id: Some(1),
                channel_id: Some(2),
                user_id: 3,
            },
            "G1",
            purpose::CLAIM_TAG,
        )
    }

    fn store(capacity: usize) -> (MemoryInteractionStore<MockClock>, MockClock, MetricsHarness) {
        let clock = MockClock::new();
        let harness = MetricsHarness::new();
        let store = MemoryInteractionStore::with_clock(TTL, capacity, harness.metrics.clone(), clock.clone());
        (store, clock, harness)
    }

    #[tokio::test]
    async fn set_get_delete() {
        let (store, _, _) = store(10);
        store.set("c1", entry(1)).await.unwrap();
        assert_eq!(store.get("c1").await.unwrap(), Some(entry(1)));

        store.delete("c1").await.unwrap();
        assert_eq!(store.get("c1").await.unwrap(), None);
        store.delete("c1").await.unwrap();
    }

    #[tokio::test]
    async fn set_replaces_existing_entry() {
        let (store, _, harness) = store(1);
        store.set("c1", entry(1)).await.unwrap();
        store.set("c1", entry(2)).await.unwrap();
        assert_eq!(store.get("c1").await.unwrap(), Some(entry(2)));
        assert_eq!(harness.counter("leaderboard.interaction_store.saturation", None), 0);
    }

    #[tokio::test]
    async fn entries_expire_at_ttl() {
        let (store, clock, _) = store(10);
        store.set("c1", entry(1)).await.unwrap();

        clock.advance(TTL - Duration::from_secs(1));
        assert!(store.get("c1").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.get("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let (store, clock, harness) = store(10);
        store.set("old", entry(1)).await.unwrap();
        clock.advance(Duration::from_secs(10 * 60));
        store.set("new", entry(2)).await.unwrap();
        clock.advance(Duration::from_secs(5 * 60));

        assert_eq!(store.sweep().await, 1);
        assert_eq!(store.len().await, Some(1));
        assert!(store.get("new").await.unwrap().is_some());
        assert_eq!(
            harness.counter(
                "leaderboard.interaction_store.expired",
                Some(("purpose", "claim_tag"))
            ),
            1
        );
    }

    #[tokio::test]
    async fn full_store_evicts_oldest_and_counts_saturation() {
        let (store, clock, harness) = store(2);
        store.set("a", entry(1)).await.unwrap();
        clock.advance(Duration::from_secs(1));
        store.set("b", entry(2)).await.unwrap();
        clock.advance(Duration::from_secs(1));
        store.set("c", entry(3)).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), None);
        assert!(store.get("b").await.unwrap().is_some());
        assert!(store.get("c").await.unwrap().is_some());
        assert_eq!(store.len().await, Some(2));
        assert_eq!(harness.counter("leaderboard.interaction_store.saturation", None), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_expired_entries() {
        let (store, clock, harness) = store(10);
        let store = Arc::new(store);
        store.set("c1", entry(1)).await.unwrap();
        clock.advance(TTL);

        let shutdown = CancellationToken::new();
        let task = store.clone().spawn_sweeper(Duration::from_secs(60), shutdown.clone());
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(store.len().await, Some(0));
        assert_eq!(
            harness.counter(
                "leaderboard.interaction_store.expired",
                Some(("purpose", "claim_tag"))
            ),
            1
        );
        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_shutdown() {
        let store = Arc::new(MemoryInteractionStore::new(
            Duration::from_millis(10),
            10,
            Metrics::new(&crate::telemetry::meter()),
        ));
        store.set("c1", entry(1)).await.unwrap();

        let shutdown = CancellationToken::new();
        let task = store.clone().spawn_sweeper(Duration::from_millis(50), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(120)).await;
        shutdown.cancel();
        task.await.unwrap();
    }
}
