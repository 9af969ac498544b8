use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use leaderboard_types::GuildConfig;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedGuildConfig {
    pub config: GuildConfig,
    pub refreshed_at: DateTime<Utc>,
}

type Snapshot = Arc<HashMap<String, Arc<CachedGuildConfig>>>;

/// Copy-on-write map of guild configs.
///
/// Readers clone the current snapshot pointer and never wait on a writer
/// rebuilding the map. Writers serialize on `writer`, build a new map and
/// swap it in.
#[derive(Default)]
pub struct GuildConfigCache {
    snapshot: RwLock<Snapshot>,
    writer: Mutex<()>,
}

impl GuildConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, guild_id: &str) -> Option<Arc<CachedGuildConfig>> {
        self.current().get(guild_id).cloned()
    }

    /// Insert or refresh a guild's config and return what was stored.
    ///
    /// Setup completion is sticky: a config reporting `setup_complete =
    /// false` for a guild already known as complete keeps the flag set.
    pub fn put(&self, mut config: GuildConfig) -> Arc<CachedGuildConfig> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current();

        if let Some(existing) = current.get(&config.guild_id)
            && existing.config.setup_complete
            && !config.setup_complete
        {
            warn!(
                guild_id = %config.guild_id,
                "Ignoring setup_complete regression for guild"
            );
            config.setup_complete = true;
        }

        let entry = Arc::new(CachedGuildConfig {
            config,
            refreshed_at: Utc::now(),
        });
        let mut next = HashMap::clone(&current);
        next.insert(entry.config.guild_id.clone(), entry.clone());

        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        entry
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
