//! Configuration management for leaderboard-bot

#[path = "config_tests.rs"]
mod config_tests;

use std::fs;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use leaderboard_nats::{NatsConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Discord interaction tokens stop accepting edits after this long.
pub const INTERACTION_TOKEN_LIFETIME: Duration = Duration::from_secs(15 * 60);

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordBotConfig,
    pub nats: NatsConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardSettings,
}

/// Discord bot specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordBotConfig {
    /// Bot token from the Discord developer portal
    #[serde(default = "default_bot_token")]
    pub bot_token: String,
    /// Register slash commands on startup
    #[serde(default = "default_true")]
    pub register_commands: bool,
    /// Register commands to this guild only (instant propagation, for testing)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_guild_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Single-process map with a TTL sweeper.
    #[default]
    Memory,
    /// JetStream key-value bucket shared by all replicas.
    Kv,
}

/// Tunables for the correlation engine and the command surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LeaderboardSettings {
    pub entries_per_page: usize,
    pub interaction_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub interaction_store_capacity: usize,
    pub interaction_store: StoreBackend,
    pub kv_bucket: String,
    pub config_resolver_timeout_ms: u64,
    pub dispatcher_retry_max: u32,
    pub retry_initial_delay_ms: u64,
    pub consumers_per_subject: usize,
    pub tag_min: i64,
    pub tag_max: i64,
    pub history_default_limit: i64,
    pub history_max_limit: i64,
    pub pagination_snapshot_capacity: usize,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            entries_per_page: 10,
            interaction_ttl_secs: 14 * 60,
            sweep_interval_secs: 60,
            interaction_store_capacity: 10_000,
            interaction_store: StoreBackend::Memory,
            kv_bucket: "leaderboard-interactions".to_string(),
            config_resolver_timeout_ms: 2_000,
            dispatcher_retry_max: 3,
            retry_initial_delay_ms: 1_000,
            consumers_per_subject: 8,
            tag_min: 1,
            tag_max: 100,
            history_default_limit: 50,
            history_max_limit: 100,
            pagination_snapshot_capacity: 500,
        }
    }
}

impl LeaderboardSettings {
    pub fn interaction_ttl(&self) -> Duration {
        Duration::from_secs(self.interaction_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn config_resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.config_resolver_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.dispatcher_retry_max,
            initial_retry_delay: Duration::from_millis(self.retry_initial_delay_ms),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.entries_per_page == 0 || self.entries_per_page > 25 {
            bail!("entries_per_page must be between 1 and 25 (embed field limit)");
        }
        if self.interaction_ttl_secs == 0 || self.interaction_ttl() >= INTERACTION_TOKEN_LIFETIME {
            bail!(
                "interaction_ttl_secs must be positive and below the {}s token lifetime",
                INTERACTION_TOKEN_LIFETIME.as_secs()
            );
        }
        if self.sweep_interval_secs == 0 {
            bail!("sweep_interval_secs must be positive");
        }
        if self.interaction_store_capacity == 0 {
            bail!("interaction_store_capacity must be positive");
        }
        if self.consumers_per_subject == 0 {
            bail!("consumers_per_subject must be positive");
        }
        if self.tag_min < 1 || self.tag_min > self.tag_max {
            bail!("tag range [{}, {}] is empty", self.tag_min, self.tag_max);
        }
        if self.history_max_limit < 1
            || self.history_default_limit < 1
            || self.history_default_limit > self.history_max_limit
        {
            bail!(
                "history_default_limit {} must lie in [1, {}]",
                self.history_default_limit,
                self.history_max_limit
            );
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.leaderboard.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = var("DISCORD_BOT_TOKEN").context("DISCORD_BOT_TOKEN not set")?;
        let nats_url = var("NATS_URL").unwrap_or_else(|| "localhost:4222".to_string());
        let environment = var("LEADERBOARD_ENV").unwrap_or_else(|| "prod".to_string());

        let mut nats = NatsConfig::from_url(nats_url, environment);
        if let Some(creds) = var("NATS_CREDS_FILE") {
            nats = nats.with_credentials(creds);
        }

        let command_guild_id = var("DISCORD_COMMAND_GUILD_ID")
            .map(|id| id.parse::<u64>())
            .transpose()
            .context("DISCORD_COMMAND_GUILD_ID must be a numeric guild ID")?;

        let mut leaderboard = LeaderboardSettings::default();
        if let Some(backend) = var("LEADERBOARD_INTERACTION_STORE") {
            leaderboard.interaction_store = match backend.to_lowercase().as_str() {
                "kv" => StoreBackend::Kv,
                _ => StoreBackend::Memory,
            };
        }
        if let Some(ttl) = var("LEADERBOARD_INTERACTION_TTL_SECS") {
            leaderboard.interaction_ttl_secs = ttl
                .parse()
                .context("LEADERBOARD_INTERACTION_TTL_SECS must be an integer")?;
        }
        leaderboard.validate()?;

        Ok(Config {
            discord: DiscordBotConfig {
                bot_token,
                register_commands: var("DISCORD_REGISTER_COMMANDS")
                    .map(|v| v.to_lowercase() != "false")
                    .unwrap_or(true),
                command_guild_id,
            },
            nats,
            leaderboard,
        })
    }
}

fn default_bot_token() -> String {
    std::env::var("DISCORD_BOT_TOKEN").unwrap_or_default()
}

fn default_true() -> bool {
    true
}
