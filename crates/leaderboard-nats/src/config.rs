//! NATS connection and consumer configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

const CONSUMER_GROUP_PREFIX: &str = "leaderboard-handlers";

/// NATS connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URLs (comma-separated when loaded from env)
    pub servers: Vec<String>,
    /// Deployment environment; suffixes the consumer group (e.g. "prod", "dev")
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// How long JetStream waits for an ack before redelivering. Bus-originated
    /// handlers use this as their deadline.
    #[serde(default = "default_ack_wait_secs")]
    pub ack_wait_secs: u64,
}

fn default_environment() -> String {
    "prod".to_string()
}

fn default_ack_wait_secs() -> u64 {
    30
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["localhost:4222".to_string()],
            environment: default_environment(),
            credentials_file: None,
            username: None,
            password: None,
            ack_wait_secs: default_ack_wait_secs(),
        }
    }
}

impl NatsConfig {
    /// Parse servers from a comma-separated URL string
    pub fn from_url(url: impl AsRef<str>, environment: impl Into<String>) -> Self {
        let servers = url
            .as_ref()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            servers,
            environment: environment.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, file: impl Into<String>) -> Self {
        self.credentials_file = Some(file.into());
        self
    }

    /// Consumer group shared by all replicas of one environment.
    pub fn consumer_group(&self) -> String {
        format!("{}-{}", CONSUMER_GROUP_PREFIX, self.environment)
    }

    pub fn ack_wait(&self) -> Duration {
        Duration::from_secs(self.ack_wait_secs)
    }
}
