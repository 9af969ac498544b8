//! NATS connection management

use async_nats::Client;
use tracing::{info, warn};

use crate::config::NatsConfig;
use crate::error::BusError;

/// Connect to NATS server(s), retrying the initial connection forever.
pub async fn connect(config: &NatsConfig) -> Result<Client, BusError> {
    info!(servers = ?config.servers, environment = %config.environment, "Connecting to NATS");

    let mut opts = async_nats::ConnectOptions::new().name("leaderboard-bot");

    if let Some(ref creds_file) = config.credentials_file {
        opts = opts
            .credentials_file(creds_file)
            .await
            .map_err(|e| BusError::Connection(format!("Failed to load credentials: {}", e)))?;
    } else if let (Some(username), Some(password)) = (&config.username, &config.password) {
        opts = opts.user_and_password(username.clone(), password.clone());
    }

    opts = opts
        .event_callback(|event| async move {
            match event {
                async_nats::Event::Connected => info!("Connected to NATS"),
                async_nats::Event::Disconnected => warn!("Disconnected from NATS"),
                async_nats::Event::SlowConsumer(sid) => {
                    warn!(sid, "NATS slow consumer, messages dropped")
                }
                async_nats::Event::ClientError(e) => warn!("NATS client error: {}", e),
                _ => {}
            }
        })
        .retry_on_initial_connect()
        .max_reconnects(None);

    let servers: Vec<&str> = config.servers.iter().map(|s| s.as_str()).collect();
    let client = opts
        .connect(servers)
        .await
        .map_err(|e| BusError::Connection(format!("Failed to connect to NATS: {}", e)))?;

    info!("Successfully connected to NATS");
    Ok(client)
}
