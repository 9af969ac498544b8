//! Leaderboard bot
//!
//! Answers leaderboard slash commands by publishing backend requests over
//! NATS JetStream and editing the deferred interaction once the correlated
//! response arrives.

mod app;
mod clock;
mod config;
mod discord;
mod errors;
mod guild_config;
mod handlers;
mod health;
mod interaction_store;
mod managers;
mod platform;
mod render;
mod router;
mod telemetry;

#[cfg(test)]
#[path = "scenarios_tests.rs"]
mod scenarios_tests;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use leaderboard_nats::topics::STREAMS;
use leaderboard_nats::{EventBus, JetStreamBus, connect};
use serenity::model::gateway::GatewayIntents;
use serenity::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::App;
use crate::config::{Config, StoreBackend};
use crate::discord::Handler;
use crate::health::AppState;
use crate::interaction_store::{InteractionStore, KvInteractionStore, MemoryInteractionStore};
use crate::platform::discord::SerenityPlatform;
use crate::router::DispatcherSettings;
use crate::telemetry::Metrics;

/// Leaderboard bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/leaderboard-bot.toml")]
    config: String,

    /// NATS URL (overrides config file)
    #[arg(long, env = "NATS_URL")]
    nats_url: Option<String>,

    /// Discord bot token (overrides config file)
    #[arg(long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Deployment environment; suffixes the consumer group (overrides config file)
    #[arg(long, env = "LEADERBOARD_ENV")]
    environment: Option<String>,

    /// Health check server port
    #[arg(long, env = "HEALTH_CHECK_PORT", default_value = "3001")]
    health_port: u16,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        Config::from_env()?
    };

    if let Some(nats_url) = &args.nats_url {
        config.nats.servers = nats_url.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(bot_token) = &args.bot_token {
        config.discord.bot_token = bot_token.clone();
    }
    if let Some(environment) = &args.environment {
        config.nats.environment = environment.clone();
    }
    Ok(config)
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM, waiting for Ctrl+C only");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    telemetry::init_logger(&config.nats.environment);
    info!(
        config = %args.config,
        environment = %config.nats.environment,
        "Starting leaderboard bot"
    );

    let settings = config.leaderboard.clone();
    let shutdown = CancellationToken::new();
    let metrics = Metrics::new(&telemetry::meter());

    // NATS
    let nats_client = connect(&config.nats).await?;
    info!("Connected to NATS");
    let jetstream = Arc::new(JetStreamBus::new(
        nats_client,
        config.nats.ack_wait(),
        settings.dispatcher_retry_max,
    ));
    for stream in STREAMS {
        let subjects: Vec<String> = stream.subjects.iter().map(|s| s.to_string()).collect();
        jetstream
            .create_stream(stream.name, &subjects)
            .await
            .with_context(|| format!("Failed to create stream {}", stream.name))?;
    }
    let bus: Arc<dyn EventBus> = jetstream.clone();

    // Interaction store
    let store: Arc<dyn InteractionStore> = match settings.interaction_store {
        StoreBackend::Memory => {
            let memory = Arc::new(MemoryInteractionStore::new(
                settings.interaction_ttl(),
                settings.interaction_store_capacity,
                metrics.clone(),
            ));
            memory
                .clone()
                .spawn_sweeper(settings.sweep_interval(), shutdown.clone());
            memory
        }
        StoreBackend::Kv => Arc::new(
            KvInteractionStore::open(jetstream.context(), &settings.kv_bucket, settings.interaction_ttl()).await?,
        ),
    };
    info!(backend = ?settings.interaction_store, ttl_secs = settings.interaction_ttl_secs, "Interaction store ready");

    // Discord
    let handler = Handler::new(
        settings.clone(),
        config.discord.register_commands,
        config.discord.command_guild_id,
    );
    let mut client = Client::builder(&config.discord.bot_token, GatewayIntents::GUILDS)
        .event_handler(handler)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    let platform = Arc::new(SerenityPlatform::new(client.http.clone()));
    let app = Arc::new(App::new(
        bus.clone(),
        store.clone(),
        platform,
        &settings,
        metrics,
        shutdown.clone(),
    ));

    let dispatcher = DispatcherSettings {
        consumers: settings.consumers_per_subject,
        retry: settings.retry_policy(),
        deadline: config.nats.ack_wait(),
        ..DispatcherSettings::new(config.nats.consumer_group())
    };
    let router = app.router(dispatcher);
    let health_state = AppState::new(bus.clone(), store.clone(), router.topics().len());

    {
        let mut data = client.data.write().await;
        data.insert::<App>(app.clone());
        data.insert::<AppState>(health_state.clone());
    }

    let health_port = args.health_port;
    let health_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = health::start_health_server(health_state, health_port, health_shutdown).await {
            error!("Health server error: {}", e);
        }
    });

    let dispatcher_shutdown = shutdown.clone();
    let dispatcher_task = tokio::spawn(async move {
        if let Err(e) = router.run(dispatcher_shutdown).await {
            error!(error = %e, "Dispatcher failed to start");
        }
    });

    // Graceful shutdown: stop consumers, sweeper and shards on SIGTERM or Ctrl+C.
    let shard_manager = client.shard_manager.clone();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received, stopping...");
        signal_shutdown.cancel();
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord gateway connection...");
    let result = client.start().await;

    shutdown.cancel();
    if let Err(e) = dispatcher_task.await {
        error!(error = %e, "Dispatcher task panicked");
    }
    telemetry::shutdown_otel();

    result.map_err(|e| anyhow::anyhow!("Discord client error: {}", e))?;
    info!("Leaderboard bot stopped");
    Ok(())
}
