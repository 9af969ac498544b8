//! Health check endpoint

use std::sync::Arc;
use std::time::SystemTime;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use leaderboard_nats::{BusHealth, EventBus};
use serde::Serialize;
use serenity::prelude::TypeMapKey;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::interaction_store::InteractionStore;

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub bus: BusHealth,
    /// Pending interactions; absent when the store cannot count cheaply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactions: Option<usize>,
    pub consumers: usize,
    pub bot_username: Option<String>,
    pub uptime_secs: u64,
}

/// Shared application state for health checks
#[derive(Clone)]
pub struct AppState {
    pub start_time: SystemTime,
    pub bot_username: Arc<RwLock<Option<String>>>,
    bus: Arc<dyn EventBus>,
    store: Arc<dyn InteractionStore>,
    consumers: usize,
}

impl AppState {
    pub fn new(bus: Arc<dyn EventBus>, store: Arc<dyn InteractionStore>, consumers: usize) -> Self {
        Self {
            start_time: SystemTime::now(),
            bot_username: Arc::new(RwLock::new(None)),
            bus,
            store,
            consumers,
        }
    }

    pub async fn set_bot_username(&self, username: String) {
        let mut guard = self.bot_username.write().await;
        *guard = Some(username);
    }
}

impl TypeMapKey for AppState {
    type Value = AppState;
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let uptime = state.start_time.elapsed().unwrap_or_default().as_secs();
    let bot_username = state.bot_username.read().await.clone();
    let bus = state.bus.health();
    let (code, status) = match bus {
        BusHealth::Connected => (StatusCode::OK, "ok"),
        BusHealth::Disconnected => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    };

    (
        code,
        Json(HealthStatus {
            status,
            bus,
            interactions: state.store.len().await,
            consumers: state.consumers,
            bot_username,
            uptime_secs: uptime,
        }),
    )
}

async fn live_handler() -> StatusCode {
    StatusCode::OK
}

/// Create the health check router
pub fn create_health_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/live", get(live_handler))
        .with_state(state)
}

/// Start the health check server; returns once `shutdown` fires.
pub async fn start_health_server(state: AppState, port: u16, shutdown: CancellationToken) -> anyhow::Result<()> {
    let app = create_health_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Health check server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use leaderboard_nats::InMemoryBus;

    use super::*;
    use crate::interaction_store::{MemoryInteractionStore, StoredInteraction};
    use crate::platform::InteractionHandle;
    use crate::telemetry::metrics::testing::MetricsHarness;

    fn state(bus: &InMemoryBus) -> (AppState, Arc<MemoryInteractionStore>) {
        let harness = MetricsHarness::new();
        let store = Arc::new(MemoryInteractionStore::new(
            Duration::from_secs(60),
            10,
            harness.metrics.clone(),
        ));
        (AppState::new(Arc::new(bus.clone()), store.clone(), 31), store)
    }

    #[tokio::test]
    async fn test_set_bot_username() {
        let (state, _) = state(&InMemoryBus::default());
        assert!(state.bot_username.read().await.is_none());
        state.set_bot_username("leaderbot".to_string()).await;
        assert_eq!(*state.bot_username.read().await, Some("leaderbot".to_string()));
    }

    #[tokio::test]
    async fn healthy_when_bus_connected() {
        let bus = InMemoryBus::default();
        let (state, store) = state(&bus);
        store
            .set(
                "c1",
                StoredInteraction::new(
                    InteractionHandle {
                        interaction_id: 1,
                        token: "t".into(),
                        guild_id: None,
                        channel_id: None,
                        user_id: 2,
                    },
                    "G1",
                    "claim_tag",
                ),
            )
            .await
            .unwrap();

        let (code, Json(status)) = health_handler(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(status.interactions, Some(1));
        assert_eq!(status.consumers, 31);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["bus"], "connected");
    }

    #[tokio::test]
    async fn unavailable_when_bus_disconnected() {
        let bus = InMemoryBus::default();
        bus.set_connected(false);
        let (state, _) = state(&bus);

        let (code, Json(status)) = health_handler(State(state)).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status.bus, BusHealth::Disconnected);
    }

    #[tokio::test]
    async fn live_is_always_ok() {
        assert_eq!(live_handler().await, StatusCode::OK);
    }
}
