//! End-to-end flows: chat command, bus round trip through the dispatcher,
//! and the final chat edit, over the in-memory bus and the mock platform.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use leaderboard_nats::envelope::create_new;
use leaderboard_nats::topics::{backend, chat, guild};
use leaderboard_nats::{AckEvent, Envelope, InMemoryBus, RetryPolicy};
use leaderboard_types::*;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::config::LeaderboardSettings;
use crate::discord::commands::LeaderboardCommand;
use crate::errors::LeaderboardError;
use crate::handlers::tags;
use crate::interaction_store::{InteractionStore, MemoryInteractionStore};
use crate::managers::pagination::PAGE_OUT_OF_RANGE;
use crate::managers::{ButtonPress, CommandInvocation};
use crate::platform::InteractionHandle;
use crate::platform::mock::{MockPlatform, PlatformCall};
use crate::render;
use crate::router::{DispatcherSettings, HandlerResult, MessageContext, Router};
use crate::telemetry::metrics::testing::MetricsHarness;

fn dispatcher() -> DispatcherSettings {
    DispatcherSettings {
        group: "leaderboard-handlers-test".to_string(),
        consumers: 2,
        retry: RetryPolicy::standard(),
        publish_retry: RetryPolicy::no_retries(),
        deadline: Duration::from_secs(30),
    }
}

struct World {
    bus: InMemoryBus,
    platform: Arc<MockPlatform>,
    store: Arc<MemoryInteractionStore>,
    app: Arc<App>,
    shutdown: CancellationToken,
    _metrics: MetricsHarness,
}

impl World {
    async fn start() -> Self {
        let bus = InMemoryBus::default();
        let metrics = MetricsHarness::new();
        let platform = Arc::new(MockPlatform::new());
        let settings = LeaderboardSettings::default();
        let store = Arc::new(MemoryInteractionStore::new(
            settings.interaction_ttl(),
            settings.interaction_store_capacity,
            metrics.metrics.clone(),
        ));
        let shutdown = CancellationToken::new();
        let app = Arc::new(App::new(
            Arc::new(bus.clone()),
            store.clone(),
            platform.clone(),
            &settings,
            metrics.metrics.clone(),
            shutdown.clone(),
        ));
        tokio::spawn(app.router(dispatcher()).run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let world = Self {
            bus,
            platform,
            store,
            app,
            shutdown,
            _metrics: metrics,
        };
        world.configure_guild().await;
        world
    }

    async fn configure_guild(&self) {
        let config = GuildConfig {
            guild_id: "G1".into(),
            leaderboard_channel_id: Some("500".into()),
            signup_channel_id: None,
            setup_complete: true,
        };
        let update = create_new(
            &GuildConfigUpdatedPayload {
                guild_id: "G1".into(),
                config,
            },
            guild::CONFIG_UPDATED,
        )
        .unwrap()
        .with_metadata(metadata::GUILD_ID, "G1");
        self.deliver_and_settle(update, 1).await;
    }

    /// Deliver `envelope` and wait until `settlements` more deliveries
    /// (the envelope and whatever it fans out to) were settled.
    async fn deliver_and_settle(&self, envelope: Envelope, settlements: usize) {
        let before = self.bus.settlements().len();
        self.bus.deliver(envelope).unwrap();
        for _ in 0..1000 {
            if self.bus.settlements().len() >= before + settlements {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {settlements} more settlements, got {:?}", self.bus.settlements());
    }

    /// Answer the single request published on `topic` with `payload` on
    /// `response_topic`, carrying the request's correlation ID.
    async fn respond<T: serde::Serialize>(&self, topic: &str, response_topic: &str, payload: &T) {
        let requests = self.bus.published_on(topic);
        let request = requests.last().unwrap();
        let correlation_id = request.correlation_id().unwrap();
        let response = create_new(payload, response_topic)
            .unwrap()
            .with_metadata(metadata::CORRELATION_ID, correlation_id)
            .with_metadata(metadata::GUILD_ID, "G1");
        self.deliver_and_settle(response, 2).await;
    }

    async fn stored(&self) -> usize {
        self.store.len().await.unwrap_or_default()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn invocation() -> CommandInvocation {
    CommandInvocation {
        handle: InteractionHandle {
            interaction_id: 42,
            token: "itoken".into(),
            guild_id: Some(1),
            channel_id: Some(77),
            user_id: 1001,
        },
        guild_id: "G1".into(),
        user_id: "U1".into(),
        is_admin: false,
        cancel: CancellationToken::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn s1_claim_success() {
    let world = World::start().await;

    world
        .app
        .handle_command(&invocation(), LeaderboardCommand::ClaimTag { tag: 7 })
        .await
        .unwrap();

    assert_eq!(
        world.platform.calls(),
        vec![PlatformCall::Defer {
            interaction_id: 42,
            ephemeral: true
        }]
    );
    assert_eq!(world.stored().await, 1);
    let requests = world.bus.published_on(backend::BATCH_TAG_ASSIGNMENT_REQUESTED);
    assert_eq!(requests.len(), 1);
    assert!(requests[0].correlation_id().is_some());
    let request: BatchTagAssignmentRequestedPayload =
        leaderboard_nats::envelope::unmarshal(&requests[0]).unwrap();
    assert_eq!(request.guild_id, "G1");
    assert_eq!(request.assignments[0].user_id, "U1");
    assert_eq!(request.assignments[0].tag_number, 7);

    let assigned = TagAssignedPayload {
        guild_id: "G1".into(),
        user_id: "U1".into(),
        tag_number: 7,
        assignment_id: None,
    };
    world
        .respond(backend::BATCH_TAG_ASSIGNMENT_REQUESTED, backend::TAG_ASSIGNED, &assigned)
        .await;

    assert_eq!(world.stored().await, 0);
    let edits = world.platform.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].content.as_deref(), Some("✅ Successfully claimed tag #7!"));

    // The reply keeps the request's correlation ID across the namespaces.
    let replies = world.bus.published_on(chat::TAG_REPLY);
    assert_eq!(replies[0].correlation_id(), requests[0].correlation_id());

    // A duplicate response finds nothing parked.
    world
        .respond(backend::BATCH_TAG_ASSIGNMENT_REQUESTED, backend::TAG_ASSIGNED, &assigned)
        .await;
    assert_eq!(world.platform.edits().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn s2_claim_validation() {
    let world = World::start().await;
    let published_before = world.bus.published().len();

    let err = world
        .app
        .handle_command(&invocation(), LeaderboardCommand::ClaimTag { tag: 0 })
        .await
        .unwrap_err();

    assert!(matches!(err, LeaderboardError::BadInput(_)));
    assert_eq!(world.bus.published().len(), published_before);
    assert_eq!(world.stored().await, 0);
    assert_eq!(
        world.platform.responses()[0].content.as_deref(),
        Some("tag number must be between 1 and 100")
    );
}

#[tokio::test(start_paused = true)]
async fn s3_pagination_boundary() {
    let world = World::start().await;

    world
        .app
        .handle_button(&ButtonPress {
            handle: invocation().handle,
            message_id: 9001,
            custom_id: "leaderboard_prev|0".into(),
            description: Some("Page 1/3".into()),
        })
        .await
        .unwrap();

    let calls = world.platform.calls();
    assert!(!calls.iter().any(|c| matches!(c, PlatformCall::Update { .. } | PlatformCall::Edit { .. })));
    assert_eq!(world.platform.responses()[0].content.as_deref(), Some(PAGE_OUT_OF_RANGE));
}

#[tokio::test(start_paused = true)]
async fn s4_history_oversize() {
    let world = World::start().await;

    world
        .app
        .handle_command(
            &invocation(),
            LeaderboardCommand::HistoryMember {
                member: None,
                limit: None,
            },
        )
        .await
        .unwrap();

    let entries = (0..300)
        .map(|i| TagHistoryEntry {
            tag_number: i % 100 + 1,
            event_type: "claimed".into(),
            occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            other_member_id: Some(format!("U{i}")),
        })
        .collect();
    world
        .respond(
            backend::TAG_HISTORY_REQUESTED,
            backend::TAG_HISTORY_RESPONSE,
            &TagHistoryRetrievedPayload {
                guild_id: "G1".into(),
                member_id: "U1".into(),
                entries,
            },
        )
        .await;

    let edits = world.platform.edits();
    assert_eq!(edits.len(), 1);
    let content = edits[0].content.as_deref().unwrap();
    assert!(content.chars().count() <= render::MESSAGE_CONTENT_LIMIT);
    assert!(content.ends_with("..."));
    assert_eq!(world.stored().await, 0);
}

#[tokio::test(start_paused = true)]
async fn s5_chart_response() {
    let world = World::start().await;

    world
        .app
        .handle_command(&invocation(), LeaderboardCommand::HistoryChart { member: None })
        .await
        .unwrap();

    let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    world
        .respond(
            backend::TAG_GRAPH_REQUESTED,
            backend::TAG_GRAPH_RESPONSE,
            &TagGraphRetrievedPayload {
                guild_id: "G1".into(),
                member_id: "U1".into(),
                png: png.clone(),
            },
        )
        .await;

    let edits = world.platform.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].content.as_deref(), Some(render::CHART_GENERATED));

    let followups: Vec<MessageView> = world
        .platform
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            PlatformCall::Followup { view, .. } => Some(view),
            _ => None,
        })
        .collect();
    assert_eq!(followups.len(), 1);
    let file = &followups[0].attachments[0];
    assert_eq!(file.filename, "tag_history.png");
    assert_eq!(file.content_type, "image/png");
    assert_eq!(file.data, png);
    assert_eq!(world.stored().await, 0);
}

async fn faulty_season_start(_ctx: MessageContext, payload: SeasonStartedPayload) -> HandlerResult {
    if payload.season_name == "boom" {
        panic!("season start handler fault");
    }
    Ok(vec![])
}

#[tokio::test(start_paused = true)]
async fn s6_panic_containment() {
    let bus = InMemoryBus::default();
    let harness = MetricsHarness::new();
    let mut router = Router::new(Arc::new(bus.clone()), dispatcher(), harness.metrics.clone())
        .with_standard_middleware();
    router.add_handler("season_started", backend::SEASON_START_SUCCESS, faulty_season_start);
    router.add_handler("tag_assigned", backend::TAG_ASSIGNED, tags::handle_tag_assigned);
    let shutdown = CancellationToken::new();
    tokio::spawn(router.run(shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let started = create_new(
        &SeasonStartedPayload {
            guild_id: "G1".into(),
            season_id: "0b7c9d2e-3f41-4c5a-8e6f-7a8b9c0d1e2f".into(),
            season_name: "boom".into(),
        },
        backend::SEASON_START_SUCCESS,
    )
    .unwrap();
    bus.deliver(started.clone()).unwrap();

    let mut settled = Vec::new();
    for _ in 0..1000 {
        settled = bus.settlements_for(started.uuid());
        if !settled.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Give a nack-driven redelivery the chance to show up.
    tokio::time::sleep(Duration::from_secs(10)).await;
    let settled_after = bus.settlements_for(started.uuid());

    assert_eq!(settled.len(), 1);
    assert_eq!(settled_after, settled);
    assert!(matches!(settled[0], AckEvent::Ack { attempt: 1, .. }));
    assert!(bus.published().is_empty());
    assert_eq!(
        harness.counter("leaderboard.dispatcher.panics", Some(("handler", "season_started"))),
        1
    );

    // Other topics keep being served.
    let assigned = create_new(
        &TagAssignedPayload {
            guild_id: "G1".into(),
            user_id: "U1".into(),
            tag_number: 3,
            assignment_id: None,
        },
        backend::TAG_ASSIGNED,
    )
    .unwrap();
    bus.deliver(assigned.clone()).unwrap();
    for _ in 0..1000 {
        if !bus.settlements_for(assigned.uuid()).is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(bus.published_on(chat::TAG_REPLY).len(), 1);
    shutdown.cancel();
}
