//! Wiring: builds the managers once and exposes them to the gateway handler
//! and the dispatcher.

use std::sync::Arc;

use leaderboard_nats::EventBus;
use leaderboard_nats::topics::{chat, guild};
use leaderboard_types::{
    ChartReplyPayload, GuildConfigRetrievalFailedPayload, GuildConfigRetrievedPayload, GuildConfigUpdatedPayload,
    InteractionReplyPayload, LeaderboardDisplayPayload, SeasonReplyPayload,
};
use serenity::prelude::TypeMapKey;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::LeaderboardSettings;
use crate::discord::commands::LeaderboardCommand;
use crate::errors::LeaderboardError;
use crate::guild_config::{GuildConfigCache, GuildConfigResolver};
use crate::handlers;
use crate::interaction_store::InteractionStore;
use crate::managers::history::HistoryLimits;
use crate::managers::{
    ButtonPress, ClaimTagManager, CommandInvocation, HistoryManager, InteractionResponder, PaginationManager,
    SeasonManager,
};
use crate::platform::{ChatPlatform, InteractionHandle};
use crate::render::{NEXT_BUTTON, PREV_BUTTON};
use crate::router::{DispatcherSettings, Router};
use crate::telemetry::Metrics;

pub struct App {
    bus: Arc<dyn EventBus>,
    responder: Arc<InteractionResponder>,
    resolver: Arc<GuildConfigResolver>,
    claim: Arc<ClaimTagManager>,
    history: Arc<HistoryManager>,
    season: Arc<SeasonManager>,
    pagination: Arc<PaginationManager>,
    metrics: Metrics,
    shutdown: CancellationToken,
}

impl TypeMapKey for App {
    type Value = Arc<App>;
}

impl App {
    pub fn new(
        bus: Arc<dyn EventBus>,
        store: Arc<dyn InteractionStore>,
        platform: Arc<dyn ChatPlatform>,
        settings: &LeaderboardSettings,
        metrics: Metrics,
        shutdown: CancellationToken,
    ) -> Self {
        let resolver = Arc::new(GuildConfigResolver::new(
            Arc::new(GuildConfigCache::new()),
            bus.clone(),
            settings.config_resolver_timeout(),
            metrics.clone(),
        ));
        let responder = Arc::new(InteractionResponder::new(
            bus.clone(),
            store,
            platform,
            resolver.clone(),
        ));

        let tag_min = u32::try_from(settings.tag_min).unwrap_or(1);
        let tag_max = u32::try_from(settings.tag_max).unwrap_or(u32::MAX);
        let limits = HistoryLimits {
            default: u32::try_from(settings.history_default_limit).unwrap_or(1),
            max: u32::try_from(settings.history_max_limit).unwrap_or(1),
        };

        Self {
            claim: Arc::new(ClaimTagManager::new(responder.clone(), tag_min..=tag_max)),
            history: Arc::new(HistoryManager::new(responder.clone(), limits)),
            season: Arc::new(SeasonManager::new(responder.clone())),
            pagination: Arc::new(PaginationManager::new(
                responder.clone(),
                settings.entries_per_page,
                settings.pagination_snapshot_capacity,
            )),
            bus,
            responder,
            resolver,
            metrics,
            shutdown,
        }
    }

    /// Cancellation scope for one interaction; fires on shutdown.
    pub fn interaction_scope(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Translation routes, manager reply routes and guild config routes.
    pub fn router(&self, settings: DispatcherSettings) -> Router {
        let mut router = Router::new(self.bus.clone(), settings, self.metrics.clone()).with_standard_middleware();
        handlers::register(&mut router);

        let claim = self.claim.clone();
        router.add_handler("tag_reply", chat::TAG_REPLY, move |ctx, payload: InteractionReplyPayload| {
            let claim = claim.clone();
            async move { claim.handle_reply(ctx, payload).await }
        });

        let history = self.history.clone();
        router.add_handler(
            "history_reply",
            chat::HISTORY_REPLY,
            move |ctx, payload: InteractionReplyPayload| {
                let history = history.clone();
                async move { history.handle_reply(ctx, payload).await }
            },
        );

        let history = self.history.clone();
        router.add_handler("chart_reply", chat::CHART_REPLY, move |ctx, payload: ChartReplyPayload| {
            let history = history.clone();
            async move { history.handle_chart(ctx, payload).await }
        });

        let season = self.season.clone();
        router.add_handler("season_reply", chat::SEASON_REPLY, move |ctx, payload: SeasonReplyPayload| {
            let season = season.clone();
            async move { season.handle_reply(ctx, payload).await }
        });

        let pagination = self.pagination.clone();
        router.add_handler(
            "leaderboard_display",
            chat::DISPLAY,
            move |ctx, payload: LeaderboardDisplayPayload| {
                let pagination = pagination.clone();
                async move { pagination.handle_display(ctx, payload).await }
            },
        );

        let pagination = self.pagination.clone();
        router.add_handler(
            "leaderboard_retrieve_reply",
            chat::RETRIEVE_REPLY,
            move |ctx, payload: InteractionReplyPayload| {
                let pagination = pagination.clone();
                async move { pagination.handle_retrieve_reply(ctx, payload).await }
            },
        );

        // Every replica keeps its own config cache, so these fan out.
        let resolver = self.resolver.clone();
        router.add_broadcast_handler(
            "guild_config_retrieved",
            guild::CONFIG_RETRIEVED,
            move |ctx, payload: GuildConfigRetrievedPayload| {
                let resolver = resolver.clone();
                async move { resolver.handle_retrieved(ctx, payload).await }
            },
        );
        let resolver = self.resolver.clone();
        router.add_broadcast_handler(
            "guild_config_retrieval_failed",
            guild::CONFIG_RETRIEVAL_FAILED,
            move |ctx, payload: GuildConfigRetrievalFailedPayload| {
                let resolver = resolver.clone();
                async move { resolver.handle_retrieval_failed(ctx, payload).await }
            },
        );
        let resolver = self.resolver.clone();
        router.add_broadcast_handler(
            "guild_config_updated",
            guild::CONFIG_UPDATED,
            move |ctx, payload: GuildConfigUpdatedPayload| {
                let resolver = resolver.clone();
                async move { resolver.handle_updated(ctx, payload).await }
            },
        );

        router
    }

    pub async fn handle_command(
        &self,
        invocation: &CommandInvocation,
        command: LeaderboardCommand,
    ) -> Result<(), LeaderboardError> {
        match command {
            LeaderboardCommand::ClaimTag { tag } => self.claim.handle_claim(invocation, tag).await,
            LeaderboardCommand::HistoryMember { member, limit } => {
                self.history.request_member(invocation, member, limit).await
            }
            LeaderboardCommand::HistoryChart { member } => self.history.request_chart(invocation, member).await,
            LeaderboardCommand::SeasonStart { name } => self.season.start(invocation, &name).await,
            LeaderboardCommand::SeasonStandings { season_id } => {
                self.season.standings(invocation, season_id.as_deref()).await
            }
            LeaderboardCommand::SeasonEnd => self.season.end(invocation).await,
            LeaderboardCommand::Leaderboard => self.pagination.request_leaderboard(invocation).await,
        }
    }

    /// Buttons other than the pagination pair belong to other features of
    /// the bot and are ignored here.
    pub async fn handle_button(&self, press: &ButtonPress) -> Result<(), LeaderboardError> {
        let ours = [PREV_BUTTON, NEXT_BUTTON]
            .iter()
            .any(|prefix| press.custom_id.starts_with(prefix));
        if !ours {
            debug!(custom_id = %press.custom_id, "Ignoring foreign button");
            return Ok(());
        }
        self.pagination.handle_pagination(press).await
    }

    pub async fn reject(&self, handle: &InteractionHandle, text: &str) -> Result<(), LeaderboardError> {
        self.responder.reject(handle, text).await
    }
}
