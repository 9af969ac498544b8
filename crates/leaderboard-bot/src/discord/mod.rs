//! Serenity event handler: registers slash commands and turns interactions
//! into manager calls.

pub mod commands;

use std::future::Future;
use std::sync::Arc;

use serenity::async_trait;
use serenity::model::application::{
    Command, CommandInteraction, ComponentInteraction, ComponentInteractionDataKind, Interaction,
};
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::config::{INTERACTION_TOKEN_LIFETIME, LeaderboardSettings};
use crate::errors::{ErrorKind, LeaderboardError};
use crate::health::AppState;
use crate::managers::{ButtonPress, CommandInvocation};
use crate::platform::InteractionHandle;

const GUILD_ONLY: &str = "❌ This command only works inside a server.";
const UNKNOWN_COMMAND: &str = "❌ Unknown command.";

pub struct Handler {
    settings: LeaderboardSettings,
    register_commands: bool,
    command_guild_id: Option<u64>,
}

impl Handler {
    pub fn new(settings: LeaderboardSettings, register_commands: bool, command_guild_id: Option<u64>) -> Self {
        Self {
            settings,
            register_commands,
            command_guild_id,
        }
    }

    async fn register(&self, ctx: &Context) {
        let definitions = commands::definitions(&self.settings);
        let (scope, result) = match self.command_guild_id {
            Some(guild_id) => (
                "guild",
                GuildId::new(guild_id)
                    .set_commands(&ctx.http, definitions)
                    .await,
            ),
            None => ("global", Command::set_global_commands(&ctx.http, definitions).await),
        };
        match result {
            Ok(registered) => info!(scope, count = registered.len(), "Slash commands registered"),
            Err(e) => error!(scope, error = %e, "Failed to register slash commands"),
        }
    }
}

async fn app(ctx: &Context) -> Option<Arc<App>> {
    let data = ctx.data.read().await;
    data.get::<App>().cloned()
}

fn handle_of_command(cmd: &CommandInteraction) -> InteractionHandle {
    InteractionHandle {
        interaction_id: cmd.id.get(),
        token: cmd.token.clone(),
        guild_id: cmd.guild_id.map(|g| g.get()),
        channel_id: Some(cmd.channel_id.get()),
        user_id: cmd.user.id.get(),
    }
}

fn handle_of_component(comp: &ComponentInteraction) -> InteractionHandle {
    InteractionHandle {
        interaction_id: comp.id.get(),
        token: comp.token.clone(),
        guild_id: comp.guild_id.map(|g| g.get()),
        channel_id: Some(comp.channel_id.get()),
        user_id: comp.user.id.get(),
    }
}

/// Bound the work to the interaction token lifetime; past it nothing we do
/// can reach the user anyway.
async fn within_token_lifetime(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<(), LeaderboardError>>,
) -> Result<(), LeaderboardError> {
    match tokio::time::timeout(INTERACTION_TOKEN_LIFETIME, work).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            Err(LeaderboardError::Cancelled)
        }
    }
}

fn log_outcome(what: &str, result: Result<(), LeaderboardError>) {
    let Err(e) = result else {
        return;
    };
    match e.kind() {
        ErrorKind::BadInput | ErrorKind::Cancelled => debug!(what, error = %e, "Interaction not handled"),
        ErrorKind::Transient | ErrorKind::ConfigUnavailable => warn!(what, error = %e, "Interaction failed"),
        _ => error!(what, kind = e.kind().as_str(), error = %e, "Interaction failed"),
    }
}

async fn on_command(app: &App, cmd: &CommandInteraction) {
    let handle = handle_of_command(cmd);
    let Some(guild_id) = cmd.guild_id else {
        log_outcome(&cmd.data.name, app.reject(&handle, GUILD_ONLY).await);
        return;
    };

    let options = commands::from_resolved(&cmd.data.options());
    let command = match commands::parse(&cmd.data.name, &options) {
        Ok(command) => command,
        Err(e) => {
            warn!(command = %cmd.data.name, error = %e, "Unparseable command");
            log_outcome(&cmd.data.name, app.reject(&handle, UNKNOWN_COMMAND).await);
            return;
        }
    };

    let is_admin = cmd
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .is_some_and(|p| p.administrator());
    let cancel = app.interaction_scope();
    let invocation = CommandInvocation {
        handle,
        guild_id: guild_id.get().to_string(),
        user_id: cmd.user.id.get().to_string(),
        is_admin,
        cancel: cancel.clone(),
    };
    debug!(command = ?command, guild_id = %invocation.guild_id, user_id = %invocation.user_id, "Slash command");

    let result = within_token_lifetime(&cancel, app.handle_command(&invocation, command)).await;
    log_outcome(&cmd.data.name, result);
}

async fn on_component(app: &App, comp: &ComponentInteraction) {
    if !matches!(comp.data.kind, ComponentInteractionDataKind::Button) {
        return;
    }
    let press = ButtonPress {
        handle: handle_of_component(comp),
        message_id: comp.message.id.get(),
        custom_id: comp.data.custom_id.clone(),
        description: comp.message.embeds.first().and_then(|e| e.description.clone()),
    };
    let cancel = app.interaction_scope();
    let result = within_token_lifetime(&cancel, app.handle_button(&press)).await;
    log_outcome(&comp.data.custom_id, result);
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "Discord bot connected");

        let health = {
            let data = ctx.data.read().await;
            data.get::<AppState>().cloned()
        };
        if let Some(health) = health {
            health.set_bot_username(ready.user.name.clone()).await;
        }

        if self.register_commands {
            self.register(&ctx).await;
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Some(app) = app(&ctx).await else {
            error!("App not found in context data");
            return;
        };

        match interaction {
            Interaction::Command(cmd) => on_command(&app, &cmd).await,
            Interaction::Component(comp) => on_component(&app, &comp).await,
            _ => {}
        }
    }
}
