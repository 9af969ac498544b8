//! [`ChatPlatform`] over serenity's HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use leaderboard_types::{ActionRow, ButtonStyle, Embed, MessageView};
use serenity::builder::{
    CreateActionRow, CreateAttachment, CreateButton, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
    CreateMessage, EditInteractionResponse,
};
use serenity::http::Http;
use serenity::model::id::ChannelId;
use tracing::debug;

use crate::errors::{PlatformError, classify};
use crate::platform::{ChatPlatform, InteractionHandle};

pub struct SerenityPlatform {
    http: Arc<Http>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn to_embed(embed: &Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new();
    if let Some(title) = &embed.title {
        builder = builder.title(title);
    }
    if let Some(description) = &embed.description {
        builder = builder.description(description);
    }
    for field in &embed.fields {
        builder = builder.field(&field.name, &field.value, field.inline);
    }
    if let Some(color) = embed.color {
        builder = builder.colour(color);
    }
    if let Some(footer) = &embed.footer {
        builder = builder.footer(CreateEmbedFooter::new(&footer.text));
    }
    builder
}

fn to_row(row: &ActionRow) -> CreateActionRow {
    let buttons = row
        .buttons
        .iter()
        .map(|b| {
            let style = match b.style {
                ButtonStyle::Primary => serenity::all::ButtonStyle::Primary,
                ButtonStyle::Secondary => serenity::all::ButtonStyle::Secondary,
                ButtonStyle::Success => serenity::all::ButtonStyle::Success,
                ButtonStyle::Danger => serenity::all::ButtonStyle::Danger,
            };
            CreateButton::new(&b.custom_id)
                .label(&b.label)
                .style(style)
                .disabled(b.disabled)
        })
        .collect();
    CreateActionRow::Buttons(buttons)
}

/// Discord picks the MIME type from the file name, so `content_type` only
/// has to agree with the extension.
fn to_attachments(view: &MessageView) -> Vec<CreateAttachment> {
    view.attachments
        .iter()
        .map(|file| CreateAttachment::bytes(file.data.clone(), file.filename.clone()))
        .collect()
}

fn response_message(view: &MessageView) -> CreateInteractionResponseMessage {
    let mut msg = CreateInteractionResponseMessage::new()
        .embeds(view.embeds.iter().map(to_embed).collect())
        .components(view.components.iter().map(to_row).collect());
    if let Some(content) = &view.content {
        msg = msg.content(content);
    }
    if view.ephemeral {
        msg = msg.ephemeral(true);
    }
    msg
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    async fn respond(&self, handle: &InteractionHandle, view: MessageView) -> Result<(), PlatformError> {
        let response = CreateInteractionResponse::Message(response_message(&view));
        self.http
            .create_interaction_response(
                handle.interaction_id.into(),
                &handle.token,
                &response,
                to_attachments(&view),
            )
            .await
            .map_err(|e| classify("respond", &e))
    }

    async fn defer(&self, handle: &InteractionHandle, ephemeral: bool) -> Result<(), PlatformError> {
        let mut msg = CreateInteractionResponseMessage::new();
        if ephemeral {
            msg = msg.ephemeral(true);
        }
        let response = CreateInteractionResponse::Defer(msg);
        self.http
            .create_interaction_response(handle.interaction_id.into(), &handle.token, &response, Vec::new())
            .await
            .map_err(|e| classify("defer", &e))?;
        debug!(interaction_id = handle.interaction_id, ephemeral, "Deferred interaction");
        Ok(())
    }

    async fn edit_response(&self, handle: &InteractionHandle, view: MessageView) -> Result<u64, PlatformError> {
        let mut builder = EditInteractionResponse::new()
            .embeds(view.embeds.iter().map(to_embed).collect())
            .components(view.components.iter().map(to_row).collect());
        if let Some(content) = &view.content {
            builder = builder.content(content);
        }
        let message = self
            .http
            .edit_original_interaction_response(&handle.token, &builder, to_attachments(&view))
            .await
            .map_err(|e| classify("edit_response", &e))?;
        Ok(message.id.get())
    }

    async fn followup(&self, handle: &InteractionHandle, view: MessageView) -> Result<u64, PlatformError> {
        let mut builder = CreateInteractionResponseFollowup::new()
            .embeds(view.embeds.iter().map(to_embed).collect())
            .components(view.components.iter().map(to_row).collect());
        if let Some(content) = &view.content {
            builder = builder.content(content);
        }
        if view.ephemeral {
            builder = builder.ephemeral(true);
        }
        let message = self
            .http
            .create_followup_message(&handle.token, &builder, to_attachments(&view))
            .await
            .map_err(|e| classify("followup", &e))?;
        Ok(message.id.get())
    }

    async fn update_message(&self, handle: &InteractionHandle, view: MessageView) -> Result<(), PlatformError> {
        let response = CreateInteractionResponse::UpdateMessage(response_message(&view));
        self.http
            .create_interaction_response(
                handle.interaction_id.into(),
                &handle.token,
                &response,
                to_attachments(&view),
            )
            .await
            .map_err(|e| classify("update_message", &e))
    }

    async fn send_channel_message(&self, channel_id: u64, view: MessageView) -> Result<u64, PlatformError> {
        let mut builder = CreateMessage::new()
            .embeds(view.embeds.iter().map(to_embed).collect())
            .components(view.components.iter().map(to_row).collect())
            .add_files(to_attachments(&view));
        if let Some(content) = &view.content {
            builder = builder.content(content);
        }
        let message = ChannelId::new(channel_id)
            .send_message(&*self.http, builder)
            .await
            .map_err(|e| classify("send_channel_message", &e))?;
        Ok(message.id.get())
    }
}
