//! Platform-neutral message views produced by the renderer and consumed by
//! the chat platform adapter.

use serde::{Deserialize, Serialize};

/// Embed field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Embed footer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

/// Message embed
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Pagination state lives here as `Page X/Y`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

/// Button style
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Secondary,
    Success,
    Danger,
}

/// A button component. `custom_id` is echoed back on press.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Button {
    pub style: ButtonStyle,
    pub label: String,
    pub custom_id: String,
    #[serde(default)]
    pub disabled: bool,
}

/// An action row: up to 5 buttons
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionRow {
    #[serde(default)]
    pub buttons: Vec<Button>,
}

/// A file uploaded alongside a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachedFile {
    pub filename: String,
    pub content_type: String,
    #[serde(with = "crate::events::base64_bytes")]
    pub data: Vec<u8>,
}

/// Everything needed to send or edit one chat message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub components: Vec<ActionRow>,
    #[serde(default)]
    pub attachments: Vec<AttachedFile>,
    #[serde(default)]
    pub ephemeral: bool,
}

impl MessageView {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn ephemeral_text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ephemeral: true,
            ..Default::default()
        }
    }

    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn with_row(mut self, row: ActionRow) -> Self {
        self.components.push(row);
        self
    }

    pub fn with_attachment(mut self, file: AttachedFile) -> Self {
        self.attachments.push(file);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_bytes_travel_as_base64() {
        let file = AttachedFile {
            filename: "tag_history.png".into(),
            content_type: "image/png".into(),
            data: vec![0x89, b'P', b'N', b'G'],
        };
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["data"], "iVBORw==");
        let back: AttachedFile = serde_json::from_value(json).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn view_builders_compose() {
        let view = MessageView::ephemeral_text("hi")
            .with_embed(Embed {
                title: Some("t".into()),
                ..Default::default()
            })
            .with_row(ActionRow::default());
        assert!(view.ephemeral);
        assert_eq!(view.content.as_deref(), Some("hi"));
        assert_eq!(view.embeds.len(), 1);
        assert_eq!(view.components.len(), 1);
    }
}
