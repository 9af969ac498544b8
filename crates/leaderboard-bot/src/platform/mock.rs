//! Recording [`ChatPlatform`] for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use leaderboard_types::MessageView;
use leaderboard_types::errors::DiscordErrorCode;

use crate::errors::PlatformError;
use crate::platform::{ChatPlatform, InteractionHandle};

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Respond { interaction_id: u64, view: MessageView },
    Defer { interaction_id: u64, ephemeral: bool },
    Edit { interaction_id: u64, view: MessageView },
    Followup { interaction_id: u64, view: MessageView },
    Update { interaction_id: u64, view: MessageView },
    ChannelMessage { channel_id: u64, view: MessageView },
}

impl PlatformCall {
    pub fn view(&self) -> Option<&MessageView> {
        match self {
            PlatformCall::Respond { view, .. }
            | PlatformCall::Edit { view, .. }
            | PlatformCall::Followup { view, .. }
            | PlatformCall::Update { view, .. }
            | PlatformCall::ChannelMessage { view, .. } => Some(view),
            PlatformCall::Defer { .. } => None,
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.view().and_then(|v| v.content.as_deref())
    }
}

#[derive(Default)]
pub struct MockPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    failures: Mutex<VecDeque<(&'static str, PlatformError)>>,
    next_message_id: AtomicU64,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicU64::new(9_000),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<MessageView> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Edit { view, .. } => Some(view),
                _ => None,
            })
            .collect()
    }

    pub fn responses(&self) -> Vec<MessageView> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::Respond { view, .. } => Some(view),
                _ => None,
            })
            .collect()
    }

    /// Make the next call to `operation` fail with `code`.
    pub fn fail_next(&self, operation: &'static str, code: DiscordErrorCode, http_status: u16) {
        self.failures.lock().unwrap().push_back((
            operation,
            PlatformError::new(operation, code, http_status, "injected failure"),
        ));
    }

    fn call(&self, operation: &'static str, call: PlatformCall) -> Result<(), PlatformError> {
        let mut failures = self.failures.lock().unwrap();
        if let Some(pos) = failures.iter().position(|(op, _)| *op == operation)
            && let Some((_, err)) = failures.remove(pos)
        {
            return Err(err);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn message_id(&self) -> u64 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    async fn respond(&self, handle: &InteractionHandle, view: MessageView) -> Result<(), PlatformError> {
        self.call(
            "respond",
            PlatformCall::Respond {
                interaction_id: handle.interaction_id,
                view,
            },
        )
    }

    async fn defer(&self, handle: &InteractionHandle, ephemeral: bool) -> Result<(), PlatformError> {
        self.call(
            "defer",
            PlatformCall::Defer {
                interaction_id: handle.interaction_id,
                ephemeral,
            },
        )
    }

    async fn edit_response(&self, handle: &InteractionHandle, view: MessageView) -> Result<u64, PlatformError> {
        self.call(
            "edit_response",
            PlatformCall::Edit {
                interaction_id: handle.interaction_id,
                view,
            },
        )?;
        Ok(self.message_id())
    }

    async fn followup(&self, handle: &InteractionHandle, view: MessageView) -> Result<u64, PlatformError> {
        self.call(
            "followup",
            PlatformCall::Followup {
                interaction_id: handle.interaction_id,
                view,
            },
        )?;
        Ok(self.message_id())
    }

    async fn update_message(&self, handle: &InteractionHandle, view: MessageView) -> Result<(), PlatformError> {
        self.call(
            "update_message",
            PlatformCall::Update {
                interaction_id: handle.interaction_id,
                view,
            },
        )
    }

    async fn send_channel_message(&self, channel_id: u64, view: MessageView) -> Result<u64, PlatformError> {
        self.call("send_channel_message", PlatformCall::ChannelMessage { channel_id, view })?;
        Ok(self.message_id())
    }
}
