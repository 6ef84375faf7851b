//! # Transport Module
//!
//! The chat-side collaborator the engine talks to, plus the rendering policy
//! on top of it: one active message per conversation, edited in place, and
//! replaced by delete-and-resend when the edit is rejected.

use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::catalog::ContentKind;
use crate::errors::TransportError;
use crate::menu::Keyboard;
use crate::session::ConversationId;

/// Handle of a sent message
pub type MessageId = i32;

/// Where a media payload lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    File(PathBuf),
    Url(reqwest::Url),
}

/// Out-of-band media to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDelivery {
    pub kind: ContentKind,
    pub source: MediaSource,
    /// HTML caption
    pub caption: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a new HTML message
    async fn send_text(
        &self,
        chat: ConversationId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    /// Replace text and keyboard of an existing message; `None` removes the keyboard
    async fn edit_text(
        &self,
        chat: ConversationId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    async fn delete(&self, chat: ConversationId, message: MessageId) -> Result<(), TransportError>;

    /// Send a photo, video, audio or document depending on `media.kind`
    async fn deliver_media(
        &self,
        chat: ConversationId,
        media: &MediaDelivery,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;
}

/// Show `text` as the conversation's active message
///
/// Edits `current` in place when given. A rejected edit is retried once by
/// deleting `current` and sending a fresh message; if that fails too the
/// failure is logged and `None` is returned. A keyboard that cannot be
/// encoded leaves `current` untouched.
pub async fn render(
    transport: &dyn Transport,
    chat: ConversationId,
    current: Option<MessageId>,
    text: &str,
    keyboard: Option<&Keyboard>,
) -> Option<MessageId> {
    let keyboard = keyboard.filter(|k| !k.is_empty());

    if let Some(message) = current {
        match transport.edit_text(chat, message, text, keyboard).await {
            Ok(()) => return Some(message),
            Err(TransportError::Token(e)) => {
                // A resend would fail the same way; keep what is on screen
                error!(chat_id = chat, message_id = message, error = %e, "Keyboard not encodable");
                return Some(message);
            }
            Err(e) => {
                warn!(chat_id = chat, message_id = message, error = %e, "Edit failed, resending");
                if let Err(e) = transport.delete(chat, message).await {
                    debug!(
                        chat_id = chat,
                        message_id = message,
                        error = %e,
                        "Could not delete stale message"
                    );
                }
            }
        }
    }

    match transport.send_text(chat, text, keyboard).await {
        Ok(message) => Some(message),
        Err(e) => {
            error!(chat_id = chat, error = %e, "Failed to render message");
            None
        }
    }
}

/// Turn the active message into a plain prompt awaiting free text
pub async fn prompt_free_text(
    transport: &dyn Transport,
    chat: ConversationId,
    current: Option<MessageId>,
    prompt: &str,
) -> Option<MessageId> {
    render(transport, chat, current, prompt, None).await
}

/// Run `task` after `delay` on a detached task
pub fn schedule<F>(delay: Duration, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        task.await;
    })
}

/// Delete `message` after `delay`; a failed deletion is only logged
pub fn schedule_delete(
    transport: Arc<dyn Transport>,
    chat: ConversationId,
    message: MessageId,
    delay: Duration,
) -> JoinHandle<()> {
    schedule(delay, async move {
        if let Err(e) = transport.delete(chat, message).await {
            debug!(chat_id = chat, message_id = message, error = %e, "Scheduled deletion failed");
        }
    })
}
