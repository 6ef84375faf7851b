//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `callback_handler`: One handler per decoded navigation token
//! - `message_handler`: `/start` and free text for the active overlay
//! - `dialogue_manager`: The search and rating overlay flows
//! - `ui_builder`: Keyboards to Telegram inline markup
//! - `telegram`: The teloxide implementation of [`Transport`]

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod telegram;
pub mod ui_builder;

use std::sync::Arc;

use crate::catalog::Visitor;
use crate::menu::{Navigator, Screen};
use crate::session::{ConversationId, SessionStore};
use crate::transport::{render, MessageId, Transport};

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;
pub use telegram::TelegramTransport;

/// One incoming interaction, stripped of transport details
#[derive(Debug, Clone)]
pub struct Interaction {
    pub chat: ConversationId,
    /// The message the interaction came from: the pressed menu for a
    /// callback, the user's own message for text
    pub message: Option<MessageId>,
    pub visitor: Visitor,
}

impl Interaction {
    pub fn language(&self) -> Option<&str> {
        self.visitor.language_code.as_deref()
    }
}

/// Everything a handler needs, shared across all conversations
pub struct BotEngine {
    pub nav: Navigator,
    pub sessions: Arc<dyn SessionStore>,
    pub transport: Arc<dyn Transport>,
}

impl BotEngine {
    pub fn new(
        nav: Navigator,
        sessions: Arc<dyn SessionStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            nav,
            sessions,
            transport,
        }
    }

    /// Render `screen` over `current`, falling back to a fresh message
    pub(crate) async fn show(
        &self,
        chat: ConversationId,
        current: Option<MessageId>,
        screen: &Screen,
    ) -> Option<MessageId> {
        render(
            self.transport.as_ref(),
            chat,
            current,
            &screen.text,
            Some(&screen.keyboard),
        )
        .await
    }

    /// Delete a message, logging instead of failing
    pub(crate) async fn discard(&self, chat: ConversationId, message: Option<MessageId>) {
        if let Some(message) = message {
            if let Err(e) = self.transport.delete(chat, message).await {
                tracing::debug!(
                    chat_id = chat,
                    message_id = message,
                    error = %e,
                    "Could not delete message"
                );
            }
        }
    }
}
