//! Message Handler module for `/start` and free-text input

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::session::SessionEntry;

use super::callback_handler::visitor_from;
use super::{BotEngine, Interaction};

/// Handle incoming messages
pub async fn message_handler(_bot: Bot, msg: Message, engine: Arc<BotEngine>) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    debug!(user_id = %user.id, "Received message from user");

    let visitor = visitor_from(user);
    if let Err(e) = engine.nav.catalog().touch_user(&visitor).await {
        warn!(user_id = %user.id, error = %e, "Failed to record user activity");
    }

    let Some(text) = msg.text() else {
        debug!(user_id = %user.id, "Ignoring non-text message");
        return Ok(());
    };

    let interaction = Interaction {
        chat: msg.chat.id.0,
        message: Some(msg.id.0),
        visitor,
    };
    engine.handle_text(&interaction, text).await
}

fn is_start_command(text: &str) -> bool {
    text.split_whitespace()
        .next()
        .map(|command| command.split('@').next() == Some("/start"))
        .unwrap_or(false)
}

impl BotEngine {
    /// `/start`, or free text for whichever overlay is active
    pub async fn handle_text(&self, ctx: &Interaction, text: &str) -> Result<()> {
        if is_start_command(text) {
            return self.handle_start(ctx).await;
        }

        match self.sessions.get(ctx.chat).await? {
            Some(SessionEntry::Searching {
                origin,
                prompt_message_id,
            }) => {
                self.handle_search_query(ctx, origin, prompt_message_id, text)
                    .await
            }
            Some(SessionEntry::Rating { .. }) => self.submit_rating(ctx, text, true).await,
            Some(SessionEntry::SearchResults { .. }) | None => {
                debug!(chat_id = ctx.chat, "Free text without an active overlay, ignoring");
                Ok(())
            }
        }
    }

    /// Reset the conversation and send the root menu as a fresh message
    pub async fn handle_start(&self, ctx: &Interaction) -> Result<()> {
        self.sessions.clear(ctx.chat).await?;
        self.discard(ctx.chat, ctx.message).await;

        let screen = self.nav.root(ctx.language()).await?;
        self.show(ctx.chat, None, &screen).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_command_detection() {
        assert!(is_start_command("/start"));
        assert!(is_start_command("/start@content_nav_bot"));
        assert!(is_start_command("  /start payload"));
        assert!(!is_start_command("start"));
        assert!(!is_start_command("/startle"));
        assert!(!is_start_command(""));
    }
}
