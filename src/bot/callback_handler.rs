//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::User;
use tracing::{debug, error, warn};

use crate::catalog::{ViewEvent, Visitor};
use crate::localization::t_lang;
use crate::menu::{origin_token, MenuState, Screen};
use crate::token::{NavToken, Origin};

use super::{BotEngine, Interaction};

/// The visitor behind a Telegram user
pub fn visitor_from(user: &User) -> Visitor {
    Visitor {
        telegram_id: user.id.0 as i64,
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()),
        language_code: user.language_code.clone(),
    }
}

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, engine: Arc<BotEngine>) -> Result<()> {
    debug!(user_id = %q.from.id, "Received callback query from user");

    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        debug!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }

    let visitor = visitor_from(&q.from);
    if let Err(e) = engine.nav.catalog().touch_user(&visitor).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to record user activity");
    }

    let interaction = Interaction {
        chat: q
            .message
            .as_ref()
            .map(|m| m.chat().id.0)
            .unwrap_or(visitor.telegram_id),
        message: q.message.as_ref().map(|m| m.id().0),
        visitor,
    };

    engine
        .handle_callback(&interaction, q.data.as_deref().unwrap_or_default())
        .await
}

impl BotEngine {
    /// Decode a button payload and run the matching transition
    pub async fn handle_callback(&self, ctx: &Interaction, data: &str) -> Result<()> {
        match NavToken::decode(data) {
            Ok(token) => self.handle_token(ctx, token).await,
            Err(e) => {
                warn!(chat_id = ctx.chat, data, error = %e, "Undecodable callback data");
                let screen = self.nav.unavailable(NavToken::Root, ctx.language());
                self.show(ctx.chat, ctx.message, &screen).await;
                Ok(())
            }
        }
    }

    /// Run the transition for an already decoded token
    pub async fn handle_token(&self, ctx: &Interaction, token: NavToken) -> Result<()> {
        let lang = ctx.language();
        debug!(chat_id = ctx.chat, ?token, "Handling navigation token");

        match token {
            NavToken::Noop => return Ok(()),
            NavToken::Score { value } => {
                return self.submit_rating(ctx, &value.to_string(), false).await;
            }
            NavToken::SearchPage { page } => return self.search_page(ctx, page).await,
            _ => {}
        }

        // Any other structured token abandons the active overlay
        if let Some(entry) = self.sessions.clear(ctx.chat).await? {
            debug!(chat_id = ctx.chat, ?entry, "Session context cleared by navigation");
        }

        let screen = match token {
            NavToken::Root => self.nav.root(lang).await?,
            NavToken::Path { path, page } => self.nav.path_menu(path, page, lang).await?,
            NavToken::Category {
                path,
                category,
                page,
            } => self.nav.choose_category(path, category, page, lang).await?,
            NavToken::Content {
                path,
                category,
                topic,
                page,
            } => {
                self.nav
                    .content_menu(path, category, topic, page, lang)
                    .await?
            }
            NavToken::Detail { origin, content } => {
                let screen = self.nav.detail(origin, content, lang).await?;
                self.record_view(ctx, &screen, content).await;
                screen
            }
            NavToken::Read {
                origin,
                content,
                page,
            } => {
                let screen = self.nav.reader(origin, content, page, lang).await?;
                if screen.page == 1 {
                    self.record_view(ctx, &screen, content).await;
                }
                screen
            }
            NavToken::Media { origin, content } => {
                return self.deliver_media(ctx, origin, content).await;
            }
            NavToken::Search { origin } => return self.start_search(ctx, origin).await,
            NavToken::Rate {
                origin,
                content,
                page,
            } => return self.start_rating(ctx, origin, content, page).await,
            NavToken::Noop | NavToken::Score { .. } | NavToken::SearchPage { .. } => return Ok(()),
        };

        self.show(ctx.chat, ctx.message, &screen).await;
        Ok(())
    }

    /// Emit a "content viewed" event for a successfully rendered detail or reader
    async fn record_view(&self, ctx: &Interaction, screen: &Screen, content: i64) {
        if !matches!(
            screen.state,
            MenuState::Detail { .. } | MenuState::Reader { .. }
        ) {
            return;
        }
        let event = ViewEvent {
            rater_id: ctx.visitor.telegram_id,
            content_id: content,
            viewed_at: Utc::now(),
        };
        if let Err(e) = self.nav.catalog().record_view(event).await {
            warn!(chat_id = ctx.chat, content_id = content, error = %e, "Failed to record view");
        }
    }

    /// Loading notice, menu removal, media with a way back, notice removal
    async fn deliver_media(&self, ctx: &Interaction, origin: Origin, content: i64) -> Result<()> {
        let lang = ctx.language();

        let Some((media, keyboard)) = self.nav.media(origin, content, lang).await? else {
            let back = match self.nav.catalog().get_content(content).await? {
                Some(_) => NavToken::Detail { origin, content },
                None => origin_token(origin),
            };
            let screen = self.nav.unavailable(back, lang);
            self.show(ctx.chat, ctx.message, &screen).await;
            return Ok(());
        };

        let loading = match self
            .transport
            .send_text(ctx.chat, &t_lang("file-loading", lang), None)
            .await
        {
            Ok(message) => Some(message),
            Err(e) => {
                debug!(chat_id = ctx.chat, error = %e, "Failed to send loading notice");
                None
            }
        };
        self.discard(ctx.chat, ctx.message).await;

        if let Err(e) = self
            .transport
            .deliver_media(ctx.chat, &media, Some(&keyboard))
            .await
        {
            error!(chat_id = ctx.chat, content_id = content, error = %e, "Media delivery failed");
            if let Err(e) = self
                .transport
                .send_text(ctx.chat, &t_lang("media-error", lang), Some(&keyboard))
                .await
            {
                error!(chat_id = ctx.chat, error = %e, "Failed to report media failure");
            }
        }

        self.discard(ctx.chat, loading).await;
        Ok(())
    }
}
