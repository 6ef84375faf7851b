//! Dialogue Manager module for the search and rating overlays

use anyhow::Result;
use tracing::{debug, info};

use crate::localization::t_lang;
use crate::menu::{origin_token, MenuState};
use crate::session::{parse_rating, validate_search_query, RatedView, SessionEntry};
use crate::token::{NavToken, Origin};
use crate::transport::{prompt_free_text, schedule_delete, MessageId};

use super::{BotEngine, Interaction};

impl BotEngine {
    /// Replace the active menu with the search prompt and wait for text
    pub async fn start_search(&self, ctx: &Interaction, origin: Origin) -> Result<()> {
        let prompt = prompt_free_text(
            self.transport.as_ref(),
            ctx.chat,
            ctx.message,
            &t_lang("search-prompt", ctx.language()),
        )
        .await;

        self.sessions
            .put(
                ctx.chat,
                SessionEntry::Searching {
                    origin,
                    prompt_message_id: prompt,
                },
            )
            .await?;
        debug!(chat_id = ctx.chat, ?origin, "Search started");
        Ok(())
    }

    /// Free text arriving while a search prompt is active
    pub async fn handle_search_query(
        &self,
        ctx: &Interaction,
        origin: Origin,
        prompt_message_id: Option<MessageId>,
        input: &str,
    ) -> Result<()> {
        let lang = ctx.language();
        self.discard(ctx.chat, ctx.message).await;

        let query = match validate_search_query(input) {
            Ok(query) => query,
            Err(e) => {
                debug!(chat_id = ctx.chat, error = %e, "Rejected search query");
                let text = format!(
                    "{}\n\n{}",
                    t_lang(e.message_key(), lang),
                    t_lang("search-prompt", lang)
                );
                let prompt = prompt_free_text(
                    self.transport.as_ref(),
                    ctx.chat,
                    prompt_message_id,
                    &text,
                )
                .await;
                self.sessions
                    .put(
                        ctx.chat,
                        SessionEntry::Searching {
                            origin,
                            prompt_message_id: prompt,
                        },
                    )
                    .await?;
                return Ok(());
            }
        };

        self.discard(ctx.chat, prompt_message_id).await;

        let screen = self.nav.search_results(origin, &query, 1, lang).await?;
        info!(chat_id = ctx.chat, query = %query, "Search completed");
        self.show(ctx.chat, None, &screen).await;

        self.sessions
            .put(ctx.chat, SessionEntry::SearchResults { origin, query })
            .await?;
        Ok(())
    }

    /// Another page of the last search, if the conversation still has one
    pub async fn search_page(&self, ctx: &Interaction, page: u32) -> Result<()> {
        let lang = ctx.language();
        match self.sessions.get(ctx.chat).await? {
            Some(SessionEntry::SearchResults { origin, query }) => {
                let screen = self.nav.search_results(origin, &query, page, lang).await?;
                self.show(ctx.chat, ctx.message, &screen).await;
            }
            other => {
                debug!(chat_id = ctx.chat, session = ?other, "Search results are gone");
                if other.is_some() {
                    self.sessions.clear(ctx.chat).await?;
                }
                let screen = self.nav.unavailable(NavToken::Root, lang);
                self.show(ctx.chat, ctx.message, &screen).await;
            }
        }
        Ok(())
    }

    /// Show the score buttons, remembering which view to restore afterwards
    pub async fn start_rating(
        &self,
        ctx: &Interaction,
        origin: Origin,
        content: i64,
        reader_page: Option<u32>,
    ) -> Result<()> {
        let view = reader_page.map_or(RatedView::Description, RatedView::ReaderPage);
        let screen = self
            .nav
            .rating_prompt(origin, content, view, ctx.language())
            .await?;
        let message = self.show(ctx.chat, ctx.message, &screen).await;

        if screen.state == MenuState::Unavailable {
            return Ok(());
        }

        self.sessions
            .put(
                ctx.chat,
                SessionEntry::Rating {
                    content,
                    origin,
                    view,
                    message_id: message,
                },
            )
            .await?;
        debug!(chat_id = ctx.chat, content_id = content, ?view, "Rating started");
        Ok(())
    }

    /// A score, pressed (`typed == false`) or typed; swallowed when no rating is in progress
    pub async fn submit_rating(&self, ctx: &Interaction, input: &str, typed: bool) -> Result<()> {
        let lang = ctx.language();
        let Some(SessionEntry::Rating {
            content,
            origin,
            view,
            message_id,
        }) = self.sessions.get(ctx.chat).await?
        else {
            debug!(chat_id = ctx.chat, "Score without an active rating, ignoring");
            return Ok(());
        };

        let target = if typed {
            self.discard(ctx.chat, ctx.message).await;
            message_id
        } else {
            ctx.message.or(message_id)
        };

        let value = match parse_rating(input) {
            Ok(value) => value,
            Err(e) => {
                debug!(chat_id = ctx.chat, error = %e, "Rejected rating");
                let mut screen = self.nav.rating_prompt(origin, content, view, lang).await?;
                screen.text = format!("{}\n\n{}", t_lang(e.message_key(), lang), screen.text);
                let message = self.show(ctx.chat, target, &screen).await;
                if message != message_id {
                    self.sessions
                        .put(
                            ctx.chat,
                            SessionEntry::Rating {
                                content,
                                origin,
                                view,
                                message_id: message,
                            },
                        )
                        .await?;
                }
                return Ok(());
            }
        };

        if self.nav.catalog().get_content(content).await?.is_none() {
            debug!(chat_id = ctx.chat, content_id = content, "Rated item withdrawn");
            self.sessions.clear(ctx.chat).await?;
            let screen = self.nav.unavailable(origin_token(origin), lang);
            self.show(ctx.chat, target, &screen).await;
            return Ok(());
        }

        self.nav
            .catalog()
            .upsert_rating(content, &ctx.visitor, value)
            .await?;

        match self
            .transport
            .send_text(ctx.chat, &t_lang("rating-thanks", lang), None)
            .await
        {
            Ok(ack) => {
                schedule_delete(
                    self.transport.clone(),
                    ctx.chat,
                    ack,
                    self.nav.config().ack_delete_after,
                );
            }
            Err(e) => debug!(chat_id = ctx.chat, error = %e, "Failed to send rating ack"),
        }

        let screen = self.nav.rated_view(origin, content, view, lang).await?;
        self.show(ctx.chat, target, &screen).await;

        self.sessions.clear(ctx.chat).await?;
        info!(chat_id = ctx.chat, content_id = content, rating = value, "Rating submitted");
        Ok(())
    }
}
