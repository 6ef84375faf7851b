//! Telegram implementation of the transport

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId as TgMessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::debug;

use crate::catalog::ContentKind;
use crate::errors::TransportError;
use crate::menu::Keyboard;
use crate::session::ConversationId;
use crate::transport::{MediaDelivery, MediaSource, MessageId, Transport};

use super::ui_builder::inline_keyboard;

/// Sends and edits HTML messages through the Bot API
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn request_error(e: RequestError) -> TransportError {
    TransportError::Request(e.to_string())
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        chat: ConversationId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let mut request = self
            .bot
            .send_message(ChatId(chat), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_keyboard(keyboard)?);
        }
        let sent = request.await.map_err(request_error)?;
        Ok(sent.id.0)
    }

    async fn edit_text(
        &self,
        chat: ConversationId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let mut request = self
            .bot
            .edit_message_text(ChatId(chat), TgMessageId(message), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(inline_keyboard(keyboard)?);
        }
        match request.await {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => {
                debug!(chat_id = chat, message_id = message, "Message not modified");
                Ok(())
            }
            Err(RequestError::Api(e)) => Err(TransportError::EditRejected(e.to_string())),
            Err(e) => Err(request_error(e)),
        }
    }

    async fn delete(&self, chat: ConversationId, message: MessageId) -> Result<(), TransportError> {
        self.bot
            .delete_message(ChatId(chat), TgMessageId(message))
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn deliver_media(
        &self,
        chat: ConversationId,
        media: &MediaDelivery,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let file = match &media.source {
            MediaSource::File(path) => {
                if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                    return Err(TransportError::MediaUnavailable(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
                InputFile::file(path.clone())
            }
            MediaSource::Url(url) => InputFile::url(url.clone()),
        };
        let markup = keyboard.map(inline_keyboard).transpose()?;
        let chat_id = ChatId(chat);
        let caption = media.caption.clone();

        let sent = match media.kind {
            ContentKind::Image => {
                let mut request = self
                    .bot
                    .send_photo(chat_id, file)
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await
            }
            ContentKind::Video => {
                let mut request = self
                    .bot
                    .send_video(chat_id, file)
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await
            }
            ContentKind::Audio => {
                let mut request = self
                    .bot
                    .send_audio(chat_id, file)
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await
            }
            _ => {
                let mut request = self
                    .bot
                    .send_document(chat_id, file)
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(markup) = markup {
                    request = request.reply_markup(markup);
                }
                request.await
            }
        }
        .map_err(|e| TransportError::MediaUnavailable(e.to_string()))?;

        Ok(sent.id.0)
    }
}
