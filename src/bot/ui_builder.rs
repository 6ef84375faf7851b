//! UI Builder module for turning keyboards into Telegram inline markup

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::menu::{Button, ButtonAction, Keyboard};
use crate::token::TokenError;

/// Telegram button for a single abstract button
pub fn inline_button(button: &Button) -> Result<InlineKeyboardButton, TokenError> {
    Ok(match &button.action {
        ButtonAction::Navigate(token) => {
            InlineKeyboardButton::callback(button.label.clone(), token.encode()?)
        }
        ButtonAction::Url(url) => InlineKeyboardButton::url(button.label.clone(), url.clone()),
    })
}

/// Create the inline keyboard for a screen, failing if any token is too long
pub fn inline_keyboard(keyboard: &Keyboard) -> Result<InlineKeyboardMarkup, TokenError> {
    let rows = keyboard
        .rows
        .iter()
        .filter(|row| !row.is_empty())
        .map(|row| row.iter().map(inline_button).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InlineKeyboardMarkup::new(rows))
}
