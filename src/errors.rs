//! # Error Types Module
//!
//! Typed failures for the transport boundary and for user input inside the
//! overlay flows. Data-store failures travel as `anyhow::Error` instead.

use thiserror::Error;

use crate::token::TokenError;

/// Failures reported by a [`crate::transport::Transport`]
#[derive(Debug, Error)]
pub enum TransportError {
    /// The message can no longer be edited (too old, deleted, foreign)
    #[error("edit rejected: {0}")]
    EditRejected(String),
    /// Any other request failure
    #[error("request failed: {0}")]
    Request(String),
    /// Stored media is missing or could not be uploaded
    #[error("media unavailable: {0}")]
    MediaUnavailable(String),
    /// A button could not be encoded
    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Rejected free-text input; the overlay stays active
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("search query is empty")]
    EmptyQuery,
    #[error("search query is longer than 100 characters")]
    QueryTooLong,
    #[error("rating is not a number")]
    NotANumber,
    #[error("rating must be between 1 and 5")]
    OutOfRange,
}

impl InputError {
    /// Localisation key of the corrective copy shown to the user
    pub fn message_key(&self) -> &'static str {
        match self {
            InputError::EmptyQuery => "search-query-empty",
            InputError::QueryTooLong => "search-query-too-long",
            InputError::NotANumber | InputError::OutOfRange => "rating-invalid",
        }
    }
}
