//! Per-conversation context for the search and rating flows.
//!
//! A conversation holds at most one entry. Putting a new one replaces the
//! previous, and every terminal path of a flow clears it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::{InMemStorage, Storage};
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{MAX_RATING, MAX_SEARCH_QUERY_CHARS, MIN_RATING};
use crate::errors::InputError;
use crate::token::Origin;

/// Conversation key; the Telegram chat id
pub type ConversationId = i64;

/// Which view of an item the rating flow must restore afterwards
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatedView {
    Description,
    ReaderPage(u32),
}

/// State that does not fit into a button token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEntry {
    /// Waiting for a free-text query
    Searching {
        origin: Origin,
        /// The prompt to retract once the query arrives
        prompt_message_id: Option<i32>,
    },
    /// Last completed search, so its result pages can be flipped
    SearchResults { origin: Origin, query: String },
    /// Waiting for a score for `content`
    Rating {
        content: i64,
        origin: Origin,
        view: RatedView,
        /// The message showing the score buttons
        message_id: Option<i32>,
    },
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `entry`, replacing whatever the conversation held
    async fn put(&self, conversation: ConversationId, entry: SessionEntry) -> Result<()>;

    async fn get(&self, conversation: ConversationId) -> Result<Option<SessionEntry>>;

    /// Remove and return the conversation's entry
    async fn clear(&self, conversation: ConversationId) -> Result<Option<SessionEntry>>;
}

/// A stored value and the moment it was last written
#[derive(Clone, Debug)]
pub struct Stamped<T> {
    pub value: T,
    pub touched: Instant,
}

impl<T> Stamped<T> {
    pub fn now(value: T) -> Self {
        Self {
            value,
            touched: Instant::now(),
        }
    }
}

/// Session store over a teloxide dialogue storage, with optional idle expiry.
///
/// The storage holds the entries; `conversations` only remembers which keys
/// were written so idle ones can be purged without a lookup from the chat.
pub struct DialogueSessionStore<S> {
    storage: Arc<S>,
    conversations: Mutex<HashSet<ConversationId>>,
    idle_timeout: Option<Duration>,
}

/// Process-local store
pub type InMemSessionStore = DialogueSessionStore<InMemStorage<Stamped<SessionEntry>>>;

impl InMemSessionStore {
    pub fn new(idle_timeout: Option<Duration>) -> Self {
        Self::with_storage(InMemStorage::new(), idle_timeout)
    }
}

impl<S> DialogueSessionStore<S>
where
    S: Storage<Stamped<SessionEntry>> + Send + Sync + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    pub fn with_storage(storage: Arc<S>, idle_timeout: Option<Duration>) -> Self {
        Self {
            storage,
            conversations: Mutex::new(HashSet::new()),
            idle_timeout,
        }
    }

    fn expired(&self, touched: Instant, now: Instant) -> bool {
        self.idle_timeout
            .is_some_and(|timeout| now.duration_since(touched) >= timeout)
    }

    async fn load(&self, conversation: ConversationId) -> Result<Option<Stamped<SessionEntry>>> {
        self.storage
            .clone()
            .get_dialogue(ChatId(conversation))
            .await
            .context("Failed to read session entry")
    }

    async fn remove(&self, conversation: ConversationId) -> Result<()> {
        self.conversations.lock().await.remove(&conversation);
        self.storage
            .clone()
            .remove_dialogue(ChatId(conversation))
            .await
            .context("Failed to remove session entry")
    }

    /// Drop entries idle for longer than the timeout; returns how many went
    pub async fn purge_idle(&self) -> Result<usize> {
        let now = Instant::now();
        let known: Vec<ConversationId> = self.conversations.lock().await.iter().copied().collect();
        let mut purged = 0;
        for conversation in known {
            match self.load(conversation).await? {
                Some(stamped) if self.expired(stamped.touched, now) => {
                    self.remove(conversation).await?;
                    purged += 1;
                }
                Some(_) => {}
                None => {
                    self.conversations.lock().await.remove(&conversation);
                }
            }
        }
        if purged > 0 {
            debug!(purged, "Purged idle session contexts");
        }
        Ok(purged)
    }

    pub async fn len(&self) -> usize {
        self.conversations.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<S> SessionStore for DialogueSessionStore<S>
where
    S: Storage<Stamped<SessionEntry>> + Send + Sync + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    async fn put(&self, conversation: ConversationId, entry: SessionEntry) -> Result<()> {
        self.storage
            .clone()
            .update_dialogue(ChatId(conversation), Stamped::now(entry))
            .await
            .context("Failed to store session entry")?;
        self.conversations.lock().await.insert(conversation);
        Ok(())
    }

    async fn get(&self, conversation: ConversationId) -> Result<Option<SessionEntry>> {
        match self.load(conversation).await? {
            Some(stamped) if self.expired(stamped.touched, Instant::now()) => {
                self.remove(conversation).await?;
                Ok(None)
            }
            Some(stamped) => Ok(Some(stamped.value)),
            None => Ok(None),
        }
    }

    async fn clear(&self, conversation: ConversationId) -> Result<Option<SessionEntry>> {
        let Some(stamped) = self.load(conversation).await? else {
            self.conversations.lock().await.remove(&conversation);
            return Ok(None);
        };
        self.remove(conversation).await?;
        Ok(Some(stamped.value))
    }
}

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("Whitespace pattern should be valid");
}

/// Validates a search query, returning it trimmed with inner whitespace collapsed
pub fn validate_search_query(query: &str) -> Result<String, InputError> {
    let normalized = WHITESPACE.replace_all(query.trim(), " ");

    if normalized.is_empty() {
        return Err(InputError::EmptyQuery);
    }

    if normalized.chars().count() > MAX_SEARCH_QUERY_CHARS {
        return Err(InputError::QueryTooLong);
    }

    Ok(normalized.into_owned())
}

/// Validates a typed or pressed rating value
pub fn parse_rating(input: &str) -> Result<i16, InputError> {
    let value: i16 = input.trim().parse().map_err(|_| InputError::NotANumber)?;
    if !(MIN_RATING..=MAX_RATING).contains(&value) {
        return Err(InputError::OutOfRange);
    }
    Ok(value)
}
