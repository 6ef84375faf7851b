//! # Catalog Module
//!
//! Read-side contract over the path → category → topic → content hierarchy,
//! plus the two writes the bot performs (rating upserts and view events).
//!
//! Every listing is filtered to active entities on every traversed link,
//! de-duplicated, and ordered by `(name, id)` so pagination stays stable
//! across calls. Unknown ids yield empty results rather than errors; an `Err`
//! from this trait means the data store itself is unreachable.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use memory::InMemoryCatalog;

/// Shared shape of the three hierarchy levels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Section {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
}

/// Top-level audience segment
pub type Path = Section;
/// Second hierarchy level
pub type Category = Section;
/// Third hierarchy level
pub type Topic = Section;

/// Kind tag of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Pdf,
    Image,
    Text,
    Video,
    Audio,
    Link,
    Other,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Pdf => "PDF",
            ContentKind::Image => "IMAGE",
            ContentKind::Text => "TEXT",
            ContentKind::Video => "VIDEO",
            ContentKind::Audio => "AUDIO",
            ContentKind::Link => "LINK",
            ContentKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PDF" => Ok(ContentKind::Pdf),
            "IMAGE" => Ok(ContentKind::Image),
            "TEXT" => Ok(ContentKind::Text),
            "VIDEO" => Ok(ContentKind::Video),
            "AUDIO" => Ok(ContentKind::Audio),
            "LINK" => Ok(ContentKind::Link),
            "OTHER" => Ok(ContentKind::Other),
            other => Err(anyhow::anyhow!("Unknown content kind: {other}")),
        }
    }
}

/// A single distributable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub kind: ContentKind,
    /// Stored payload, relative to the media root
    pub file_path: Option<String>,
    /// External location, used by links and URL-hosted media
    pub url: Option<String>,
}

/// Mean of all ratings recorded for an item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

/// The Telegram user behind an interaction
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Visitor {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub language_code: Option<String>,
}

/// "Content viewed" event for the statistics collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewEvent {
    pub rater_id: i64,
    pub content_id: i64,
    pub viewed_at: DateTime<Utc>,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_paths(&self) -> Result<Vec<Path>>;

    async fn get_path(&self, path: i64) -> Result<Option<Path>>;

    async fn get_category(&self, category: i64) -> Result<Option<Category>>;

    async fn get_topic(&self, topic: i64) -> Result<Option<Topic>>;

    /// Categories with at least one active item under `path`
    async fn list_categories(&self, path: i64) -> Result<Vec<Category>>;

    /// Topics with at least one active item under `(path, category)`
    async fn list_topics(&self, path: i64, category: i64) -> Result<Vec<Topic>>;

    /// Existence check with the same filter as [`Catalog::list_topics`]
    async fn has_topics(&self, path: i64, category: i64) -> Result<bool>;

    /// Items under `(path, category)`; `topic: None` means every topic
    async fn list_content(
        &self,
        path: i64,
        category: i64,
        topic: Option<i64>,
    ) -> Result<Vec<ContentItem>>;

    /// Case-insensitive substring match on item names, ignoring hierarchy
    async fn search_content(&self, needle: &str) -> Result<Vec<ContentItem>>;

    async fn get_content(&self, content: i64) -> Result<Option<ContentItem>>;

    async fn rating_summary(&self, content: i64) -> Result<Option<RatingSummary>>;

    /// Insert or replace the visitor's rating for `content`
    async fn upsert_rating(&self, content: i64, rater: &Visitor, value: i16) -> Result<()>;

    async fn record_view(&self, event: ViewEvent) -> Result<()>;

    /// Register the visitor or bump their last activity
    async fn touch_user(&self, visitor: &Visitor) -> Result<()>;
}
