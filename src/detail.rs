//! # Content Detail Module
//!
//! Turns a single content item into either a description with one primary
//! action, or a window of its stored text for the paginated reader.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::catalog::{ContentItem, ContentKind, RatingSummary};

/// What the main button of a description does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryAction {
    /// Enter the paginated reader
    Read,
    /// Open an external link
    Open(String),
    /// Ask the transport to deliver the payload out of band
    Deliver(ContentKind),
}

/// Description view of an item
#[derive(Debug, Clone, PartialEq)]
pub struct ContentView {
    pub title: String,
    pub description: String,
    pub kind: ContentKind,
    pub rating: Option<RatingSummary>,
    /// `None` when the item has nothing to open, e.g. a link without a URL
    pub primary_action: Option<PrimaryAction>,
}

/// Build the description view for `item`
pub fn describe(item: &ContentItem, rating: Option<RatingSummary>) -> ContentView {
    let primary_action = match item.kind {
        ContentKind::Text => Some(PrimaryAction::Read),
        ContentKind::Link => item.url.clone().map(PrimaryAction::Open),
        kind => Some(PrimaryAction::Deliver(kind)),
    };

    ContentView {
        title: item.name.clone(),
        description: item.description.clone(),
        kind: item.kind,
        rating,
        primary_action,
    }
}

/// One reader window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPage {
    pub text: String,
    /// Clamped 1-based page number
    pub page: u32,
    pub total_pages: u32,
    /// Set when there was no text to show; `text` is empty then
    pub is_placeholder: bool,
}

/// Slice `text` into fixed windows of `window` characters and return page `page`
///
/// Windows are counted in characters, not bytes, and ignore word boundaries.
/// The page is clamped into range, and empty text yields a single placeholder page.
pub fn read_page(text: &str, page: i64, window: usize) -> TextPage {
    let window = window.max(1);
    let total_chars = text.chars().count();

    if total_chars == 0 {
        return TextPage {
            text: String::new(),
            page: 1,
            total_pages: 1,
            is_placeholder: true,
        };
    }

    let total_pages = u32::try_from(total_chars.div_ceil(window)).unwrap_or(u32::MAX);
    let page = page.clamp(1, i64::from(total_pages)) as u32;
    let start = (page as usize - 1) * window;

    TextPage {
        text: text.chars().skip(start).take(window).collect(),
        page,
        total_pages,
        is_placeholder: false,
    }
}

/// Location of a stored payload under the media root, rejecting paths that escape it
pub fn resolve_media_path(media_root: &Path, stored: &str) -> Option<PathBuf> {
    let relative = Path::new(stored.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)))
    {
        warn!(path = stored, "Stored media path escapes the media root");
        return None;
    }
    Some(media_root.join(relative))
}

/// Load the stored text of a TEXT item; unreadable content yields an empty string
pub async fn load_text(media_root: &Path, item: &ContentItem) -> String {
    let Some(path) = item
        .file_path
        .as_deref()
        .and_then(|stored| resolve_media_path(media_root, stored))
    else {
        debug!(content_id = item.id, "Text item has no stored file");
        return String::new();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!(
                content_id = item.id,
                path = %path.display(),
                error = %e,
                "Failed to read text content"
            );
            String::new()
        }
    }
}
