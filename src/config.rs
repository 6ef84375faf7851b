//! # Configuration Module
//!
//! Runtime settings for the bot, read from the environment with documented
//! fallbacks, plus the fixed layout constants of the menus.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::localization::supported_language;

// Constants for menu layout
pub const DEFAULT_ITEMS_PER_PAGE: usize = 8;
pub const DEFAULT_COLUMNS: usize = 2;
pub const PATH_COLUMNS: usize = 1;
pub const MAX_CHARS_PER_COLUMN: usize = 25;

// Constants for the overlay flows
pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;
pub const MAX_SEARCH_QUERY_CHARS: usize = 100;

pub const DEFAULT_TEXT_PAGE_CHARS: usize = 1500;
pub const DEFAULT_ACK_DELETE_SECS: u64 = 5;
pub const DEFAULT_REMINDER_INACTIVE_DAYS: i64 = 10;
pub const DEFAULT_LANGUAGE: &str = "en";
pub const SESSION_PURGE_INTERVAL_SECS: u64 = 60;
pub const REMINDER_INTERVAL_SECS: u64 = 86_400; // once a day

/// Settings of the navigation engine itself
#[derive(Debug, Clone)]
pub struct MenuConfig {
    /// Page size at every menu level and for search results
    pub items_per_page: usize,
    /// Reader window in characters
    pub text_page_chars: usize,
    /// Directory that stored content file paths are relative to
    pub media_root: PathBuf,
    /// Delay before the rating acknowledgment removes itself
    pub ack_delete_after: Duration,
    /// Fallback UI language
    pub default_language: String,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            text_page_chars: DEFAULT_TEXT_PAGE_CHARS,
            media_root: PathBuf::from("./media"),
            ack_delete_after: Duration::from_secs(DEFAULT_ACK_DELETE_SECS),
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Inactivity reminder settings
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub enabled: bool,
    /// Reminders go out every this many whole days of inactivity
    pub inactive_days: i64,
    pub interval: Duration,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            inactive_days: DEFAULT_REMINDER_INACTIVE_DAYS,
            interval: Duration::from_secs(REMINDER_INTERVAL_SECS),
        }
    }
}

/// Whole-process configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub database_url: String,
    pub locales_dir: PathBuf,
    /// Idle expiry for session contexts; `None` keeps them until cleared
    pub session_idle_timeout: Option<Duration>,
    pub menu: MenuConfig,
    pub reminders: ReminderConfig,
}

impl BotConfig {
    /// Read the configuration from the environment
    pub fn from_env() -> Result<Self> {
        let telegram_token =
            env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let defaults = MenuConfig::default();
        let menu = MenuConfig {
            items_per_page: parse_var("ITEMS_PER_PAGE")?.unwrap_or(defaults.items_per_page),
            text_page_chars: parse_var("TEXT_PAGE_CHARS")?.unwrap_or(defaults.text_page_chars),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            ack_delete_after: parse_var("ACK_DELETE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.ack_delete_after),
            default_language: default_language(env::var("DEFAULT_LANGUAGE").ok()),
        };

        let reminder_defaults = ReminderConfig::default();
        let reminders = ReminderConfig {
            enabled: parse_var("REMINDERS_ENABLED")?.unwrap_or(reminder_defaults.enabled),
            inactive_days: parse_var("REMINDER_INACTIVE_DAYS")?
                .unwrap_or(reminder_defaults.inactive_days),
            interval: reminder_defaults.interval,
        };

        Ok(Self {
            telegram_token,
            database_url,
            locales_dir: env::var("LOCALES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./locales")),
            session_idle_timeout: parse_var("SESSION_IDLE_TIMEOUT_SECS")?.map(Duration::from_secs),
            menu,
            reminders,
        })
    }
}

/// Normalise DEFAULT_LANGUAGE to a shipped language, falling back to English
fn default_language(raw: Option<String>) -> String {
    let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
        return DEFAULT_LANGUAGE.to_string();
    };
    match supported_language(Some(raw.trim())) {
        Some(lang) => lang.to_string(),
        None => {
            warn!(language = %raw, fallback = DEFAULT_LANGUAGE, "Unsupported DEFAULT_LANGUAGE");
            DEFAULT_LANGUAGE.to_string()
        }
    }
}

/// Parse an optional environment variable, failing on malformed values
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} has an invalid value: {raw}")),
        Err(_) => Ok(None),
    }
}
