//! Inactivity reminders: once a day, users whose inactivity in whole days is
//! a positive multiple of the configured cadence get a nudge with the root menu.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::bot::BotEngine;
use crate::config::ReminderConfig;
use crate::db::{BotUser, PgCatalog};
use crate::localization::t_lang;

/// Key of the admin-editable reminder copy in `bot_messages`
pub const REMINDER_MESSAGE_KEY: &str = "reminder_message";

/// Whether a user last seen at `last_active` is due a reminder at `now`
pub fn is_reminder_due(last_active: DateTime<Utc>, now: DateTime<Utc>, every_days: i64) -> bool {
    if every_days <= 0 {
        return false;
    }
    let days = (now - last_active).num_days();
    days > 0 && days % every_days == 0
}

/// Send reminders to every due user; returns how many were delivered
pub async fn send_reminders(
    engine: &BotEngine,
    users: &[BotUser],
    custom_text: Option<&str>,
    every_days: i64,
    now: DateTime<Utc>,
) -> usize {
    let mut sent = 0;
    for user in users
        .iter()
        .filter(|u| u.is_active && is_reminder_due(u.last_active, now, every_days))
    {
        let lang = user.language_code.as_deref();
        let text = custom_text
            .map(str::to_string)
            .unwrap_or_else(|| t_lang("reminder-default", lang));

        let root = match engine.nav.root(lang).await {
            Ok(screen) => screen,
            Err(e) => {
                error!(error = %e, "Failed to build root menu for reminders");
                return sent;
            }
        };

        match engine
            .transport
            .send_text(user.telegram_id, &text, Some(&root.keyboard))
            .await
        {
            Ok(_) => sent += 1,
            Err(e) => warn!(user_id = user.telegram_id, error = %e, "Failed to send reminder"),
        }
    }
    sent
}

/// Daily reminder loop; runs until the process exits
pub async fn run_reminders(engine: Arc<BotEngine>, catalog: PgCatalog, config: ReminderConfig) {
    let mut interval = tokio::time::interval(config.interval);
    loop {
        interval.tick().await;

        let users = match catalog.active_users().await {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "Failed to load users for reminders");
                continue;
            }
        };
        let custom_text = match catalog.bot_message(REMINDER_MESSAGE_KEY).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to load reminder text, using default");
                None
            }
        };

        let sent = send_reminders(
            &engine,
            &users,
            custom_text.as_deref(),
            config.inactive_days,
            Utc::now(),
        )
        .await;
        info!(sent, candidates = users.len(), "Reminder sweep finished");
    }
}
