use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use content_nav_bot::bot::{self, BotEngine, TelegramTransport};
use content_nav_bot::config::{BotConfig, SESSION_PURGE_INTERVAL_SECS};
use content_nav_bot::db::{self, PgCatalog};
use content_nav_bot::localization::init_localization_from;
use content_nav_bot::menu::Navigator;
use content_nav_bot::reminders::run_reminders;
use content_nav_bot::session::InMemSessionStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting Content Navigation Telegram Bot");

    let config = BotConfig::from_env()?;

    init_localization_from(&config.locales_dir, &config.menu.default_language)
        .context("Failed to load localization resources")?;

    info!("Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    db::init_database_schema(&pool).await?;

    let catalog = PgCatalog::new(pool);
    let sessions = Arc::new(InMemSessionStore::new(config.session_idle_timeout));

    let bot = Bot::new(config.telegram_token.clone());
    let engine = Arc::new(BotEngine::new(
        Navigator::new(Arc::new(catalog.clone()), config.menu.clone()),
        sessions.clone(),
        Arc::new(TelegramTransport::new(bot.clone())),
    ));

    if config.session_idle_timeout.is_some() {
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(SESSION_PURGE_INTERVAL_SECS));
            loop {
                interval.tick().await;
                if let Err(e) = sessions.purge_idle().await {
                    warn!("Session purge failed: {:#}", e);
                }
            }
        });
    }

    if config.reminders.enabled {
        info!(every_days = config.reminders.inactive_days, "Inactivity reminders enabled");
        tokio::spawn(run_reminders(engine.clone(), catalog, config.reminders.clone()));
    } else {
        info!("Inactivity reminders disabled");
    }

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
