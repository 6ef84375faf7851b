//! # Content Navigation Bot
//!
//! A Telegram bot that lets users browse a catalog of materials through a
//! path → category → topic → content menu, search it by name, read text
//! items page by page and rate what they viewed.

pub mod bot;
pub mod catalog;
pub mod config;
pub mod db;
pub mod detail;
pub mod errors;
pub mod localization;
pub mod menu;
pub mod pager;
pub mod reminders;
pub mod session;
pub mod token;
pub mod transport;
