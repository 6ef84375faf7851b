//! Shared fixtures: a seeded in-memory catalog, a recording transport and a
//! ready-to-use engine.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use content_nav_bot::bot::{BotEngine, Interaction};
use content_nav_bot::catalog::memory::NewContent;
use content_nav_bot::catalog::{ContentKind, InMemoryCatalog, Visitor};
use content_nav_bot::config::MenuConfig;
use content_nav_bot::errors::TransportError;
use content_nav_bot::menu::{Keyboard, Navigator};
use content_nav_bot::session::{ConversationId, InMemSessionStore};
use content_nav_bot::token::TokenError;
use content_nav_bot::transport::{MediaDelivery, MessageId, Transport};

pub const CHAT: ConversationId = 100;
pub const USER: i64 = 7;
/// Id of the menu message the fixture interactions come from
pub const MENU_MESSAGE: MessageId = 1;

/// One recorded transport call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send {
        message: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        message: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Delete {
        message: MessageId,
    },
    Media {
        message: MessageId,
        media: MediaDelivery,
        keyboard: Option<Keyboard>,
    },
}

/// Transport that records every call and can be told to fail
#[derive(Debug)]
pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicI32,
    pub reject_edits: AtomicBool,
    pub fail_sends: AtomicBool,
    pub fail_media: AtomicBool,
    /// Refuse any keyboard, as if a button token could not be encoded
    pub oversized_tokens: AtomicBool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1000),
            reject_edits: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            fail_media: AtomicBool::new(false),
            oversized_tokens: AtomicBool::new(false),
        }
    }
}

impl MockTransport {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn encode(&self, keyboard: Option<&Keyboard>) -> Result<(), TransportError> {
        if keyboard.is_some() && self.oversized_tokens.load(Ordering::SeqCst) {
            return Err(TokenError::TooLong(80).into());
        }
        Ok(())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    /// Text and keyboard of the most recent send or edit
    pub fn last_render(&self) -> Option<(String, Option<Keyboard>)> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::Send { text, keyboard, .. } | Call::Edit { text, keyboard, .. } => {
                Some((text, keyboard))
            }
            _ => None,
        })
    }

    pub fn last_keyboard(&self) -> Keyboard {
        self.last_render()
            .and_then(|(_, keyboard)| keyboard)
            .unwrap_or_default()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Delete { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(
        &self,
        _chat: ConversationId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Request("send refused".to_string()));
        }
        self.encode(keyboard)?;
        let message = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(Call::Send {
            message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(message)
    }

    async fn edit_text(
        &self,
        _chat: ConversationId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        if self.reject_edits.load(Ordering::SeqCst) {
            return Err(TransportError::EditRejected("message can't be edited".to_string()));
        }
        self.encode(keyboard)?;
        self.record(Call::Edit {
            message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn delete(
        &self,
        _chat: ConversationId,
        message: MessageId,
    ) -> Result<(), TransportError> {
        self.record(Call::Delete { message });
        Ok(())
    }

    async fn deliver_media(
        &self,
        _chat: ConversationId,
        media: &MediaDelivery,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(TransportError::MediaUnavailable("storage offline".to_string()));
        }
        let message = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(Call::Media {
            message,
            media: media.clone(),
            keyboard: keyboard.cloned(),
        });
        Ok(message)
    }
}

/// Ids of the seeded catalog
#[derive(Debug, Clone, Copy)]
pub struct Ids {
    pub adults: i64,
    pub teens: i64,
    pub health: i64,
    pub relationships: i64,
    pub breakups: i64,
    pub trust: i64,
    pub sleep: i64,
    pub eating: i64,
    pub stress: i64,
    pub moving_on: i64,
    pub letting_go: i64,
    pub building_trust: i64,
    pub couples_guide: i64,
    pub podcast: i64,
}

/// Adults: Health (no topics, 3 active items plus an inactive one) and
/// Relationships (topics Breakups and Trust). Teens: Relationships only.
pub fn seed(catalog: &InMemoryCatalog) -> Ids {
    let adults = catalog.add_path("Adults");
    let teens = catalog.add_path("Teens");
    let health = catalog.add_category("Health");
    let relationships = catalog.add_category("Relationships");
    let breakups = catalog.add_topic("Breakups");
    let trust = catalog.add_topic("Trust");

    let sleep = catalog.add_content(
        NewContent::new("Sleep hygiene", ContentKind::Pdf)
            .description("A short guide to better sleep")
            .file("guides/sleep.pdf")
            .linked(adults, health, None),
    );
    let eating = catalog.add_content(
        NewContent::new("Healthy eating", ContentKind::Text)
            .description("Everyday nutrition basics")
            .file("texts/eating.txt")
            .linked(adults, health, None),
    );
    let stress = catalog.add_content(
        NewContent::new("Stress relief", ContentKind::Video)
            .url("https://media.example.org/stress.mp4")
            .linked(adults, health, None),
    );
    let retired = catalog.add_content(
        NewContent::new("Old leaflet", ContentKind::Pdf).linked(adults, health, None),
    );
    catalog.set_active(retired, false);

    let moving_on = catalog.add_content(
        NewContent::new("Moving on", ContentKind::Pdf)
            .file("guides/moving_on.pdf")
            .linked(adults, relationships, Some(breakups)),
    );
    let letting_go = catalog.add_content(
        NewContent::new("Letting go", ContentKind::Audio)
            .file("audio/letting_go.mp3")
            .linked(adults, relationships, Some(breakups)),
    );
    let building_trust = catalog.add_content(
        NewContent::new("Building trust", ContentKind::Link)
            .url("https://example.org/trust")
            .linked(adults, relationships, Some(trust))
            .linked(teens, relationships, Some(trust)),
    );
    let couples_guide = catalog.add_content(
        NewContent::new("Couples guide", ContentKind::Pdf).linked(adults, relationships, None),
    );
    let podcast = catalog.add_content(
        NewContent::new("Trust podcast", ContentKind::Audio).linked(teens, relationships, None),
    );

    Ids {
        adults,
        teens,
        health,
        relationships,
        breakups,
        trust,
        sleep,
        eating,
        stress,
        moving_on,
        letting_go,
        building_trust,
        couples_guide,
        podcast,
    }
}

pub struct Fixture {
    pub catalog: Arc<InMemoryCatalog>,
    pub transport: Arc<MockTransport>,
    pub sessions: Arc<InMemSessionStore>,
    pub engine: BotEngine,
    pub ids: Ids,
    pub media_dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Seeded fixture with a tweaked menu configuration
    pub fn with_config(tweak: impl FnOnce(&mut MenuConfig)) -> Self {
        let media_dir = tempfile::tempdir().unwrap();
        let mut config = MenuConfig {
            text_page_chars: 10,
            media_root: media_dir.path().to_path_buf(),
            ack_delete_after: Duration::from_secs(5),
            ..MenuConfig::default()
        };
        tweak(&mut config);

        let catalog = Arc::new(InMemoryCatalog::new());
        let ids = seed(&catalog);
        let transport = Arc::new(MockTransport::default());
        let sessions = Arc::new(InMemSessionStore::new(None));
        let engine = BotEngine::new(
            Navigator::new(catalog.clone(), config),
            sessions.clone(),
            transport.clone(),
        );

        Self {
            catalog,
            transport,
            sessions,
            engine,
            ids,
            media_dir,
        }
    }

    /// Write a stored media file under the fixture's media root
    pub fn write_media(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.media_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn nav(&self) -> &Navigator {
        &self.engine.nav
    }
}

pub fn visitor() -> Visitor {
    Visitor {
        telegram_id: USER,
        username: Some("reader".to_string()),
        first_name: Some("Sam".to_string()),
        language_code: Some("en".to_string()),
    }
}

/// A button press on the menu message
pub fn press() -> Interaction {
    Interaction {
        chat: CHAT,
        message: Some(MENU_MESSAGE),
        visitor: visitor(),
    }
}

/// A text message sent by the user
pub fn typed(message: MessageId) -> Interaction {
    Interaction {
        chat: CHAT,
        message: Some(message),
        visitor: visitor(),
    }
}

pub fn labels(keyboard: &Keyboard) -> Vec<String> {
    keyboard.buttons().map(|b| b.label.clone()).collect()
}
