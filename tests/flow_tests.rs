//! End-to-end interaction flows through the engine with a recording transport

mod common;

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{press, typed, Call, Fixture, CHAT, MENU_MESSAGE, USER};
use content_nav_bot::bot::Interaction;
use content_nav_bot::catalog::Catalog;
use content_nav_bot::db::BotUser;
use content_nav_bot::localization::t_lang;
use content_nav_bot::menu::Keyboard;
use content_nav_bot::reminders::send_reminders;
use content_nav_bot::session::{RatedView, SessionEntry, SessionStore};
use content_nav_bot::token::{NavToken, Origin};

const EN: Option<&str> = Some("en");

fn token_of(keyboard: &Keyboard, key: &str) -> Option<NavToken> {
    keyboard.find(&t_lang(key, EN)).and_then(|b| b.token())
}

fn press_on(message: i32) -> Interaction {
    Interaction {
        message: Some(message),
        ..press()
    }
}

#[tokio::test]
async fn test_search_keeps_its_origin_even_without_results() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.ids;
    let origin = Origin::Content {
        path: ids.adults,
        category: ids.relationships,
        topic: Some(ids.breakups),
    };

    fx.engine
        .handle_token(&press(), NavToken::Search { origin })
        .await?;
    assert_eq!(
        fx.sessions.get(CHAT).await?,
        Some(SessionEntry::Searching {
            origin,
            prompt_message_id: Some(MENU_MESSAGE)
        })
    );
    let (prompt, keyboard) = fx.transport.last_render().unwrap();
    assert_eq!(prompt, t_lang("search-prompt", EN));
    assert!(keyboard.is_none());

    fx.engine.handle_text(&typed(50), "zzz").await?;

    // The user's message and the prompt are both gone
    assert_eq!(fx.transport.deleted(), vec![50, MENU_MESSAGE]);
    let (text, keyboard) = fx.transport.last_render().unwrap();
    assert_eq!(text, t_lang("search-not-found", EN));
    let keyboard = keyboard.unwrap();
    let back = token_of(&keyboard, "btn-back").unwrap();
    assert_eq!(
        back,
        NavToken::Content {
            path: ids.adults,
            category: ids.relationships,
            topic: Some(ids.breakups),
            page: 1
        }
    );
    assert_eq!(
        fx.sessions.get(CHAT).await?,
        Some(SessionEntry::SearchResults {
            origin,
            query: "zzz".to_string()
        })
    );

    // Results went out as a new message; back edits that one
    let results_message = match fx.transport.calls().last() {
        Some(Call::Send { message, .. }) => *message,
        other => panic!("expected a fresh results message, got {:?}", other),
    };
    fx.engine
        .handle_callback(&press_on(results_message), &back.encode()?)
        .await?;
    assert_eq!(fx.sessions.get(CHAT).await?, None);
    match fx.transport.calls().last() {
        Some(Call::Edit { message, text, .. }) => {
            assert_eq!(*message, results_message);
            assert!(text.contains("Breakups"));
        }
        other => panic!("expected the results message to be edited, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_invalid_search_query_keeps_prompt_open() -> Result<()> {
    let fx = Fixture::new();
    fx.engine
        .handle_token(&press(), NavToken::Search { origin: Origin::Root })
        .await?;

    fx.engine.handle_text(&typed(80), "   ").await?;
    let (text, _) = fx.transport.last_render().unwrap();
    assert!(text.starts_with(&t_lang("search-query-empty", EN)));
    assert!(text.ends_with(&t_lang("search-prompt", EN)));

    let too_long = "x".repeat(101);
    fx.engine.handle_text(&typed(81), &too_long).await?;
    let (text, _) = fx.transport.last_render().unwrap();
    assert!(text.starts_with(&t_lang("search-query-too-long", EN)));

    assert_eq!(
        fx.sessions.get(CHAT).await?,
        Some(SessionEntry::Searching {
            origin: Origin::Root,
            prompt_message_id: Some(MENU_MESSAGE)
        })
    );
    assert_eq!(fx.transport.deleted(), vec![80, 81]);
    Ok(())
}

#[tokio::test]
async fn test_search_pages_need_live_results() -> Result<()> {
    let fx = Fixture::with_config(|config| config.items_per_page = 1);
    fx.engine
        .handle_token(&press(), NavToken::Search { origin: Origin::Root })
        .await?;
    fx.engine.handle_text(&typed(90), "trust").await?;

    let keyboard = fx.transport.last_keyboard();
    assert!(keyboard.find("Building trust").is_some());
    assert_eq!(
        token_of(&keyboard, "btn-next"),
        Some(NavToken::SearchPage { page: 2 })
    );

    fx.engine
        .handle_token(&press(), NavToken::SearchPage { page: 2 })
        .await?;
    assert!(fx.transport.last_keyboard().find("Trust podcast").is_some());

    // Leaving the results drops them; an old page button no longer works
    fx.engine.handle_token(&press(), NavToken::Root).await?;
    fx.engine
        .handle_token(&press(), NavToken::SearchPage { page: 2 })
        .await?;
    let (text, keyboard) = fx.transport.last_render().unwrap();
    assert_eq!(text, t_lang("not-available", EN));
    assert_eq!(token_of(&keyboard.unwrap(), "btn-back"), Some(NavToken::Root));
    Ok(())
}

#[tokio::test]
async fn test_rating_twice_keeps_one_record() -> Result<()> {
    let fx = Fixture::new();
    let content = fx.ids.sleep;
    let rate = NavToken::Rate {
        origin: Origin::Root,
        content,
        page: None,
    };

    fx.engine.handle_token(&press(), rate).await?;
    fx.engine
        .handle_token(&press(), NavToken::Score { value: 4 })
        .await?;
    fx.engine.handle_token(&press(), rate).await?;
    fx.engine
        .handle_token(&press(), NavToken::Score { value: 2 })
        .await?;

    assert_eq!(fx.catalog.ratings_for(content), vec![(USER, 2)]);
    let summary = fx.catalog.rating_summary(content).await?.unwrap();
    assert_eq!(summary.count, 1);
    assert!((summary.average - 2.0).abs() < f64::EPSILON);

    // Back on the description, which shows the new mean
    let (text, _) = fx.transport.last_render().unwrap();
    assert!(text.contains("2.0"));
    assert_eq!(fx.sessions.get(CHAT).await?, None);
    Ok(())
}

#[tokio::test]
async fn test_rating_for_withdrawn_item_is_not_stored() -> Result<()> {
    let fx = Fixture::new();
    let content = fx.ids.sleep;
    fx.engine
        .handle_token(
            &press(),
            NavToken::Rate {
                origin: Origin::Root,
                content,
                page: None,
            },
        )
        .await?;

    fx.catalog.set_active(content, false);
    fx.engine
        .handle_token(&press(), NavToken::Score { value: 3 })
        .await?;

    assert!(fx.catalog.ratings_for(content).is_empty());
    let (text, _) = fx.transport.last_render().unwrap();
    assert_eq!(text, t_lang("not-available", EN));
    assert_eq!(token_of(&fx.transport.last_keyboard(), "btn-back"), Some(NavToken::Root));
    assert_eq!(fx.sessions.get(CHAT).await?, None);
    // No acknowledgment for a score that was never stored
    assert!(!fx.transport.sent_texts().contains(&t_lang("rating-thanks", EN)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rating_restores_reader_page_and_ack_expires() -> Result<()> {
    let fx = Fixture::new();
    let content = fx.ids.eating;
    fx.write_media("texts/eating.txt", "abcdefghijKLMNOPQRSTuvwxy");

    fx.engine
        .handle_token(
            &press(),
            NavToken::Read {
                origin: Origin::Root,
                content,
                page: 2,
            },
        )
        .await?;
    fx.engine
        .handle_token(
            &press(),
            NavToken::Rate {
                origin: Origin::Root,
                content,
                page: Some(2),
            },
        )
        .await?;
    assert_eq!(
        fx.sessions.get(CHAT).await?,
        Some(SessionEntry::Rating {
            content,
            origin: Origin::Root,
            view: RatedView::ReaderPage(2),
            message_id: Some(MENU_MESSAGE)
        })
    );

    fx.engine
        .handle_token(&press(), NavToken::Score { value: 5 })
        .await?;

    let (text, _) = fx.transport.last_render().unwrap();
    assert!(text.contains("KLMNOPQRST"));

    let ack = fx
        .transport
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::Send { message, text, .. } if text == t_lang("rating-thanks", EN) => {
                Some(message)
            }
            _ => None,
        })
        .unwrap();
    assert!(!fx.transport.deleted().contains(&ack));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(fx.transport.deleted().contains(&ack));
    Ok(())
}

#[tokio::test]
async fn test_typed_rating_is_validated() -> Result<()> {
    let fx = Fixture::new();
    let content = fx.ids.sleep;
    fx.engine
        .handle_token(
            &press(),
            NavToken::Rate {
                origin: Origin::Root,
                content,
                page: None,
            },
        )
        .await?;

    for (message, input) in [(60, "9"), (61, "five")] {
        fx.engine.handle_text(&typed(message), input).await?;
        let (text, keyboard) = fx.transport.last_render().unwrap();
        assert!(text.starts_with(&t_lang("rating-invalid", EN)));
        assert_eq!(keyboard.unwrap().rows[0].len(), 5);
        assert!(matches!(
            fx.sessions.get(CHAT).await?,
            Some(SessionEntry::Rating { .. })
        ));
    }
    assert!(fx.catalog.ratings_for(content).is_empty());

    fx.engine.handle_text(&typed(62), " 3 ").await?;
    assert_eq!(fx.catalog.ratings_for(content), vec![(USER, 3)]);
    assert_eq!(fx.sessions.get(CHAT).await?, None);
    assert!(fx.transport.deleted().starts_with(&[60, 61, 62]));

    // The description replaced the prompt in place
    match fx.transport.calls().last() {
        Some(Call::Edit { message, .. }) => assert_eq!(*message, MENU_MESSAGE),
        other => panic!("expected the prompt to be edited, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_score_without_rating_is_swallowed() -> Result<()> {
    let fx = Fixture::new();
    fx.engine
        .handle_token(&press(), NavToken::Score { value: 5 })
        .await?;
    fx.engine
        .handle_callback(&press(), &NavToken::Noop.encode()?)
        .await?;

    assert!(fx.transport.calls().is_empty());
    assert!(fx.catalog.ratings_for(fx.ids.sleep).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_navigation_cancels_active_overlay() -> Result<()> {
    let fx = Fixture::new();
    fx.engine
        .handle_token(&press(), NavToken::Search { origin: Origin::Root })
        .await?;
    fx.engine
        .handle_token(
            &press(),
            NavToken::Path {
                path: fx.ids.adults,
                page: 1,
            },
        )
        .await?;
    assert_eq!(fx.sessions.get(CHAT).await?, None);

    // Free text with nothing to answer is ignored
    fx.transport.reset();
    fx.engine.handle_text(&typed(40), "sleep").await?;
    assert!(fx.transport.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rejected_edit_falls_back_to_fresh_message() -> Result<()> {
    let fx = Fixture::new();
    fx.transport.reject_edits.store(true, Ordering::SeqCst);

    fx.engine.handle_token(&press(), NavToken::Root).await?;

    let calls = fx.transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], Call::Delete { message: MENU_MESSAGE });
    assert!(matches!(&calls[1], Call::Send { text, .. } if *text == t_lang("root-title", EN)));
    Ok(())
}

#[tokio::test]
async fn test_failed_resend_does_not_fail_the_handler() -> Result<()> {
    let fx = Fixture::new();
    fx.transport.reject_edits.store(true, Ordering::SeqCst);
    fx.transport.fail_sends.store(true, Ordering::SeqCst);

    fx.engine.handle_token(&press(), NavToken::Root).await?;
    assert_eq!(fx.transport.deleted(), vec![MENU_MESSAGE]);
    Ok(())
}

#[tokio::test]
async fn test_unencodable_keyboard_keeps_current_message() -> Result<()> {
    let fx = Fixture::new();
    fx.transport.oversized_tokens.store(true, Ordering::SeqCst);

    fx.engine.handle_token(&press(), NavToken::Root).await?;

    // Resending would hit the same encoding error, so nothing is deleted
    assert!(fx.transport.deleted().is_empty());
    assert!(fx.transport.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_undecodable_callback_renders_unavailable() -> Result<()> {
    let fx = Fixture::new();
    fx.engine.handle_callback(&press(), "zz|1|2").await?;

    let (text, keyboard) = fx.transport.last_render().unwrap();
    assert_eq!(text, t_lang("not-available", EN));
    assert_eq!(token_of(&keyboard.unwrap(), "btn-back"), Some(NavToken::Root));
    Ok(())
}

#[tokio::test]
async fn test_views_recorded_for_detail_and_first_reader_page() -> Result<()> {
    let fx = Fixture::new();
    let ids = fx.ids;
    fx.write_media("texts/eating.txt", "abcdefghijKLMNOPQRSTuvwxy");

    fx.engine
        .handle_token(
            &press(),
            NavToken::Detail {
                origin: Origin::Root,
                content: ids.sleep,
            },
        )
        .await?;
    assert_eq!(fx.catalog.views().len(), 1);

    for page in [1, 2, 3] {
        fx.engine
            .handle_token(
                &press(),
                NavToken::Read {
                    origin: Origin::Root,
                    content: ids.eating,
                    page,
                },
            )
            .await?;
    }
    // Missing items render as unavailable and are not counted
    fx.engine
        .handle_token(
            &press(),
            NavToken::Detail {
                origin: Origin::Root,
                content: 9999,
            },
        )
        .await?;

    let views = fx.catalog.views();
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].content_id, ids.sleep);
    assert_eq!(views[1].content_id, ids.eating);
    assert!(views.iter().all(|v| v.rater_id == USER));
    Ok(())
}

#[tokio::test]
async fn test_media_delivery_replaces_menu() -> Result<()> {
    let fx = Fixture::new();
    let content = fx.ids.sleep;
    let media = NavToken::Media {
        origin: Origin::Root,
        content,
    };

    fx.engine.handle_token(&press(), media).await?;

    let calls = fx.transport.calls();
    assert_eq!(calls.len(), 4);
    let loading = match &calls[0] {
        Call::Send { message, text, .. } => {
            assert_eq!(*text, t_lang("file-loading", EN));
            *message
        }
        other => panic!("expected a loading notice, got {:?}", other),
    };
    assert_eq!(calls[1], Call::Delete { message: MENU_MESSAGE });
    match &calls[2] {
        Call::Media {
            media, keyboard, ..
        } => {
            assert!(media.caption.contains("Sleep hygiene"));
            assert_eq!(
                token_of(keyboard.as_ref().unwrap(), "btn-to-description"),
                Some(NavToken::Detail {
                    origin: Origin::Root,
                    content
                })
            );
        }
        other => panic!("expected media, got {:?}", other),
    }
    assert_eq!(calls[3], Call::Delete { message: loading });
    Ok(())
}

#[tokio::test]
async fn test_media_failure_reports_and_offers_way_back() -> Result<()> {
    let fx = Fixture::new();
    fx.transport.fail_media.store(true, Ordering::SeqCst);

    fx.engine
        .handle_token(
            &press(),
            NavToken::Media {
                origin: Origin::Root,
                content: fx.ids.sleep,
            },
        )
        .await?;

    let (text, keyboard) = fx.transport.last_render().unwrap();
    assert_eq!(text, t_lang("media-error", EN));
    assert!(token_of(&keyboard.unwrap(), "btn-to-description").is_some());
    // Loading notice is cleaned up either way
    assert_eq!(fx.transport.deleted().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_media_without_source_is_unavailable() -> Result<()> {
    let fx = Fixture::new();
    let content = fx.ids.couples_guide;
    fx.engine
        .handle_token(
            &press(),
            NavToken::Media {
                origin: Origin::Root,
                content,
            },
        )
        .await?;

    let (text, keyboard) = fx.transport.last_render().unwrap();
    assert_eq!(text, t_lang("not-available", EN));
    assert_eq!(
        token_of(&keyboard.unwrap(), "btn-back"),
        Some(NavToken::Detail {
            origin: Origin::Root,
            content
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_start_resets_conversation() -> Result<()> {
    let fx = Fixture::new();
    fx.engine
        .handle_token(&press(), NavToken::Search { origin: Origin::Root })
        .await?;
    fx.transport.reset();

    fx.engine.handle_text(&typed(70), "/start").await?;

    assert_eq!(fx.sessions.get(CHAT).await?, None);
    let calls = fx.transport.calls();
    assert_eq!(calls[0], Call::Delete { message: 70 });
    assert!(matches!(&calls[1], Call::Send { text, .. } if *text == t_lang("root-title", EN)));
    Ok(())
}

#[tokio::test]
async fn test_reminders_go_to_due_users_only() -> Result<()> {
    let fx = Fixture::new();
    let now = Utc::now();
    let user = |telegram_id: i64, idle_days: i64, is_active: bool| BotUser {
        id: telegram_id,
        telegram_id,
        username: None,
        first_name: None,
        language_code: Some("en".to_string()),
        last_active: now - ChronoDuration::days(idle_days) - ChronoDuration::hours(1),
        is_active,
    };
    let users = vec![user(1, 10, true), user(2, 3, true), user(3, 20, false), user(4, 20, true)];

    let sent = send_reminders(&fx.engine, &users, None, 10, now).await;
    assert_eq!(sent, 2);
    assert_eq!(
        fx.transport.sent_texts(),
        vec![t_lang("reminder-default", EN), t_lang("reminder-default", EN)]
    );
    assert!(fx.transport.last_keyboard().find("Adults").is_some());

    fx.transport.reset();
    let sent = send_reminders(&fx.engine, &users, Some("We miss you"), 10, now).await;
    assert_eq!(sent, 2);
    assert_eq!(fx.transport.sent_texts()[0], "We miss you");
    Ok(())
}
