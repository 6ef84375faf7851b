//! # Menu Module
//!
//! The navigation state machine. Given a level and its scoping keys, the
//! [`Navigator`] queries the catalog, paginates the result and produces a
//! [`Screen`]: header text, a keyboard of navigation tokens, and the state it
//! represents.
//!
//! No history is kept. Every "back" button is derived from the scoping keys
//! of the current level, and levels whose shape depends on data (a category
//! without topics) are resolved against the catalog at render time.

use anyhow::Result;
use std::sync::Arc;
use teloxide::utils::html::escape;
use tracing::{debug, warn};

use crate::catalog::{Catalog, ContentItem, RatingSummary};
use crate::config::{
    MenuConfig, DEFAULT_COLUMNS, MAX_CHARS_PER_COLUMN, MAX_RATING, MIN_RATING, PATH_COLUMNS,
};
use crate::detail::{self, PrimaryAction};
use crate::localization::{t_args_lang, t_lang};
use crate::pager::{paginate, Page};
use crate::session::RatedView;
use crate::token::{NavToken, Origin};
use crate::transport::{MediaDelivery, MediaSource};

/// What pressing a button does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Navigate(NavToken),
    Url(reqwest::Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

impl Button {
    pub fn navigate(label: impl Into<String>, token: NavToken) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Navigate(token),
        }
    }

    pub fn token(&self) -> Option<NavToken> {
        match self.action {
            ButtonAction::Navigate(token) => Some(token),
            ButtonAction::Url(_) => None,
        }
    }
}

/// Transport-neutral inline keyboard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }

    /// First button whose label equals `label`
    pub fn find(&self, label: &str) -> Option<&Button> {
        self.buttons().find(|b| b.label == label)
    }

    fn push_row(&mut self, row: Vec<Button>) {
        if !row.is_empty() {
            self.rows.push(row);
        }
    }
}

/// Which level or leaf a screen represents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuState {
    Root,
    PathMenu {
        path: i64,
    },
    CategoryMenu {
        path: i64,
        category: i64,
    },
    ContentMenu {
        path: i64,
        category: i64,
        topic: Option<i64>,
    },
    Detail {
        content: i64,
    },
    Reader {
        content: i64,
    },
    SearchResults {
        origin: Origin,
        found: usize,
    },
    RatingPrompt {
        content: i64,
    },
    /// Terminal "no longer available" leaf with only a back action
    Unavailable,
}

/// A fully computed message: HTML text, keyboard and the state it shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub text: String,
    pub keyboard: Keyboard,
    pub state: MenuState,
    pub page: u32,
    pub total_pages: u32,
}

impl Screen {
    fn new(text: String, keyboard: Keyboard, state: MenuState) -> Self {
        Self {
            text,
            keyboard,
            state,
            page: 1,
            total_pages: 1,
        }
    }

    fn paged<T>(mut self, page: &Page<T>) -> Self {
        self.page = page.number;
        self.total_pages = page.total_pages;
        self
    }
}

/// Column count for a list of labels
pub fn columns_for(labels: &[&str], preferred: usize) -> usize {
    if labels
        .iter()
        .any(|label| label.chars().count() > MAX_CHARS_PER_COLUMN)
    {
        1
    } else {
        preferred.max(1)
    }
}

/// Lay buttons out in rows, switching to one column when any label is long
pub fn arrange(buttons: Vec<Button>, preferred: usize) -> Vec<Vec<Button>> {
    let labels: Vec<&str> = buttons.iter().map(|b| b.label.as_str()).collect();
    let columns = columns_for(&labels, preferred);
    let mut rows = Vec::new();
    let mut row = Vec::with_capacity(columns);
    for button in buttons {
        row.push(button);
        if row.len() == columns {
            rows.push(std::mem::replace(&mut row, Vec::with_capacity(columns)));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }
    rows
}

/// Token that reopens the first page of `origin`
pub fn origin_token(origin: Origin) -> NavToken {
    match origin {
        Origin::Root => NavToken::Root,
        Origin::Path { path } => NavToken::Path { path, page: 1 },
        Origin::Category { path, category } => NavToken::Category {
            path,
            category,
            page: 1,
        },
        Origin::Content {
            path,
            category,
            topic,
        } => NavToken::Content {
            path,
            category,
            topic,
            page: 1,
        },
    }
}

/// Previous / counter / next row for any paginated level
fn pagination_row<T>(
    page: &Page<T>,
    lang: Option<&str>,
    to_page: impl Fn(u32) -> NavToken,
) -> Vec<Button> {
    if !page.has_other_pages() {
        return Vec::new();
    }
    let mut row = Vec::with_capacity(3);
    if let Some(previous) = page.previous_page_number() {
        row.push(Button::navigate(t_lang("btn-previous", lang), to_page(previous)));
    }
    row.push(Button::navigate(
        format!("{}/{}", page.number, page.total_pages),
        NavToken::Noop,
    ));
    if let Some(next) = page.next_page_number() {
        row.push(Button::navigate(t_lang("btn-next", lang), to_page(next)));
    }
    row
}

fn to_page_arg(page: u32) -> i64 {
    i64::from(page)
}

/// Computes screens from catalog data
#[derive(Clone)]
pub struct Navigator {
    catalog: Arc<dyn Catalog>,
    config: MenuConfig,
}

impl Navigator {
    pub fn new(catalog: Arc<dyn Catalog>, config: MenuConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &MenuConfig {
        &self.config
    }

    fn page_size(&self) -> usize {
        self.config.items_per_page
    }

    /// Resolve a stored origin against current data
    ///
    /// A category origin whose category has no topics any more becomes the
    /// "all topics" content list of that category.
    pub async fn resolve_origin(&self, origin: Origin) -> Result<Origin> {
        if let Origin::Category { path, category } = origin {
            if !self.catalog.has_topics(path, category).await? {
                return Ok(Origin::Content {
                    path,
                    category,
                    topic: None,
                });
            }
        }
        Ok(origin)
    }

    /// Parent of a content list: the topic menu when topics exist, else the path menu
    async fn content_parent(
        &self,
        path: i64,
        category: i64,
        topic: Option<i64>,
    ) -> Result<NavToken> {
        if topic.is_some() || self.catalog.has_topics(path, category).await? {
            Ok(NavToken::Category {
                path,
                category,
                page: 1,
            })
        } else {
            Ok(NavToken::Path { path, page: 1 })
        }
    }

    /// Leaf shown when an entity disappeared; only a back button
    pub fn unavailable(&self, back: NavToken, lang: Option<&str>) -> Screen {
        let mut keyboard = Keyboard::default();
        keyboard.push_row(vec![Button::navigate(t_lang("btn-back", lang), back)]);
        Screen::new(t_lang("not-available", lang), keyboard, MenuState::Unavailable)
    }

    /// Root menu listing every active path, one per row
    pub async fn root(&self, lang: Option<&str>) -> Result<Screen> {
        let paths = self.catalog.list_paths().await?;
        let text = if paths.is_empty() {
            t_lang("root-empty", lang)
        } else {
            t_lang("root-title", lang)
        };

        let buttons = paths
            .into_iter()
            .map(|p| Button::navigate(p.name, NavToken::Path { path: p.id, page: 1 }))
            .collect();

        let mut keyboard = Keyboard {
            rows: arrange(buttons, PATH_COLUMNS),
        };
        keyboard.push_row(vec![Button::navigate(
            t_lang("btn-search", lang),
            NavToken::Search {
                origin: Origin::Root,
            },
        )]);

        Ok(Screen::new(text, keyboard, MenuState::Root))
    }

    /// Categories under `path`
    pub async fn path_menu(&self, path: i64, page: u32, lang: Option<&str>) -> Result<Screen> {
        let Some(path_entity) = self.catalog.get_path(path).await? else {
            debug!(path, "Path is gone");
            return Ok(self.unavailable(NavToken::Root, lang));
        };

        let categories = self.catalog.list_categories(path).await?;
        let page = paginate(categories, to_page_arg(page), self.page_size());

        let text = format!(
            "<b>{}</b>\n\n{}",
            escape(&path_entity.name),
            t_lang("path-title", lang)
        );

        let buttons = page
            .items
            .iter()
            .map(|c| {
                Button::navigate(
                    c.name.clone(),
                    NavToken::Category {
                        path,
                        category: c.id,
                        page: 1,
                    },
                )
            })
            .collect();

        let mut keyboard = Keyboard {
            rows: arrange(buttons, DEFAULT_COLUMNS),
        };
        keyboard.push_row(pagination_row(&page, lang, |p| NavToken::Path { path, page: p }));
        keyboard.push_row(vec![
            Button::navigate(t_lang("btn-back", lang), NavToken::Root),
            Button::navigate(
                t_lang("btn-search", lang),
                NavToken::Search {
                    origin: Origin::Path { path },
                },
            ),
        ]);

        Ok(Screen::new(text, keyboard, MenuState::PathMenu { path }).paged(&page))
    }

    /// Selecting a category: the topic menu, or straight to the content list
    /// when the category has no topics under this path
    pub async fn choose_category(
        &self,
        path: i64,
        category: i64,
        page: u32,
        lang: Option<&str>,
    ) -> Result<Screen> {
        if self.catalog.has_topics(path, category).await? {
            self.category_menu(path, category, page, lang).await
        } else {
            debug!(path, category, "Category has no topics, skipping to content");
            self.content_menu(path, category, None, 1, lang).await
        }
    }

    async fn category_menu(
        &self,
        path: i64,
        category: i64,
        page: u32,
        lang: Option<&str>,
    ) -> Result<Screen> {
        let back = NavToken::Path { path, page: 1 };
        let (Some(path_entity), Some(category_entity)) = (
            self.catalog.get_path(path).await?,
            self.catalog.get_category(category).await?,
        ) else {
            return Ok(self.unavailable(back, lang));
        };

        let topics = self.catalog.list_topics(path, category).await?;
        let page = paginate(topics, to_page_arg(page), self.page_size());

        let text = format!(
            "<b>{} › {}</b>\n\n{}",
            escape(&path_entity.name),
            escape(&category_entity.name),
            t_lang("category-title", lang)
        );

        let buttons = page
            .items
            .iter()
            .map(|t| {
                Button::navigate(
                    t.name.clone(),
                    NavToken::Content {
                        path,
                        category,
                        topic: Some(t.id),
                        page: 1,
                    },
                )
            })
            .collect();

        let mut keyboard = Keyboard {
            rows: arrange(buttons, DEFAULT_COLUMNS),
        };
        keyboard.push_row(pagination_row(&page, lang, |p| NavToken::Category {
            path,
            category,
            page: p,
        }));
        keyboard.push_row(vec![Button::navigate(
            t_lang("btn-show-all", lang),
            NavToken::Content {
                path,
                category,
                topic: None,
                page: 1,
            },
        )]);
        keyboard.push_row(vec![
            Button::navigate(t_lang("btn-back", lang), back),
            Button::navigate(
                t_lang("btn-search", lang),
                NavToken::Search {
                    origin: Origin::Category { path, category },
                },
            ),
        ]);

        Ok(Screen::new(text, keyboard, MenuState::CategoryMenu { path, category }).paged(&page))
    }

    /// Content list under `(path, category)`, narrowed to `topic` when given
    pub async fn content_menu(
        &self,
        path: i64,
        category: i64,
        topic: Option<i64>,
        page: u32,
        lang: Option<&str>,
    ) -> Result<Screen> {
        let back = self.content_parent(path, category, topic).await?;

        let path_entity = self.catalog.get_path(path).await?;
        let category_entity = self.catalog.get_category(category).await?;
        let topic_entity = match topic {
            Some(topic) => match self.catalog.get_topic(topic).await? {
                Some(entity) => Some(entity),
                None => return Ok(self.unavailable(back, lang)),
            },
            None => None,
        };
        let (Some(path_entity), Some(category_entity)) = (path_entity, category_entity) else {
            return Ok(self.unavailable(back, lang));
        };

        let items = self.catalog.list_content(path, category, topic).await?;
        let page = paginate(items, to_page_arg(page), self.page_size());

        let mut trail = vec![path_entity.name.as_str(), category_entity.name.as_str()];
        if let Some(topic_entity) = &topic_entity {
            trail.push(topic_entity.name.as_str());
        }
        let heading = if page.total_items == 0 {
            t_lang("content-empty", lang)
        } else {
            t_lang("content-title", lang)
        };
        let text = format!("<b>{}</b>\n\n{}", escape(&trail.join(" › ")), heading);

        let origin = Origin::Content {
            path,
            category,
            topic,
        };
        let buttons = page
            .items
            .iter()
            .map(|item| {
                Button::navigate(
                    item.name.clone(),
                    NavToken::Detail {
                        origin,
                        content: item.id,
                    },
                )
            })
            .collect();

        let mut keyboard = Keyboard {
            rows: arrange(buttons, DEFAULT_COLUMNS),
        };
        keyboard.push_row(pagination_row(&page, lang, |p| NavToken::Content {
            path,
            category,
            topic,
            page: p,
        }));
        keyboard.push_row(vec![
            Button::navigate(t_lang("btn-back", lang), back),
            Button::navigate(t_lang("btn-search", lang), NavToken::Search { origin }),
        ]);

        Ok(Screen::new(
            text,
            keyboard,
            MenuState::ContentMenu {
                path,
                category,
                topic,
            },
        )
        .paged(&page))
    }

    /// First page of whatever level `origin` names
    pub async fn origin_menu(&self, origin: Origin, lang: Option<&str>) -> Result<Screen> {
        match origin {
            Origin::Root => self.root(lang).await,
            Origin::Path { path } => self.path_menu(path, 1, lang).await,
            Origin::Category { path, category } => {
                self.choose_category(path, category, 1, lang).await
            }
            Origin::Content {
                path,
                category,
                topic,
            } => self.content_menu(path, category, topic, 1, lang).await,
        }
    }

    fn rating_line(rating: Option<RatingSummary>, lang: Option<&str>) -> String {
        match rating {
            Some(summary) => t_args_lang(
                "detail-rating",
                &[
                    ("average", &format!("{:.1}", summary.average)),
                    ("count", &summary.count.to_string()),
                ],
                lang,
            ),
            None => t_lang("detail-no-rating", lang),
        }
    }

    /// Description of an item with its primary action, rating and back buttons
    pub async fn detail(&self, origin: Origin, content: i64, lang: Option<&str>) -> Result<Screen> {
        let Some(item) = self.catalog.get_content(content).await? else {
            return Ok(self.unavailable(origin_token(origin), lang));
        };
        let rating = self.catalog.rating_summary(content).await?;
        let view = detail::describe(&item, rating);

        let mut text = format!("<b>{}</b>", escape(&view.title));
        if !view.description.trim().is_empty() {
            text.push_str("\n\n");
            text.push_str(&escape(view.description.trim()));
        }
        text.push_str("\n\n");
        text.push_str(&t_args_lang("detail-kind", &[("kind", view.kind.as_str())], lang));
        text.push('\n');
        text.push_str(&Self::rating_line(view.rating, lang));

        let mut keyboard = Keyboard::default();
        match view.primary_action {
            Some(PrimaryAction::Read) => keyboard.push_row(vec![Button::navigate(
                t_lang("btn-read", lang),
                NavToken::Read {
                    origin,
                    content,
                    page: 1,
                },
            )]),
            Some(PrimaryAction::Open(url)) => match reqwest::Url::parse(&url) {
                Ok(url) => keyboard.push_row(vec![Button {
                    label: t_lang("btn-open", lang),
                    action: ButtonAction::Url(url),
                }]),
                Err(e) => warn!(content_id = content, error = %e, "Invalid link URL"),
            },
            Some(PrimaryAction::Deliver(_)) => keyboard.push_row(vec![Button::navigate(
                t_lang("btn-view", lang),
                NavToken::Media { origin, content },
            )]),
            None => {}
        }
        keyboard.push_row(vec![Button::navigate(
            t_lang("btn-rate", lang),
            NavToken::Rate {
                origin,
                content,
                page: None,
            },
        )]);
        keyboard.push_row(vec![Button::navigate(
            t_lang("btn-back", lang),
            origin_token(origin),
        )]);

        Ok(Screen::new(text, keyboard, MenuState::Detail { content }))
    }

    /// One window of a text item
    pub async fn reader(
        &self,
        origin: Origin,
        content: i64,
        page: u32,
        lang: Option<&str>,
    ) -> Result<Screen> {
        let Some(item) = self.catalog.get_content(content).await? else {
            return Ok(self.unavailable(origin_token(origin), lang));
        };

        let stored = detail::load_text(&self.config.media_root, &item).await;
        let window = detail::read_page(&stored, to_page_arg(page), self.config.text_page_chars);

        let body = if window.is_placeholder {
            t_lang("reader-empty", lang)
        } else {
            escape(&window.text)
        };
        let mut text = format!("<b>{}</b>\n\n{}", escape(&item.name), body);
        if window.total_pages > 1 {
            text.push_str("\n\n<i>");
            text.push_str(&t_args_lang(
                "page-indicator",
                &[
                    ("page", &window.page.to_string()),
                    ("total", &window.total_pages.to_string()),
                ],
                lang,
            ));
            text.push_str("</i>");
        }

        let pager_view: Page<()> = Page {
            items: Vec::new(),
            number: window.page,
            total_pages: window.total_pages,
            total_items: 0,
        };
        let mut keyboard = Keyboard::default();
        keyboard.push_row(pagination_row(&pager_view, lang, |p| NavToken::Read {
            origin,
            content,
            page: p,
        }));
        keyboard.push_row(vec![Button::navigate(
            t_lang("btn-rate", lang),
            NavToken::Rate {
                origin,
                content,
                page: Some(window.page),
            },
        )]);
        keyboard.push_row(vec![Button::navigate(
            t_lang("btn-to-description", lang),
            NavToken::Detail { origin, content },
        )]);

        let mut screen = Screen::new(text, keyboard, MenuState::Reader { content });
        screen.page = window.page;
        screen.total_pages = window.total_pages;
        Ok(screen)
    }

    /// Flat result list for `query`, one item per row
    pub async fn search_results(
        &self,
        origin: Origin,
        query: &str,
        page: u32,
        lang: Option<&str>,
    ) -> Result<Screen> {
        let items: Vec<ContentItem> = self.catalog.search_content(query).await?;
        let found = items.len();
        let page = paginate(items, to_page_arg(page), self.page_size());

        let text = if found == 0 {
            t_lang("search-not-found", lang)
        } else {
            t_args_lang("search-results", &[("query", &escape(query))], lang)
        };

        let buttons = page
            .items
            .iter()
            .map(|item| {
                Button::navigate(
                    item.name.clone(),
                    NavToken::Detail {
                        origin,
                        content: item.id,
                    },
                )
            })
            .collect();

        let back = origin_token(self.resolve_origin(origin).await?);
        let mut keyboard = Keyboard {
            rows: arrange(buttons, PATH_COLUMNS),
        };
        keyboard.push_row(pagination_row(&page, lang, |p| NavToken::SearchPage { page: p }));
        keyboard.push_row(vec![Button::navigate(
            t_lang("btn-search-repeat", lang),
            NavToken::Search { origin },
        )]);
        keyboard.push_row(vec![Button::navigate(t_lang("btn-back", lang), back)]);

        Ok(Screen::new(text, keyboard, MenuState::SearchResults { origin, found }).paged(&page))
    }

    /// Score buttons for `content`; back returns to the view being rated
    pub async fn rating_prompt(
        &self,
        origin: Origin,
        content: i64,
        view: RatedView,
        lang: Option<&str>,
    ) -> Result<Screen> {
        let Some(item) = self.catalog.get_content(content).await? else {
            return Ok(self.unavailable(origin_token(origin), lang));
        };

        let text = t_args_lang("rating-prompt", &[("name", &escape(&item.name))], lang);
        let scores = (MIN_RATING..=MAX_RATING)
            .map(|value| Button::navigate(value.to_string(), NavToken::Score { value }))
            .collect();
        let back = match view {
            RatedView::Description => NavToken::Detail { origin, content },
            RatedView::ReaderPage(page) => NavToken::Read {
                origin,
                content,
                page,
            },
        };

        let mut keyboard = Keyboard::default();
        keyboard.push_row(scores);
        keyboard.push_row(vec![Button::navigate(t_lang("btn-back", lang), back)]);

        Ok(Screen::new(text, keyboard, MenuState::RatingPrompt { content }))
    }

    /// Re-render the exact view a rating was started from
    pub async fn rated_view(
        &self,
        origin: Origin,
        content: i64,
        view: RatedView,
        lang: Option<&str>,
    ) -> Result<Screen> {
        match view {
            RatedView::Description => self.detail(origin, content, lang).await,
            RatedView::ReaderPage(page) => self.reader(origin, content, page, lang).await,
        }
    }

    /// What to deliver for a media item plus the keyboard sent along with it
    pub async fn media(
        &self,
        origin: Origin,
        content: i64,
        lang: Option<&str>,
    ) -> Result<Option<(MediaDelivery, Keyboard)>> {
        let Some(item) = self.catalog.get_content(content).await? else {
            return Ok(None);
        };

        let source = match (&item.file_path, &item.url) {
            (Some(stored), _) => detail::resolve_media_path(&self.config.media_root, stored)
                .map(MediaSource::File),
            (None, Some(url)) => reqwest::Url::parse(url).ok().map(MediaSource::Url),
            (None, None) => None,
        };
        let Some(source) = source else {
            warn!(content_id = content, "Media item has no usable source");
            return Ok(None);
        };

        let mut keyboard = Keyboard::default();
        keyboard.push_row(vec![Button::navigate(
            t_lang("btn-to-description", lang),
            NavToken::Detail { origin, content },
        )]);
        keyboard.push_row(vec![Button::navigate(t_lang("btn-main-menu", lang), NavToken::Root)]);

        Ok(Some((
            MediaDelivery {
                kind: item.kind,
                source,
                caption: format!("<b>{}</b>", escape(&item.name)),
            },
            keyboard,
        )))
    }
}
