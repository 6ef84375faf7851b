//! In-memory catalog with the same filtering and ordering rules as the
//! PostgreSQL one. Backs the test suite and local experiments.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{
    Catalog, Category, ContentItem, ContentKind, Path, RatingSummary, Section, Topic, ViewEvent,
    Visitor,
};

/// Content to add through [`InMemoryCatalog::add_content`]
#[derive(Debug, Clone)]
pub struct NewContent {
    pub name: String,
    pub description: String,
    pub kind: ContentKind,
    pub file_path: Option<String>,
    pub url: Option<String>,
    pub paths: Vec<i64>,
    pub categories: Vec<i64>,
    pub topics: Vec<i64>,
}

impl NewContent {
    pub fn new(name: &str, kind: ContentKind) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            kind,
            file_path: None,
            url: None,
            paths: Vec::new(),
            categories: Vec::new(),
            topics: Vec::new(),
        }
    }

    pub fn linked(mut self, path: i64, category: i64, topic: Option<i64>) -> Self {
        self.paths.push(path);
        self.categories.push(category);
        self.topics.extend(topic);
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn file(mut self, file_path: &str) -> Self {
        self.file_path = Some(file_path.to_string());
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }
}

#[derive(Debug, Clone)]
struct StoredContent {
    item: ContentItem,
    is_active: bool,
    paths: Vec<i64>,
    categories: Vec<i64>,
    topics: Vec<i64>,
}

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    paths: Vec<Section>,
    categories: Vec<Section>,
    topics: Vec<Section>,
    content: Vec<StoredContent>,
    ratings: HashMap<(i64, i64), i16>,
    views: Vec<ViewEvent>,
    users: HashMap<i64, Visitor>,
}

impl State {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn active(sections: &[Section], id: i64) -> bool {
        sections.iter().any(|s| s.id == id && s.is_active)
    }

    /// Active items linked to an active `path` and an active `category`
    fn scoped(&self, path: i64, category: i64) -> impl Iterator<Item = &StoredContent> {
        self.content.iter().filter(move |c| {
            c.is_active
                && c.paths.contains(&path)
                && c.categories.contains(&category)
                && Self::active(&self.paths, path)
                && Self::active(&self.categories, category)
        })
    }

    fn topics_under(&self, path: i64, category: i64) -> Vec<Section> {
        let mut topics: Vec<Section> = self
            .topics
            .iter()
            .filter(|t| t.is_active)
            .filter(|t| self.scoped(path, category).any(|c| c.topics.contains(&t.id)))
            .cloned()
            .collect();
        sort_sections(&mut topics);
        topics
    }
}

fn sort_sections(sections: &mut [Section]) {
    sections.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

fn sort_items(items: &mut [ContentItem]) {
    items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Thread-safe in-memory catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<State>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn add_section(&self, pick: fn(&mut State) -> &mut Vec<Section>, name: &str) -> i64 {
        let mut state = self.write();
        let id = state.allocate_id();
        pick(&mut *state).push(Section {
            id,
            name: name.to_string(),
            slug: slugify(name),
            is_active: true,
        });
        id
    }

    pub fn add_path(&self, name: &str) -> i64 {
        self.add_section(|s| &mut s.paths, name)
    }

    pub fn add_category(&self, name: &str) -> i64 {
        self.add_section(|s| &mut s.categories, name)
    }

    pub fn add_topic(&self, name: &str) -> i64 {
        self.add_section(|s| &mut s.topics, name)
    }

    pub fn add_content(&self, content: NewContent) -> i64 {
        let mut state = self.write();
        let id = state.allocate_id();
        state.content.push(StoredContent {
            item: ContentItem {
                id,
                name: content.name,
                description: content.description,
                kind: content.kind,
                file_path: content.file_path,
                url: content.url,
            },
            is_active: true,
            paths: content.paths,
            categories: content.categories,
            topics: content.topics,
        });
        id
    }

    /// Flip the active flag of any entity with this id
    pub fn set_active(&self, id: i64, is_active: bool) {
        let mut guard = self.write();
        let state = &mut *guard;
        for section in state
            .paths
            .iter_mut()
            .chain(state.categories.iter_mut())
            .chain(state.topics.iter_mut())
            .filter(|s| s.id == id)
        {
            section.is_active = is_active;
        }
        for content in state.content.iter_mut().filter(|c| c.item.id == id) {
            content.is_active = is_active;
        }
    }

    /// Every stored rating for `content` as `(rater, value)` pairs
    pub fn ratings_for(&self, content: i64) -> Vec<(i64, i16)> {
        let mut ratings: Vec<(i64, i16)> = self
            .read()
            .ratings
            .iter()
            .filter(|((c, _), _)| *c == content)
            .map(|((_, rater), value)| (*rater, *value))
            .collect();
        ratings.sort_unstable();
        ratings
    }

    pub fn views(&self) -> Vec<ViewEvent> {
        self.read().views.clone()
    }

    pub fn user(&self, telegram_id: i64) -> Option<Visitor> {
        self.read().users.get(&telegram_id).cloned()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn list_paths(&self) -> Result<Vec<Path>> {
        let mut paths: Vec<Path> = self
            .read()
            .paths
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        sort_sections(&mut paths);
        Ok(paths)
    }

    async fn get_path(&self, path: i64) -> Result<Option<Path>> {
        Ok(self
            .read()
            .paths
            .iter()
            .find(|p| p.id == path && p.is_active)
            .cloned())
    }

    async fn get_category(&self, category: i64) -> Result<Option<Category>> {
        Ok(self
            .read()
            .categories
            .iter()
            .find(|c| c.id == category && c.is_active)
            .cloned())
    }

    async fn get_topic(&self, topic: i64) -> Result<Option<Topic>> {
        Ok(self
            .read()
            .topics
            .iter()
            .find(|t| t.id == topic && t.is_active)
            .cloned())
    }

    async fn list_categories(&self, path: i64) -> Result<Vec<Category>> {
        let state = self.read();
        let mut categories: Vec<Category> = state
            .categories
            .iter()
            .filter(|c| c.is_active)
            .filter(|c| state.scoped(path, c.id).next().is_some())
            .cloned()
            .collect();
        sort_sections(&mut categories);
        Ok(categories)
    }

    async fn list_topics(&self, path: i64, category: i64) -> Result<Vec<Topic>> {
        Ok(self.read().topics_under(path, category))
    }

    async fn has_topics(&self, path: i64, category: i64) -> Result<bool> {
        let state = self.read();
        let has = state.scoped(path, category).any(|c| {
            c.topics
                .iter()
                .any(|topic| State::active(&state.topics, *topic))
        });
        Ok(has)
    }

    async fn list_content(
        &self,
        path: i64,
        category: i64,
        topic: Option<i64>,
    ) -> Result<Vec<ContentItem>> {
        let state = self.read();
        if let Some(topic) = topic {
            if !State::active(&state.topics, topic) {
                return Ok(Vec::new());
            }
        }
        let mut items: Vec<ContentItem> = state
            .scoped(path, category)
            .filter(|c| topic.map_or(true, |t| c.topics.contains(&t)))
            .map(|c| c.item.clone())
            .collect();
        sort_items(&mut items);
        Ok(items)
    }

    async fn search_content(&self, needle: &str) -> Result<Vec<ContentItem>> {
        let needle = needle.to_lowercase();
        let mut items: Vec<ContentItem> = self
            .read()
            .content
            .iter()
            .filter(|c| c.is_active && c.item.name.to_lowercase().contains(&needle))
            .map(|c| c.item.clone())
            .collect();
        sort_items(&mut items);
        Ok(items)
    }

    async fn get_content(&self, content: i64) -> Result<Option<ContentItem>> {
        Ok(self
            .read()
            .content
            .iter()
            .find(|c| c.item.id == content && c.is_active)
            .map(|c| c.item.clone()))
    }

    async fn rating_summary(&self, content: i64) -> Result<Option<RatingSummary>> {
        let ratings = self.ratings_for(content);
        if ratings.is_empty() {
            return Ok(None);
        }
        let total: f64 = ratings.iter().map(|(_, value)| f64::from(*value)).sum();
        Ok(Some(RatingSummary {
            average: total / ratings.len() as f64,
            count: ratings.len() as i64,
        }))
    }

    async fn upsert_rating(&self, content: i64, rater: &Visitor, value: i16) -> Result<()> {
        let mut state = self.write();
        state
            .users
            .entry(rater.telegram_id)
            .or_insert_with(|| rater.clone());
        state.ratings.insert((content, rater.telegram_id), value);
        Ok(())
    }

    async fn record_view(&self, event: ViewEvent) -> Result<()> {
        self.write().views.push(event);
        Ok(())
    }

    async fn touch_user(&self, visitor: &Visitor) -> Result<()> {
        self.write()
            .users
            .insert(visitor.telegram_id, visitor.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_item_linked_through_two_paths_is_listed_once() -> Result<()> {
        let catalog = InMemoryCatalog::new();
        let adults = catalog.add_path("Adults");
        let teens = catalog.add_path("Teens");
        let health = catalog.add_category("Health");
        catalog.add_content(
            NewContent::new("Sleep", ContentKind::Pdf)
                .linked(adults, health, None)
                .linked(teens, health, None),
        );

        let items = catalog.list_content(adults, health, None).await?;
        assert_eq!(items.len(), 1);

        let found = catalog.search_content("sle").await?;
        assert_eq!(found.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_links_hide_categories_and_topics() -> Result<()> {
        let catalog = InMemoryCatalog::new();
        let path = catalog.add_path("Parents");
        let category = catalog.add_category("School");
        let topic = catalog.add_topic("Exams");
        let item = catalog.add_content(
            NewContent::new("Exam stress", ContentKind::Text).linked(path, category, Some(topic)),
        );

        assert!(catalog.has_topics(path, category).await?);

        catalog.set_active(topic, false);
        assert!(!catalog.has_topics(path, category).await?);
        assert!(catalog.list_topics(path, category).await?.is_empty());
        assert!(catalog.list_content(path, category, Some(topic)).await?.is_empty());
        assert_eq!(catalog.list_content(path, category, None).await?.len(), 1);

        catalog.set_active(item, false);
        assert!(catalog.list_categories(path).await?.is_empty());
        assert!(catalog.get_content(item).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_listing_is_ordered_by_name_then_id() -> Result<()> {
        let catalog = InMemoryCatalog::new();
        let path = catalog.add_path("All");
        let category = catalog.add_category("Books");
        let pdf = |name: &str| NewContent::new(name, ContentKind::Pdf).linked(path, category, None);
        let first = catalog.add_content(pdf("b"));
        let second = catalog.add_content(pdf("a"));
        let third = catalog.add_content(pdf("b"));

        let ids: Vec<i64> = catalog
            .list_content(path, category, None)
            .await?
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec![second, first, third]);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_ids_yield_empty_results() -> Result<()> {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.list_categories(404).await?.is_empty());
        assert!(catalog.list_topics(404, 405).await?.is_empty());
        assert!(!catalog.has_topics(404, 405).await?);
        assert!(catalog.get_path(404).await?.is_none());
        assert!(catalog.rating_summary(404).await?.is_none());
        Ok(())
    }
}
