//! PostgreSQL implementation of the [`Catalog`] contract.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, info, warn};

use crate::catalog::{
    Catalog, Category, ContentItem, ContentKind, Path, RatingSummary, Section, Topic, ViewEvent,
    Visitor,
};

/// A registered bot user
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct BotUser {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub language_code: Option<String>,
    pub last_active: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, FromRow)]
struct ContentRow {
    id: i64,
    name: String,
    description: String,
    file_type: String,
    file_path: Option<String>,
    url: Option<String>,
}

impl From<ContentRow> for ContentItem {
    fn from(row: ContentRow) -> Self {
        let kind = row.file_type.parse().unwrap_or_else(|_| {
            warn!(
                content_id = row.id,
                file_type = %row.file_type,
                "Unknown content kind, treating as OTHER"
            );
            ContentKind::Other
        });
        ContentItem {
            id: row.id,
            name: row.name,
            description: row.description,
            kind,
            file_path: row.file_path,
            url: row.url,
        }
    }
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    for (table, ddl) in [
        (
            "paths",
            "CREATE TABLE IF NOT EXISTS paths (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                slug VARCHAR(100) NOT NULL UNIQUE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )",
        ),
        (
            "categories",
            "CREATE TABLE IF NOT EXISTS categories (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                slug VARCHAR(100) NOT NULL UNIQUE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )",
        ),
        (
            "topics",
            "CREATE TABLE IF NOT EXISTS topics (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                slug VARCHAR(100) NOT NULL UNIQUE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )",
        ),
        (
            "content_files",
            "CREATE TABLE IF NOT EXISTS content_files (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                file_type VARCHAR(10) NOT NULL
                    CHECK (file_type IN
                        ('PDF', 'IMAGE', 'TEXT', 'VIDEO', 'AUDIO', 'LINK', 'OTHER')),
                file_path TEXT,
                url TEXT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        ),
        (
            "content_file_paths",
            "CREATE TABLE IF NOT EXISTS content_file_paths (
                content_id BIGINT NOT NULL REFERENCES content_files(id) ON DELETE CASCADE,
                path_id BIGINT NOT NULL REFERENCES paths(id) ON DELETE CASCADE,
                PRIMARY KEY (content_id, path_id)
            )",
        ),
        (
            "content_file_categories",
            "CREATE TABLE IF NOT EXISTS content_file_categories (
                content_id BIGINT NOT NULL REFERENCES content_files(id) ON DELETE CASCADE,
                category_id BIGINT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                PRIMARY KEY (content_id, category_id)
            )",
        ),
        (
            "content_file_topics",
            "CREATE TABLE IF NOT EXISTS content_file_topics (
                content_id BIGINT NOT NULL REFERENCES content_files(id) ON DELETE CASCADE,
                topic_id BIGINT NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
                PRIMARY KEY (content_id, topic_id)
            )",
        ),
        (
            "bot_users",
            "CREATE TABLE IF NOT EXISTS bot_users (
                id BIGSERIAL PRIMARY KEY,
                telegram_id BIGINT NOT NULL UNIQUE,
                username VARCHAR(255),
                first_name VARCHAR(255),
                language_code VARCHAR(10),
                last_active TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        ),
        (
            "content_ratings",
            "CREATE TABLE IF NOT EXISTS content_ratings (
                id BIGSERIAL PRIMARY KEY,
                content_id BIGINT NOT NULL REFERENCES content_files(id) ON DELETE CASCADE,
                user_id BIGINT NOT NULL REFERENCES bot_users(id) ON DELETE CASCADE,
                rating SMALLINT NOT NULL CHECK (rating BETWEEN 1 AND 5),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (content_id, user_id)
            )",
        ),
        (
            "content_view_stats",
            "CREATE TABLE IF NOT EXISTS content_view_stats (
                id BIGSERIAL PRIMARY KEY,
                content_id BIGINT NOT NULL REFERENCES content_files(id) ON DELETE CASCADE,
                user_id BIGINT NOT NULL REFERENCES bot_users(id) ON DELETE CASCADE,
                viewed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        ),
        (
            "bot_messages",
            "CREATE TABLE IF NOT EXISTS bot_messages (
                key VARCHAR(100) PRIMARY KEY,
                text TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )",
        ),
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create {table} table"))?;
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS content_view_stats_content_idx
         ON content_view_stats (content_id)",
    )
    .execute(pool)
    .await
    .context("Failed to create view stats index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Build an `ILIKE` pattern matching `needle` anywhere, with wildcards escaped
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Catalog backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn user_id(&self, visitor: &Visitor) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO bot_users (telegram_id, username, first_name, language_code)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (telegram_id) DO UPDATE SET telegram_id = EXCLUDED.telegram_id
             RETURNING id",
        )
        .bind(visitor.telegram_id)
        .bind(&visitor.username)
        .bind(&visitor.first_name)
        .bind(&visitor.language_code)
        .fetch_one(&self.pool)
        .await
        .context("Failed to resolve bot user")?;
        Ok(id)
    }

    /// Active users, for the reminder sweep
    pub async fn active_users(&self) -> Result<Vec<BotUser>> {
        let users = sqlx::query_as::<_, BotUser>(
            "SELECT id, telegram_id, username, first_name, language_code, last_active, is_active
             FROM bot_users WHERE is_active ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active users")?;
        Ok(users)
    }

    /// Admin-managed copy stored under `key`, if present and active
    pub async fn bot_message(&self, key: &str) -> Result<Option<String>> {
        let text = sqlx::query_scalar::<_, String>(
            "SELECT text FROM bot_messages WHERE key = $1 AND is_active",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read bot message {key}"))?;
        Ok(text)
    }

    async fn section(&self, table: &str, id: i64) -> Result<Option<Section>> {
        let query =
            format!("SELECT id, name, slug, is_active FROM {table} WHERE id = $1 AND is_active");
        let section = sqlx::query_as::<_, Section>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read from {table}"))?;
        Ok(section)
    }
}

const CONTENT_COLUMNS: &str = "f.id, f.name, f.description, f.file_type, f.file_path, f.url";

#[async_trait]
impl Catalog for PgCatalog {
    async fn list_paths(&self) -> Result<Vec<Path>> {
        let paths = sqlx::query_as::<_, Section>(
            "SELECT id, name, slug, is_active FROM paths WHERE is_active ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list paths")?;
        Ok(paths)
    }

    async fn get_path(&self, path: i64) -> Result<Option<Path>> {
        self.section("paths", path).await
    }

    async fn get_category(&self, category: i64) -> Result<Option<Category>> {
        self.section("categories", category).await
    }

    async fn get_topic(&self, topic: i64) -> Result<Option<Topic>> {
        self.section("topics", topic).await
    }

    async fn list_categories(&self, path: i64) -> Result<Vec<Category>> {
        let categories = sqlx::query_as::<_, Section>(
            "SELECT c.id, c.name, c.slug, c.is_active
             FROM categories c
             WHERE c.is_active AND EXISTS (
                 SELECT 1 FROM content_files f
                 JOIN content_file_paths fp ON fp.content_id = f.id
                 JOIN paths p ON p.id = fp.path_id AND p.is_active
                 JOIN content_file_categories fc ON fc.content_id = f.id
                 WHERE f.is_active AND fp.path_id = $1 AND fc.category_id = c.id
             )
             ORDER BY c.name, c.id",
        )
        .bind(path)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list categories")?;
        debug!(path, count = categories.len(), "Listed categories");
        Ok(categories)
    }

    async fn list_topics(&self, path: i64, category: i64) -> Result<Vec<Topic>> {
        let topics = sqlx::query_as::<_, Section>(
            "SELECT t.id, t.name, t.slug, t.is_active
             FROM topics t
             WHERE t.is_active AND EXISTS (
                 SELECT 1 FROM content_files f
                 JOIN content_file_paths fp ON fp.content_id = f.id
                 JOIN paths p ON p.id = fp.path_id AND p.is_active
                 JOIN content_file_categories fc ON fc.content_id = f.id
                 JOIN categories c ON c.id = fc.category_id AND c.is_active
                 JOIN content_file_topics ft ON ft.content_id = f.id
                 WHERE f.is_active AND fp.path_id = $1 AND fc.category_id = $2
                   AND ft.topic_id = t.id
             )
             ORDER BY t.name, t.id",
        )
        .bind(path)
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list topics")?;
        Ok(topics)
    }

    async fn has_topics(&self, path: i64, category: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM content_files f
                 JOIN content_file_paths fp ON fp.content_id = f.id
                 JOIN paths p ON p.id = fp.path_id AND p.is_active
                 JOIN content_file_categories fc ON fc.content_id = f.id
                 JOIN categories c ON c.id = fc.category_id AND c.is_active
                 JOIN content_file_topics ft ON ft.content_id = f.id
                 JOIN topics t ON t.id = ft.topic_id AND t.is_active
                 WHERE f.is_active AND fp.path_id = $1 AND fc.category_id = $2
             )",
        )
        .bind(path)
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check topics")?;
        Ok(exists)
    }

    async fn list_content(
        &self,
        path: i64,
        category: i64,
        topic: Option<i64>,
    ) -> Result<Vec<ContentItem>> {
        let query = format!(
            "SELECT {CONTENT_COLUMNS}
             FROM content_files f
             WHERE f.is_active
               AND EXISTS (
                   SELECT 1 FROM content_file_paths fp
                   JOIN paths p ON p.id = fp.path_id AND p.is_active
                   WHERE fp.content_id = f.id AND fp.path_id = $1
               )
               AND EXISTS (
                   SELECT 1 FROM content_file_categories fc
                   JOIN categories c ON c.id = fc.category_id AND c.is_active
                   WHERE fc.content_id = f.id AND fc.category_id = $2
               )
               AND ($3::BIGINT IS NULL OR EXISTS (
                   SELECT 1 FROM content_file_topics ft
                   JOIN topics t ON t.id = ft.topic_id AND t.is_active
                   WHERE ft.content_id = f.id AND ft.topic_id = $3
               ))
             ORDER BY f.name, f.id"
        );
        let rows = sqlx::query_as::<_, ContentRow>(&query)
            .bind(path)
            .bind(category)
            .bind(topic)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list content")?;
        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn search_content(&self, needle: &str) -> Result<Vec<ContentItem>> {
        let query = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_files f
             WHERE f.is_active AND f.name ILIKE $1 ESCAPE '\\'
             ORDER BY f.name, f.id"
        );
        let rows = sqlx::query_as::<_, ContentRow>(&query)
            .bind(like_pattern(needle))
            .fetch_all(&self.pool)
            .await
            .context("Failed to search content")?;
        debug!(needle, count = rows.len(), "Searched content");
        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn get_content(&self, content: i64) -> Result<Option<ContentItem>> {
        let query = format!(
            "SELECT {CONTENT_COLUMNS} FROM content_files f WHERE f.id = $1 AND f.is_active"
        );
        let row = sqlx::query_as::<_, ContentRow>(&query)
            .bind(content)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read content")?;
        Ok(row.map(ContentItem::from))
    }

    async fn rating_summary(&self, content: i64) -> Result<Option<RatingSummary>> {
        let (average, count): (Option<f64>, i64) = sqlx::query_as(
            "SELECT AVG(rating)::DOUBLE PRECISION, COUNT(*)
             FROM content_ratings WHERE content_id = $1",
        )
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .context("Failed to aggregate ratings")?;
        Ok(average
            .filter(|_| count > 0)
            .map(|average| RatingSummary { average, count }))
    }

    async fn upsert_rating(&self, content: i64, rater: &Visitor, value: i16) -> Result<()> {
        let user_id = self.user_id(rater).await?;
        sqlx::query(
            "INSERT INTO content_ratings (content_id, user_id, rating)
             VALUES ($1, $2, $3)
             ON CONFLICT (content_id, user_id)
             DO UPDATE SET rating = EXCLUDED.rating, updated_at = NOW()",
        )
        .bind(content)
        .bind(user_id)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("Failed to save rating")?;
        info!(content_id = content, user_id = rater.telegram_id, rating = value, "Rating saved");
        Ok(())
    }

    async fn record_view(&self, event: ViewEvent) -> Result<()> {
        let visitor = Visitor {
            telegram_id: event.rater_id,
            ..Visitor::default()
        };
        let user_id = self.user_id(&visitor).await?;
        sqlx::query(
            "INSERT INTO content_view_stats (content_id, user_id, viewed_at) VALUES ($1, $2, $3)",
        )
        .bind(event.content_id)
        .bind(user_id)
        .bind(event.viewed_at)
        .execute(&self.pool)
        .await
        .context("Failed to record view")?;
        Ok(())
    }

    async fn touch_user(&self, visitor: &Visitor) -> Result<()> {
        sqlx::query(
            "INSERT INTO bot_users
                 (telegram_id, username, first_name, language_code, last_active, is_active)
             VALUES ($1, $2, $3, $4, NOW(), TRUE)
             ON CONFLICT (telegram_id) DO UPDATE SET
                 username = EXCLUDED.username,
                 first_name = EXCLUDED.first_name,
                 language_code = COALESCE(EXCLUDED.language_code, bot_users.language_code),
                 last_active = NOW(),
                 is_active = TRUE",
        )
        .bind(visitor.telegram_id)
        .bind(&visitor.username)
        .bind(&visitor.first_name)
        .bind(&visitor.language_code)
        .execute(&self.pool)
        .await
        .context("Failed to update user activity")?;
        Ok(())
    }
}
