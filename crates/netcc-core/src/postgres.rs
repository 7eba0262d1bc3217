//! PostgreSQL store
//!
//! Implements the user and comic repositories with SQLx. Email uniqueness
//! is enforced by a unique index, so concurrent registrations can't create
//! two accounts for one address.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

use crate::store::{ComicRepository, UserRepository};
use crate::{AuthorRef, Chapter, Comic, NetccError, NewChapter, NewComic, NewUser, Result, User};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY,
    username      TEXT NOT NULL,
    email         TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (email);

CREATE TABLE IF NOT EXISTS comics (
    seq         BIGSERIAL,
    id          UUID PRIMARY KEY,
    author_id   UUID NOT NULL REFERENCES users (id),
    title       TEXT NOT NULL,
    description TEXT,
    category    TEXT,
    thumbnail   TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS chapters (
    seq        BIGSERIAL,
    id         UUID PRIMARY KEY,
    comic_id   UUID NOT NULL REFERENCES comics (id),
    title      TEXT NOT NULL,
    episodes   TEXT[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS chapters_comic_seq_idx ON chapters (comic_id, seq);
"#;

const COMIC_COLUMNS: &str = "c.id, c.author_id, u.username AS author_username, c.title, \
     c.description, c.category, c.thumbnail, c.created_at";

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store connection
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| NetccError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they are missing
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| NetccError::DatabaseError(format!("Schema setup failed: {e}")))?;
        Ok(())
    }

    async fn fetch_comic(&self, id: Uuid, populate: bool) -> Result<Option<Comic>> {
        let query = format!(
            "SELECT {COMIC_COLUMNS} FROM comics c LEFT JOIN users u ON u.id = c.author_id WHERE c.id = $1"
        );
        let row = sqlx::query_as::<_, ComicRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let chapters = self.fetch_chapters(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(Some(row.into_comic(chapters, populate)))
    }

    async fn fetch_chapters(&self, comic_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<Chapter>>> {
        let rows = sqlx::query_as::<_, ChapterRow>(
            "SELECT id, comic_id, title, episodes, created_at FROM chapters \
             WHERE comic_id = ANY($1) ORDER BY seq",
        )
        .bind(comic_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut grouped: HashMap<Uuid, Vec<Chapter>> = HashMap::new();
        for row in rows {
            grouped.entry(row.comic_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

fn db_error(e: sqlx::Error) -> NetccError {
    NetccError::DatabaseError(e.to_string())
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

/// Comic row joined with its author's username
#[derive(Debug, FromRow)]
struct ComicRow {
    id: Uuid,
    author_id: Uuid,
    author_username: Option<String>,
    title: String,
    description: Option<String>,
    category: Option<String>,
    thumbnail: String,
    created_at: DateTime<Utc>,
}

impl ComicRow {
    fn into_comic(self, chapters: Vec<Chapter>, populate: bool) -> Comic {
        let author = if populate {
            AuthorRef::populate(self.author_id, self.author_username)
        } else {
            AuthorRef::Id(self.author_id)
        };

        Comic {
            id: self.id,
            title: self.title,
            author,
            description: self.description,
            category: self.category,
            thumbnail: self.thumbnail,
            chapters,
            created_at: self.created_at,
        }
    }
}

/// Chapter row from database
#[derive(Debug, FromRow)]
struct ChapterRow {
    id: Uuid,
    comic_id: Uuid,
    title: String,
    episodes: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<ChapterRow> for Chapter {
    fn from(row: ChapterRow) -> Self {
        Chapter {
            id: row.id,
            title: row.title,
            episodes: row.episodes,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(User::from))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(User::from))
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let user = user.into_user();

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                NetccError::DuplicateEmail(user.email.clone())
            }
            other => db_error(other),
        })?;

        Ok(row.into())
    }
}

#[async_trait]
impl ComicRepository for PgStore {
    async fn create_comic(&self, comic: NewComic) -> Result<Comic> {
        comic.validate()?;
        let comic = comic.into_comic();

        sqlx::query(
            r#"
            INSERT INTO comics (id, author_id, title, description, category, thumbnail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(comic.id)
        .bind(comic.author_id())
        .bind(&comic.title)
        .bind(&comic.description)
        .bind(&comic.category)
        .bind(&comic.thumbnail)
        .bind(comic.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(comic)
    }

    async fn list_comics(&self) -> Result<Vec<Comic>> {
        let query = format!(
            "SELECT {COMIC_COLUMNS} FROM comics c LEFT JOIN users u ON u.id = c.author_id ORDER BY c.seq"
        );
        let rows = sqlx::query_as::<_, ComicRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut chapters = self.fetch_chapters(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let comic_chapters = chapters.remove(&row.id).unwrap_or_default();
                row.into_comic(comic_chapters, true)
            })
            .collect())
    }

    async fn find_comic(&self, id: Uuid) -> Result<Option<Comic>> {
        self.fetch_comic(id, false).await
    }

    async fn find_comic_populated(&self, id: Uuid) -> Result<Option<Comic>> {
        self.fetch_comic(id, true).await
    }

    async fn append_chapter(&self, comic_id: Uuid, chapter: NewChapter) -> Result<Comic> {
        let chapter = chapter.into_chapter();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Lock the comic row so the append can't race with anything else on it
        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM comics WHERE id = $1 FOR UPDATE")
            .bind(comic_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;

        if exists.is_none() {
            return Err(NetccError::NotFound("Comic".to_string()));
        }

        sqlx::query(
            "INSERT INTO chapters (id, comic_id, title, episodes, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(chapter.id)
        .bind(comic_id)
        .bind(&chapter.title)
        .bind(&chapter.episodes)
        .bind(chapter.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;

        self.fetch_comic(comic_id, false)
            .await?
            .ok_or_else(|| NetccError::NotFound("Comic".to_string()))
    }
}
