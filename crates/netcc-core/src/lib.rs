//! netcc Core - Domain models, storage traits, and shared types
//!
//! This crate defines the core abstractions used by the netcc backend:
//! - User accounts and their credential records
//! - Comics, chapters, and author references
//! - Common error types
//! - Repository traits with in-memory and PostgreSQL implementations
//! - Configuration management

pub mod config;
pub mod postgres;
pub mod store;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, MediaConfig, ServerConfig,
    MAX_JWT_EXPIRATION_SECS,
};
pub use postgres::PgStore;
pub use store::{ComicRepository, MemoryStore, UserRepository};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for netcc operations
#[derive(Error, Debug)]
pub enum NetccError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NetccError>;

// ============================================================================
// Users
// ============================================================================

/// Registered user account
///
/// The password hash never leaves the process: it is skipped on
/// serialization so a `User` can't leak it through an API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,

    pub username: String,

    /// Unique, used for login
    pub email: String,

    /// PHC-format salted hash
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Credential record handed to the store at registration
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    /// Assign identity and creation time
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Comics
// ============================================================================

/// Author summary returned when a comic's author is populated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
}

/// Reference from a comic to the user who created it
///
/// Mutation responses carry the bare id; listings populate the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorRef {
    Id(Uuid),
    Populated(AuthorSummary),
}

impl AuthorRef {
    /// Identity of the referenced user, populated or not
    pub fn id(&self) -> Uuid {
        match self {
            AuthorRef::Id(id) => *id,
            AuthorRef::Populated(summary) => summary.id,
        }
    }

    /// Populate with a username, or fall back to the bare id if the user is gone
    pub fn populate(id: Uuid, username: Option<String>) -> Self {
        match username {
            Some(username) => AuthorRef::Populated(AuthorSummary { id, username }),
            None => AuthorRef::Id(id),
        }
    }
}

/// A chapter embedded in a comic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(rename = "_id")]
    pub id: Uuid,

    pub title: String,

    /// Episode image URLs, in reading order
    pub episodes: Vec<String>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Chapter to append to an existing comic
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub title: String,
    pub episodes: Vec<String>,
}

impl NewChapter {
    pub fn into_chapter(self) -> Chapter {
        Chapter {
            id: Uuid::new_v4(),
            title: self.title,
            episodes: self.episodes,
            created_at: Utc::now(),
        }
    }
}

/// A comic owned by exactly one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comic {
    #[serde(rename = "_id")]
    pub id: Uuid,

    pub title: String,

    pub author: AuthorRef,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Thumbnail image URL
    pub thumbnail: String,

    /// Chapters in insertion order
    pub chapters: Vec<Chapter>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Comic {
    /// Identity of the comic's author
    pub fn author_id(&self) -> Uuid {
        self.author.id()
    }
}

/// Comic creation record
#[derive(Debug, Clone)]
pub struct NewComic {
    pub title: String,
    pub author_id: Uuid,
    pub description: Option<String>,
    pub category: Option<String>,
    pub thumbnail: String,
}

impl NewComic {
    /// Check the fields the store relies on
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(NetccError::ValidationError("Title is required".to_string()));
        }
        if self.thumbnail.is_empty() {
            return Err(NetccError::ValidationError(
                "Thumbnail is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn into_comic(self) -> Comic {
        Comic {
            id: Uuid::new_v4(),
            title: self.title,
            author: AuthorRef::Id(self.author_id),
            description: self.description,
            category: self.category,
            thumbnail: self.thumbnail,
            chapters: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
