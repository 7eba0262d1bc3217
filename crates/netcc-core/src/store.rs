//! Storage traits and the in-memory store
//!
//! `UserRepository` is the credential store; `ComicRepository` holds comics
//! with their embedded chapters. Every mutation is atomic with respect to
//! its own precondition: email uniqueness for users, comic existence for
//! chapter appends.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{AuthorRef, Comic, NetccError, NewChapter, NewComic, NewUser, Result, User};

/// Credential store
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a user by exact email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up a user by id
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Persist a new user
    ///
    /// Fails with `NetccError::DuplicateEmail` if the email is taken. The
    /// check and the insert happen as one step.
    async fn create_user(&self, user: NewUser) -> Result<User>;
}

/// Comic and chapter store
#[async_trait]
pub trait ComicRepository: Send + Sync {
    /// Persist a new comic with no chapters
    async fn create_comic(&self, comic: NewComic) -> Result<Comic>;

    /// All comics in creation order, authors populated
    async fn list_comics(&self) -> Result<Vec<Comic>>;

    /// A comic with its author as a bare id
    async fn find_comic(&self, id: Uuid) -> Result<Option<Comic>>;

    /// A comic with its author populated
    async fn find_comic_populated(&self, id: Uuid) -> Result<Option<Comic>>;

    /// Append a chapter and return the updated comic (author as a bare id)
    ///
    /// Fails with `NetccError::NotFound` if the comic does not exist.
    async fn append_chapter(&self, comic_id: Uuid, chapter: NewChapter) -> Result<Comic>;
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    emails: HashMap<String, Uuid>,
    comics: Vec<Comic>,
}

impl MemoryState {
    fn populate(&self, mut comic: Comic) -> Comic {
        let author_id = comic.author_id();
        let username = self.users.get(&author_id).map(|u| u.username.clone());
        comic.author = AuthorRef::populate(author_id, username);
        comic
    }
}

/// Process-local store used for development and tests
///
/// Data lives for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.state.write().await;
        if state.emails.contains_key(&user.email) {
            return Err(NetccError::DuplicateEmail(user.email));
        }

        let user = user.into_user();
        state.emails.insert(user.email.clone(), user.id);
        state.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl ComicRepository for MemoryStore {
    async fn create_comic(&self, comic: NewComic) -> Result<Comic> {
        comic.validate()?;
        let comic = comic.into_comic();
        self.state.write().await.comics.push(comic.clone());
        Ok(comic)
    }

    async fn list_comics(&self) -> Result<Vec<Comic>> {
        let state = self.state.read().await;
        Ok(state
            .comics
            .iter()
            .cloned()
            .map(|comic| state.populate(comic))
            .collect())
    }

    async fn find_comic(&self, id: Uuid) -> Result<Option<Comic>> {
        let state = self.state.read().await;
        Ok(state.comics.iter().find(|c| c.id == id).cloned())
    }

    async fn find_comic_populated(&self, id: Uuid) -> Result<Option<Comic>> {
        let state = self.state.read().await;
        Ok(state
            .comics
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .map(|comic| state.populate(comic)))
    }

    async fn append_chapter(&self, comic_id: Uuid, chapter: NewChapter) -> Result<Comic> {
        let mut state = self.state.write().await;
        let comic = state
            .comics
            .iter_mut()
            .find(|c| c.id == comic_id)
            .ok_or_else(|| NetccError::NotFound("Comic".to_string()))?;

        comic.chapters.push(chapter.into_chapter());
        Ok(comic.clone())
    }
}
