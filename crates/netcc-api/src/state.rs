//! Application state management

use crate::auth::{AuthService, JwtConfig, PasswordConfig, TokenService};
use crate::media::{CloudinaryStore, MediaStore, MemoryMediaStore};
use netcc_core::{AppConfig, ComicRepository, MemoryStore, PgStore, UserRepository};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Credential records
    pub users: Arc<dyn UserRepository>,
    /// Comics and their chapters
    pub comics: Arc<dyn ComicRepository>,
    /// Image host for thumbnails and episodes
    pub media: Arc<dyn MediaStore>,
    /// Identity token issuance and verification
    pub tokens: Arc<TokenService>,
    /// Argon2 cost parameters
    pub password: PasswordConfig,
    /// Hash of a throwaway password, verified on logins for unknown emails
    decoy_hash: Arc<OnceCell<String>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserRepository>,
        comics: Arc<dyn ComicRepository>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(JwtConfig::from(&config.auth)));
        let password = PasswordConfig::from(&config.auth);
        Self {
            config,
            start_time: Instant::now(),
            users,
            comics,
            media,
            tokens,
            password,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// State backed entirely by in-process stores
    pub fn in_memory(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let media = Arc::new(MemoryMediaStore::new(config.media.folder.clone()));
        Self::new(config, store.clone(), store, media)
    }

    /// Build state from configuration, connecting to external services
    ///
    /// Without a database URL the in-memory store is used; without media
    /// credentials uploads stay in process.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let (users, comics): (Arc<dyn UserRepository>, Arc<dyn ComicRepository>) =
            match config.database.url.as_deref() {
                Some(url) => {
                    let store = PgStore::connect(url, config.database.max_connections).await?;
                    store.init_schema().await?;
                    info!("Connected to PostgreSQL store");
                    let store = Arc::new(store);
                    (store.clone(), store)
                }
                None => {
                    warn!("DATABASE_URL not set, data will not survive a restart");
                    let store = Arc::new(MemoryStore::new());
                    (store.clone(), store)
                }
            };

        let media: Arc<dyn MediaStore> = if config.media.is_configured() {
            info!(folder = %config.media.folder, "Uploading images to Cloudinary");
            Arc::new(CloudinaryStore::from_config(&config.media)?)
        } else {
            warn!("Cloudinary credentials not set, keeping uploads in memory");
            Arc::new(MemoryMediaStore::new(config.media.folder.clone()))
        };

        Ok(Self::new(config, users, comics, media))
    }

    /// Replace the token service, e.g. to drive expiry from a test clock
    pub fn with_token_service(mut self, tokens: Arc<TokenService>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_password_config(mut self, password: PasswordConfig) -> Self {
        self.password = password;
        self.decoy_hash = Arc::new(OnceCell::new());
        self
    }

    /// Registration and login service over this state's stores
    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.users.clone(),
            self.tokens.clone(),
            self.password.clone(),
        )
        .with_decoy_hash(self.decoy_hash.clone())
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory(AppConfig::default())
    }
}
