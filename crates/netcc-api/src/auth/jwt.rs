//! Identity token issuance and verification
//!
//! Implements stateless JWT bearer tokens with HMAC-SHA256 signing. A token
//! asserts `{ user: { id } }` and expires a fixed time after issuance. There
//! is no server-side session and no revocation list.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use netcc_core::AuthConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Identity asserted by a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUser {
    pub id: String,
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: TokenUser,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
}

/// Token issuance and verification errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token signature")]
    TokenInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Malformed token")]
    TokenMalformed,

    #[error("Token lifetime of {0}s overflows the expiry timestamp")]
    ExpiryOverflow(u64),
}

/// JWT Configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,
    /// Token expiration time in seconds (default: 3600 = 1 hour)
    pub access_expiration_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            access_expiration_secs: config.jwt_expiration_secs,
        }
    }
}

/// Source of the current time in whole seconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Manually driven clock for tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_secs: u64) -> Self {
        Self {
            now: AtomicU64::new(start_secs),
        }
    }

    /// Start at the current wall-clock time
    pub fn starting_now() -> Self {
        Self::new(SystemClock.now_secs())
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, secs: u64) {
        self.now.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Issues and verifies identity tokens
pub struct TokenService {
    config: JwtConfig,
    clock: Arc<dyn Clock>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(config: JwtConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            clock,
            encoding_key,
            decoding_key,
        }
    }

    /// Token lifetime in seconds
    pub fn expires_in(&self) -> u64 {
        self.config.access_expiration_secs
    }

    /// Issue a token for `user_id`
    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        let now = self.clock.now_secs();
        let lifetime = self.config.access_expiration_secs;
        let exp = now
            .checked_add(lifetime)
            .ok_or(TokenError::ExpiryOverflow(lifetime))?;
        let claims = Claims {
            user: TokenUser {
                id: user_id.to_string(),
            },
            iat: now,
            exp,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Verify a token and return the user id it asserts
    ///
    /// Signature and structure are checked by `jsonwebtoken`; expiry is
    /// checked here against the service clock with no leeway.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let claims = self.decode_claims(token)?;

        if self.clock.now_secs() >= claims.exp {
            return Err(TokenError::TokenExpired);
        }

        Uuid::parse_str(&claims.user.id).map_err(|_| TokenError::TokenInvalid)
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, TokenError> {
        use jsonwebtoken::errors::ErrorKind;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => TokenError::TokenMalformed,
                _ => TokenError::TokenInvalid,
            }
        })?;

        Ok(token_data.claims)
    }
}
