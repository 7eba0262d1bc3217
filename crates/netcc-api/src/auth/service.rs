//! Authentication service layer
//!
//! Registration and login on top of a `UserRepository`, the Argon2 hasher,
//! and the `TokenService`. Both flows end in a single `{ token }` response.

use super::jwt::TokenService;
use super::password::{hash_password, verify_password, PasswordConfig};
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;
use netcc_core::{NetccError, NewUser, UserRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::warn;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

/// User registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub username: String,

    #[validate(email(message = "Please include a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl RegisterRequest {
    fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            email: normalize_email(&self.email),
            password: self.password,
        }
    }
}

/// User login request
///
/// Not validated: a malformed email is just one that matches no account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    fn normalized(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            password: self.password,
        }
    }
}

/// Identity token returned by register and login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

/// Plaintext hashed once per service to produce the decoy hash
const DECOY_PASSWORD: &str = "netcc-decoy-password";

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Flatten validator output into one message, stable across runs
fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("Invalid {field}"),
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

/// Registration and login
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    password: PasswordConfig,
    decoy_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        password: PasswordConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            password,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Share the decoy hash cell so it is computed once per process.
    /// The cell must only ever be filled with this service's `PasswordConfig`.
    pub fn with_decoy_hash(mut self, decoy_hash: Arc<OnceCell<String>>) -> Self {
        self.decoy_hash = decoy_hash;
        self
    }

    /// Register a new user and issue their first token
    ///
    /// # Errors
    ///
    /// * `Validation` - blank username, malformed email, or empty password
    /// * `DuplicateUser` - the email is taken, including a concurrent
    ///   registration that won the race at the store
    /// * `Server` - hashing, persistence, or signing failed
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientInfo,
    ) -> Result<TokenResponse, AppError> {
        let request = request.normalized();

        if let Err(errors) = request.validate() {
            let msg = validation_message(&errors);
            self.registration_failed(&request.email, &msg, client);
            return Err(AppError::Validation(msg));
        }

        if self.users.find_by_email(&request.email).await?.is_some() {
            self.registration_failed(&request.email, "email already registered", client);
            return Err(AppError::DuplicateUser);
        }

        let password_hash = self.hash(request.password).await?;

        let user = match self
            .users
            .create_user(NewUser {
                username: request.username,
                email: request.email.clone(),
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(NetccError::DuplicateEmail(_)) => {
                self.registration_failed(&request.email, "email already registered", client);
                return Err(AppError::DuplicateUser);
            }
            Err(e) => return Err(e.into()),
        };

        // The account stays persisted even if signing fails
        let token = self.tokens.issue(user.id).map_err(|e| {
            warn!(user_id = %user.id, error = %e, "user persisted but token issuance failed");
            AppError::from(e)
        })?;

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id,
            email: user.email,
            client: client.clone(),
        });

        Ok(TokenResponse { token })
    }

    /// Exchange email and password for a token
    ///
    /// An unknown email and a wrong password produce the same
    /// `InvalidCredentials` error, and both pay for one Argon2 verification:
    /// an unknown email is checked against a decoy hash.
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientInfo,
    ) -> Result<TokenResponse, AppError> {
        let request = request.normalized();

        let Some(user) = self.users.find_by_email(&request.email).await? else {
            let decoy = self.decoy_hash().await?;
            self.verify(request.password, decoy).await?;
            self.login_failed(&request.email, "unknown email", client);
            return Err(AppError::InvalidCredentials);
        };

        if !self.verify(request.password, user.password_hash.clone()).await? {
            self.login_failed(&user.email, "wrong password", client);
            return Err(AppError::InvalidCredentials);
        }

        let token = self.tokens.issue(user.id)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            email: user.email,
            client: client.clone(),
        });

        Ok(TokenResponse { token })
    }

    async fn hash(&self, password: String) -> Result<String, AppError> {
        let config = self.password.clone();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .map_err(|e| AppError::Server(format!("Password hashing task failed: {e}")))??;
        Ok(hash)
    }

    async fn verify(&self, password: String, hash: String) -> Result<bool, AppError> {
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Server(format!("Password verification task failed: {e}")))??;
        Ok(matches)
    }

    async fn decoy_hash(&self) -> Result<String, AppError> {
        let hash = self
            .decoy_hash
            .get_or_try_init(|| self.hash(DECOY_PASSWORD.to_string()))
            .await?;
        Ok(hash.clone())
    }

    fn registration_failed(&self, email: &str, reason: &str, client: &ClientInfo) {
        audit_log(&AuditEvent::RegistrationFailure {
            email: email.to_string(),
            reason: reason.to_string(),
            client: client.clone(),
        });
    }

    fn login_failed(&self, email: &str, reason: &str, client: &ClientInfo) {
        audit_log(&AuditEvent::LoginFailure {
            email: email.to_string(),
            reason: reason.to_string(),
            client: client.clone(),
        });
    }
}
