//! API error handling
//!
//! Every failure reaching a handler boundary becomes an HTTP status plus a
//! JSON `{ code, msg }` body. Infrastructure details are logged, never
//! returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use netcc_core::NetccError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::auth::{AuthError, PasswordError, TokenError};
use crate::media::MediaError;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub msg: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            msg: msg.into(),
        }
    }
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    DuplicateUser,

    #[error("Invalid Credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("User not authorized")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateUser | AppError::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            // Ownership failures share 401 with authentication failures on the wire
            AppError::Unauthenticated(_) | AppError::Forbidden => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DuplicateUser => "DUPLICATE_USER",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Server(_) => "SERVER_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            AppError::Server(detail) => {
                tracing::error!(error = %detail, "request failed");
                "Server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ApiError::new(self.code(), msg))).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Server(err.to_string())
    }
}

impl From<NetccError> for AppError {
    fn from(err: NetccError) -> Self {
        match err {
            NetccError::NotFound(resource) => AppError::NotFound(resource),
            NetccError::DuplicateEmail(_) => AppError::DuplicateUser,
            NetccError::ValidationError(msg) => AppError::Validation(msg),
            NetccError::DatabaseError(msg) => AppError::Server(format!("Database error: {msg}")),
            NetccError::ConfigError(msg) => {
                AppError::Server(format!("Configuration error: {msg}"))
            }
            NetccError::Other(err) => AppError::Server(err.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => AppError::Unauthenticated(err.to_string()),
            AuthError::InvalidToken(_) => {
                AppError::Unauthenticated("Token is not valid".to_string())
            }
            AuthError::Forbidden => AppError::Forbidden,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(e) => AppError::Server(format!("Failed to sign token: {e}")),
            e @ TokenError::ExpiryOverflow(_) => AppError::Server(e.to_string()),
            other => AppError::from(AuthError::InvalidToken(other)),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Server(err.to_string())
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::UnsupportedFormat(_) => AppError::Validation(err.to_string()),
            other => AppError::Server(format!("Media upload failed: {other}")),
        }
    }
}
