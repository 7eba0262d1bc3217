/// Authentication middleware for protecting routes
///
/// Extracts the identity token from the request, verifies it with the
/// state's `TokenService`, and on success adds `AuthenticatedUser` to the
/// request extensions. Nothing else is stored.
use super::jwt::{TokenError, TokenService};
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Header the web client sends its token in
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Authenticated user information extracted from the token
///
/// Handlers behind `auth_middleware` extract it with
/// `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Authentication and authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token, authorization denied")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("User not authorized")]
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Find the token in `x-auth-token`, falling back to `Authorization: Bearer`
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(AUTH_TOKEN_HEADER) {
        return value.to_str().ok().map(str::trim).filter(|t| !t.is_empty());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller's identity from request headers
pub fn authenticate(
    tokens: &TokenService,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, AuthError> {
    let token = extract_token(headers).ok_or(AuthError::MissingToken)?;
    let user_id = tokens.verify(token)?;
    Ok(AuthenticatedUser { user_id })
}

/// Authentication middleware that requires a valid token
///
/// # Usage
///
/// ```ignore
/// use axum::{middleware, routing::post, Router};
/// use netcc_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/comics", post(create_comic))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let user = match authenticate(&state.tokens, request.headers()) {
        Ok(user) => user,
        Err(e) => {
            if let AuthError::InvalidToken(ref reason) = e {
                audit_log(&AuditEvent::InvalidToken {
                    reason: reason.to_string(),
                    client: ClientInfo::from_headers(request.headers()),
                });
            }
            return Err(e);
        }
    };

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
