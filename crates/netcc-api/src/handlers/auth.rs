//! Authentication API handlers
//!
//! Registration and login. Both return `{ token }` on success.

use crate::audit::ClientInfo;
use crate::auth::{LoginRequest, RegisterRequest, TokenResponse};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

/// Register a new user account
///
/// # Request Body
///
/// * `username` - Display name (required)
/// * `email` - Valid email address (unique, case-insensitive)
/// * `password` - Non-empty password
///
/// # Responses
///
/// * `200 OK` - Registered, returns an identity token
/// * `400 Bad Request` - Invalid input or email already registered
/// * `500 Internal Server Error` - Server error
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered", body = TokenResponse),
        (status = 400, description = "Invalid input or user already exists", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let client = ClientInfo::from_headers(&headers);

    let response = state.auth_service().register(request, &client).await?;

    Ok(Json(response))
}

/// Login with email and password
///
/// Unknown emails and wrong passwords get the same response.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let client = ClientInfo::from_headers(&headers);

    let response = state.auth_service().login(request, &client).await?;

    Ok(Json(response))
}
