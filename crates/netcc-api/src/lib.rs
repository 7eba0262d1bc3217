//! netcc API - REST server for the comics site
//!
//! Accounts with token authentication, comic creation with hosted
//! thumbnails, and author-only chapter uploads.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod media;
pub mod routes;
pub mod state;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, routing::get, Router};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document for the HTTP surface
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::comics::create_comic,
        handlers::comics::list_comics,
        handlers::comics::get_comic,
        handlers::comics::add_chapter,
        handlers::health::health_check,
    ),
    components(schemas(
        error::ApiError,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::TokenResponse,
        handlers::comics::ComicUpload,
        handlers::comics::ChapterUpload,
        handlers::health::HealthResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "comics", description = "Comics and chapters"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    auth::AUTH_TOKEN_HEADER,
                ))),
            );
        }
    }
}

/// Build the CORS layer; no configured origins means any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_size = state.config.server.max_body_size;
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Router over in-memory stores with cheap password hashing, for tests
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> (Router, Arc<AppState>) {
    let state = Arc::new(
        AppState::in_memory(netcc_core::AppConfig::default())
            .with_password_config(auth::PasswordConfig::minimal()),
    );
    (create_router(state.clone()), state)
}
