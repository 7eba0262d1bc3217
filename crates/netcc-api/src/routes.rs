//! API route definitions

use crate::auth::auth_middleware;
use crate::handlers::{auth, comics};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Routes served under `/api`
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/comics", get(comics::list_comics))
        .route("/comics/:id", get(comics::get_comic));

    // Protected routes; route_layer keeps unmatched paths at 404
    let protected_routes = Router::new()
        .route("/comics", post(comics::create_comic))
        .route("/comics/:id/chapters", post(comics::add_chapter))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
