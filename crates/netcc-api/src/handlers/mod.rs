//! API request handlers

pub mod auth;
pub mod comics;
pub mod health;

pub use auth::{login_handler, register_handler};
pub use comics::{add_chapter, create_comic, get_comic, list_comics};
pub use health::health_check;
