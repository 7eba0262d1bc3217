//! Authentication and authorization
//!
//! - `jwt`: identity token issuance and verification
//! - `password`: Argon2id hashing
//! - `middleware`: request authentication for protected routes
//! - `guard`: author-only ownership checks
//! - `service`: registration and login flows

pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use guard::authorize;
pub use jwt::{Clock, JwtConfig, ManualClock, SystemClock, TokenError, TokenService};
pub use middleware::{auth_middleware, AuthError, AuthenticatedUser, AUTH_TOKEN_HEADER};
pub use password::{PasswordConfig, PasswordError};
pub use service::{AuthService, LoginRequest, RegisterRequest, TokenResponse};
