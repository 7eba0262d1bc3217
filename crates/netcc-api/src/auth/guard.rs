//! Resource ownership checks
//!
//! Ownership is plain identity equality between the resource's recorded
//! author and the authenticated caller. There are no roles or overrides.

use super::middleware::{AuthError, AuthenticatedUser};
use uuid::Uuid;

/// Allow a mutation only when the caller is the resource's author
pub fn authorize(resource_author_id: Uuid, authenticated_user_id: Uuid) -> Result<(), AuthError> {
    if resource_author_id == authenticated_user_id {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

impl AuthenticatedUser {
    /// Shorthand for `authorize(author_id, self.user_id)`
    pub fn ensure_owns(&self, resource_author_id: Uuid) -> Result<(), AuthError> {
        authorize(resource_author_id, self.user_id)
    }
}
