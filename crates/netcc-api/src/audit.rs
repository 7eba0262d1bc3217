//! Security audit logging for authentication events
//!
//! Registrations, logins, rejected tokens, and ownership denials are logged
//! at INFO level with the "audit" target so they can be filtered and routed
//! separately from application logs.

use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Request metadata attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: Uuid,
        email: String,
        client: ClientInfo,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        client: ClientInfo,
    },

    LoginSuccess {
        user_id: Uuid,
        email: String,
        client: ClientInfo,
    },

    /// The reason is only ever logged; clients see one generic message
    LoginFailure {
        email: String,
        reason: String,
        client: ClientInfo,
    },

    InvalidToken {
        reason: String,
        client: ClientInfo,
    },

    /// Authenticated user tried to mutate a resource they don't own
    AccessDenied {
        user_id: Uuid,
        resource: String,
        client: ClientInfo,
    },
}

impl AuditEvent {
    fn description(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::AccessDenied { .. } => "Access denied",
        }
    }

    fn client(&self) -> &ClientInfo {
        match self {
            AuditEvent::RegistrationSuccess { client, .. }
            | AuditEvent::RegistrationFailure { client, .. }
            | AuditEvent::LoginSuccess { client, .. }
            | AuditEvent::LoginFailure { client, .. }
            | AuditEvent::InvalidToken { client, .. }
            | AuditEvent::AccessDenied { client, .. } => client,
        }
    }
}

/// Emit an audit event on the `audit` target
///
/// The whole event also goes out as JSON in the `event` field.
pub fn audit_log(event: &AuditEvent) {
    let client = event.client();
    let payload = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => format!("{{\"error\":\"unserializable audit event: {e}\"}}"),
    };

    info!(
        target: "audit",
        at = %Utc::now(),
        event = %payload,
        ip_address = ?client.ip_address,
        user_agent = ?client.user_agent,
        "{}",
        event.description()
    );
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Client address as reported by the reverse proxy
///
/// The left-most `X-Forwarded-For` hop wins over `X-Real-IP`.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|hops| hops.split(',').next())
        .or_else(|| header_str(headers, "x-real-ip"))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "user-agent").map(str::to_string)
}
