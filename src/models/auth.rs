//! Authentication models for Coinfolio

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::UserRole;

/// Authentication session for JWT tracking
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub jti: String,
    pub refresh_token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current owner of a live session, read from `users` rather than the token
#[derive(Debug, sqlx::FromRow, Clone)]
pub struct SessionOwner {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Signup / admin create-user body. Every field is optional at the serde
/// level so missing ones can be reported together.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone_number: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub payment_details: bool,
}

impl SignupRequest {
    /// Names of required fields that are absent or blank, in form order
    pub fn empty_fields(&self) -> Vec<String> {
        [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("phoneNumber", &self.phone_number),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name.to_string())
        .collect()
    }

    /// Trim text fields and lowercase the email, ahead of validation
    pub fn normalized(mut self) -> Self {
        self.first_name = trimmed(self.first_name);
        self.last_name = trimmed(self.last_name);
        self.email = trimmed(self.email).map(|e| e.to_lowercase());
        self.phone_number = trimmed(self.phone_number);
        self
    }
}

pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Login body
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Auth tokens response
#[derive(Debug, Serialize)]
pub struct AuthTokensResponse {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Phone numbers were numeric in older clients; accept both shapes.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}
