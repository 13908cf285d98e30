//! User management DTOs

use serde::Deserialize;
use validator::Validate;

use crate::models::auth::{string_or_number, trimmed};
use crate::models::UserRole;

/// Partial update for a user record. `role` is honoured only on the admin path.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, message = "First name cannot be empty"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Last name cannot be empty"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub payment_details: Option<bool>,
    pub role: Option<UserRole>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
            && self.password.is_none()
            && self.payment_details.is_none()
            && self.role.is_none()
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
