use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::auth::{string_or_number, trimmed};

/// Ticket lifecycle
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Default)]
#[sqlx(type_name = "ticket_status", rename_all = "PascalCase")]
pub enum TicketStatus {
    #[default]
    Unanswered,
    Replied,
    Resolved,
}

/// Support ticket
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: TicketStatus,
    pub assigned_support_staff_id: Option<Uuid>,
    pub subject: Option<String>,
    pub body: String,
    pub category: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SupportTicket {
    /// Admins see every ticket, users only their own
    pub fn visible_to(&self, user_id: Uuid, is_admin: bool) -> bool {
        is_admin || self.user_id == Some(user_id)
    }
}

/// Body for POST /api/support
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub category: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone_number: Option<String>,
}

impl CreateTicketRequest {
    /// Trim text fields and lowercase the email, ahead of validation
    pub fn normalized(mut self) -> Self {
        self.subject = trimmed(self.subject);
        self.category = trimmed(self.category);
        self.first_name = trimmed(self.first_name);
        self.last_name = trimmed(self.last_name);
        self.email = trimmed(self.email).map(|e| e.to_lowercase());
        self.phone_number = trimmed(self.phone_number);
        self
    }

    pub fn empty_fields(&self) -> Vec<String> {
        [
            ("body", &self.body),
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
        ]
        .into_iter()
        .filter(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
        .map(|(name, _)| name.to_string())
        .collect()
    }
}

/// Body for PATCH /api/support/:id (admin)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    pub status: Option<TicketStatus>,
    pub assigned_support_staff_id: Option<Uuid>,
    pub category: Option<String>,
}

/// Query for GET /api/support
#[derive(Debug, Default, Deserialize)]
pub struct ListTicketsQuery {
    pub status: Option<TicketStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_pascal_case() {
        assert_eq!(
            serde_json::to_value(TicketStatus::Unanswered).unwrap(),
            "Unanswered"
        );
        let status: TicketStatus = serde_json::from_str("\"Resolved\"").unwrap();
        assert_eq!(status, TicketStatus::Resolved);
    }

    fn ticket(user_id: Option<Uuid>) -> SupportTicket {
        SupportTicket {
            id: Uuid::new_v4(),
            user_id,
            status: TicketStatus::default(),
            assigned_support_staff_id: None,
            subject: None,
            body: "Withdrawal pending".to_string(),
            category: None,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_ticket_visibility() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let owned = ticket(Some(owner));
        assert!(owned.visible_to(owner, false));
        assert!(!owned.visible_to(stranger, false));
        assert!(owned.visible_to(stranger, true));

        // anonymous tickets belong to nobody
        let anonymous = ticket(None);
        assert!(!anonymous.visible_to(owner, false));
        assert!(anonymous.visible_to(owner, true));
    }

    #[test]
    fn test_create_ticket_validation() {
        let req: CreateTicketRequest = serde_json::from_value(serde_json::json!({
            "body": "My deposit is missing",
            "firstName": "Ada",
            "email": "not-an-email",
            "phoneNumber": 7700900123u64
        }))
        .unwrap();

        assert_eq!(req.empty_fields(), vec!["lastName"]);
        assert!(req.validate().is_err());
        assert_eq!(req.phone_number.as_deref(), Some("7700900123"));
    }

    #[test]
    fn test_padded_ticket_email_is_accepted() {
        let req = CreateTicketRequest {
            body: Some("Card declined".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: Some(" ADA@example.com\t".to_string()),
            ..Default::default()
        }
        .normalized();

        assert!(req.validate().is_ok());
        assert_eq!(req.email.as_deref(), Some("ada@example.com"));
    }
}
