//! Support ticket service

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;

use super::model::{CreateTicketRequest, SupportTicket, TicketStatus, UpdateTicketRequest};

const TICKET_COLUMNS: &str = "id, user_id, status, assigned_support_staff_id, subject, body, \
                              category, first_name, last_name, email, phone_number, created_at, updated_at";

#[derive(Error, Debug)]
pub enum SupportError {
    #[error("Please fill in all fields")]
    MissingFields(Vec<String>),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Ticket not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<SupportError> for ApiError {
    fn from(e: SupportError) -> Self {
        match e {
            SupportError::MissingFields(fields) => ApiError::MissingFields(fields),
            SupportError::Invalid(msg) => ApiError::ValidationError(msg),
            SupportError::NotFound => ApiError::NotFound(e.to_string()),
            SupportError::Database(err) => err.into(),
        }
    }
}

#[derive(Clone)]
pub struct SupportService {
    db_pool: PgPool,
}

impl SupportService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Open a ticket. `user_id` is set when the caller was signed in.
    pub async fn create_ticket(
        &self,
        user_id: Option<Uuid>,
        req: CreateTicketRequest,
    ) -> Result<SupportTicket, SupportError> {
        let req = req.normalized();
        let empty = req.empty_fields();
        if !empty.is_empty() {
            return Err(SupportError::MissingFields(empty));
        }
        req.validate()
            .map_err(|e| SupportError::Invalid(e.to_string()))?;

        let non_empty = |s: Option<String>| s.filter(|v| !v.is_empty());

        let ticket: SupportTicket = sqlx::query_as(&format!(
            r#"
            INSERT INTO support_tickets (id, user_id, status, subject, body, category,
                                         first_name, last_name, email, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(TicketStatus::Unanswered)
        .bind(non_empty(req.subject))
        .bind(req.body.unwrap_or_default())
        .bind(non_empty(req.category))
        .bind(req.first_name.unwrap_or_default())
        .bind(req.last_name.unwrap_or_default())
        .bind(req.email.unwrap_or_default())
        .bind(non_empty(req.phone_number))
        .fetch_one(&self.db_pool)
        .await?;

        tracing::info!(ticket_id = %ticket.id, user_id = ?user_id, "Support ticket opened");
        Ok(ticket)
    }

    /// All tickets, newest first, optionally by status
    pub async fn list_tickets(
        &self,
        status: Option<TicketStatus>,
    ) -> Result<Vec<SupportTicket>, SupportError> {
        let tickets = sqlx::query_as(&format!(
            r#"
            SELECT {TICKET_COLUMNS} FROM support_tickets
            WHERE ($1::ticket_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(status)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(tickets)
    }

    pub async fn my_tickets(&self, user_id: Uuid) -> Result<Vec<SupportTicket>, SupportError> {
        let tickets = sqlx::query_as(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(tickets)
    }

    pub async fn get_ticket(&self, id: Uuid) -> Result<SupportTicket, SupportError> {
        sqlx::query_as(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(SupportError::NotFound)
    }

    pub async fn update_ticket(
        &self,
        id: Uuid,
        req: UpdateTicketRequest,
    ) -> Result<SupportTicket, SupportError> {
        let ticket: SupportTicket = sqlx::query_as(&format!(
            r#"
            UPDATE support_tickets SET
                status = COALESCE($2, status),
                assigned_support_staff_id = COALESCE($3, assigned_support_staff_id),
                category = COALESCE($4, category),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TICKET_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.status)
        .bind(req.assigned_support_staff_id)
        .bind(req.category)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                SupportError::Invalid("Assigned staff member does not exist".to_string())
            }
            _ => SupportError::Database(e),
        })?
        .ok_or(SupportError::NotFound)?;

        tracing::info!(ticket_id = %id, status = ?ticket.status, "Support ticket updated");
        Ok(ticket)
    }

    pub async fn delete_ticket(&self, id: Uuid) -> Result<(), SupportError> {
        let rows = sqlx::query("DELETE FROM support_tickets WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(SupportError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_support_error_mapping() {
        assert_eq!(
            ApiError::from(SupportError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(SupportError::MissingFields(vec!["body".into()])).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
