//! Support ticket endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{AdminUser, AuthenticatedUser, OptionalUser};
use crate::error::ApiError;
use crate::models::MessageResponse;
use crate::state::AppState;
use crate::support::{
    CreateTicketRequest, ListTicketsQuery, SupportError, SupportTicket, UpdateTicketRequest,
};

/// POST /api/support. Signed-in callers get the ticket linked to their account.
pub async fn create_ticket(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<SupportTicket>), ApiError> {
    let ticket = state
        .support_service
        .create_ticket(user.map(|u| u.user_id), req)
        .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// GET /api/support?status=Unanswered
pub async fn list_tickets(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Vec<SupportTicket>>, ApiError> {
    Ok(Json(state.support_service.list_tickets(query.status).await?))
}

/// GET /api/support/mine
pub async fn my_tickets(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<SupportTicket>>, ApiError> {
    Ok(Json(state.support_service.my_tickets(user.user_id).await?))
}

/// GET /api/support/:id. Someone else's ticket looks the same as a missing one.
pub async fn get_ticket(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SupportTicket>, ApiError> {
    let ticket = state.support_service.get_ticket(id).await?;
    if !ticket.visible_to(user.user_id, user.is_admin()) {
        return Err(SupportError::NotFound.into());
    }
    Ok(Json(ticket))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<SupportTicket>, ApiError> {
    Ok(Json(state.support_service.update_ticket(id, req).await?))
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.support_service.delete_ticket(id).await?;
    Ok(Json(MessageResponse::new("Ticket deleted")))
}
