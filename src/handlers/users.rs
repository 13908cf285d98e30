//! Admin user management

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::AdminUser;
use crate::error::ApiError;
use crate::models::auth::SignupRequest;
use crate::models::{MessageResponse, UserResponse, UserRole};
use crate::state::AppState;
use crate::users::UpdateUserRequest;

/// Admin-created accounts may carry a role; the rest matches signup
#[derive(Debug, serde::Deserialize)]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub profile: SignupRequest,
    pub role: Option<UserRole>,
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.user_service.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.get_user(id).await?;
    Ok(Json(user.into()))
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.user_service.register(req.profile, req.role).await?;
    tracing::info!(admin_id = %admin.user_id, user_id = %user.id, "User created by admin");
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.update_user(id, req, true).await?;
    Ok(Json(user.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.delete_user(id).await?;
    tracing::info!(admin_id = %admin.user_id, user_id = %id, "User deleted");
    Ok(Json(MessageResponse::new("User deleted")))
}
