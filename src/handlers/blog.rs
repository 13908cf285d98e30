use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{AdminUser, OptionalUser};
use crate::blog::{BlogPost, CreatePostRequest, UpdatePostRequest};
use crate::error::ApiError;
use crate::models::MessageResponse;
use crate::state::AppState;

/// GET /api/blog (published only)
pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<BlogPost>>, ApiError> {
    Ok(Json(state.blog_service.list_posts().await?))
}

/// GET /api/blog/all, drafts included
pub async fn list_all_posts(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<BlogPost>>, ApiError> {
    Ok(Json(state.blog_service.list_all_posts().await?))
}

/// GET /api/blog/:id. Drafts are 404 unless the caller is an admin.
pub async fn get_post(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BlogPost>, ApiError> {
    let include_drafts = user.as_ref().is_some_and(|u| u.is_admin());
    Ok(Json(state.blog_service.get_post(id, include_drafts).await?))
}

pub async fn create_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<BlogPost>), ApiError> {
    let post = state.blog_service.create_post(admin.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog_service.update_post(id, req).await?))
}

pub async fn delete_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.blog_service.delete_post(id).await?;
    Ok(Json(MessageResponse::new("Post deleted")))
}
