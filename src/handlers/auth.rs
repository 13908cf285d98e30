//! Signup, login and session endpoints

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};

use super::AuthenticatedUser;
use crate::auth::ClientMeta;
use crate::error::ApiError;
use crate::middleware::ClientAddr;
use crate::models::auth::{AuthTokensResponse, LoginRequest, RefreshTokenRequest, SignupRequest};
use crate::models::UserResponse;
use crate::state::AppState;
use crate::users::UpdateUserRequest;

fn client_meta(client: Option<Extension<ClientAddr>>, headers: &HeaderMap) -> ClientMeta {
    ClientMeta {
        ip_address: client.map(|Extension(ClientAddr(addr))| addr),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
    }
}

/// POST /api/user/signup
pub async fn signup(
    State(state): State<AppState>,
    client: Option<Extension<ClientAddr>>,
    headers: HeaderMap,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthTokensResponse>), ApiError> {
    let tokens = state.auth_service.signup(req, client_meta(client, &headers)).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    client: Option<Extension<ClientAddr>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthTokensResponse>, ApiError> {
    let tokens = state.auth_service.login(req, client_meta(client, &headers)).await?;
    Ok(Json(tokens))
}

/// POST /api/user/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<AuthTokensResponse>, ApiError> {
    let tokens = state.auth_service.refresh_tokens(&req.refresh_token).await?;
    Ok(Json(tokens))
}

/// POST /api/user/logout
pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    state.auth_service.revoke_session(&user.jti).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, serde::Serialize)]
pub struct LogoutAllResponse {
    pub revoked_sessions: u64,
}

/// POST /api/user/logout-all
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<LogoutAllResponse>, ApiError> {
    let revoked_sessions = state.auth_service.revoke_all_sessions(user.user_id).await?;
    Ok(Json(LogoutAllResponse { revoked_sessions }))
}

/// GET /api/user/profile
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.user_service.get_user(user.user_id).await?;
    Ok(Json(user.into()))
}

/// PATCH /api/user/profile. Role changes are ignored here.
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .user_service
        .update_user(user.user_id, req, false)
        .await?;
    Ok(Json(user.into()))
}
