//! Authentication extractors
//!
//! Bearer-token verification for handlers. `AuthenticatedUser` requires a valid
//! access token backed by a live session, `AdminUser` additionally requires the
//! admin role, and `OptionalUser` never rejects.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{jwt::JwtError, verify_token, AuthError, AuthService, TokenType};
use crate::error::ApiError;
use crate::models::UserRole;

/// Caller identity taken from a verified access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub jti: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Serialize)]
struct Rejection {
    error: RejectionDetails,
}

#[derive(Debug, Serialize)]
struct RejectionDetails {
    code: &'static str,
    message: &'static str,
}

fn reject(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(Rejection {
            error: RejectionDetails { code, message },
        }),
    )
        .into_response()
}

fn unauthorized(code: &'static str, message: &'static str) -> Response {
    reject(StatusCode::UNAUTHORIZED, code, message)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    unauthorized(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                })?;

        let auth_service = Arc::<AuthService>::from_ref(state);
        authenticate(bearer.token(), &auth_service).await
    }
}

/// Verify an access token and its session. Shared by the extractors and the
/// websocket upgrade, which takes its token from the query string.
pub(crate) async fn authenticate(
    token: &str,
    auth_service: &AuthService,
) -> Result<AuthenticatedUser, Response> {
    let claims = verify_token(token, auth_service.jwt_secret()).map_err(|e| match e {
        JwtError::TokenExpired => unauthorized("TOKEN_EXPIRED", "Token has expired"),
        _ => unauthorized("INVALID_TOKEN", "Invalid token"),
    })?;

    if claims.token_type != TokenType::Access.as_str() {
        return Err(unauthorized("INVALID_TOKEN_TYPE", "Expected access token"));
    }

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| unauthorized("INVALID_TOKEN", "Invalid user ID in token"))?;

    if UserRole::parse(&claims.role).is_none() {
        return Err(unauthorized("INVALID_TOKEN", "Invalid role in token"));
    }

    let owner = auth_service
        .verify_session(&claims.jti)
        .await
        .map_err(|e| match e {
            AuthError::Database(err) => ApiError::from(err).into_response(),
            _ => unauthorized("SESSION_REVOKED", "Session has been revoked"),
        })?;

    if owner.user_id != user_id {
        return Err(unauthorized("INVALID_TOKEN", "Token does not match session"));
    }

    // role and email come from the account, not the token
    Ok(AuthenticatedUser {
        user_id,
        email: owner.email,
        role: owner.role,
        jti: claims.jti,
    })
}

/// Authenticates when a token is present; anonymous callers get `None`
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<AuthenticatedUser>);

#[async_trait]
impl<S> FromRequestParts<S> for OptionalUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(
            AuthenticatedUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}

pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(reject(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Admin access required",
            ));
        }

        Ok(AdminUser(user))
    }
}
