//! Account routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::auth;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/user/signup", post(auth::signup))
        .route("/api/user/login", post(auth::login))
        .route("/api/user/refresh", post(auth::refresh_token))
        .route("/api/user/logout", post(auth::logout))
        .route("/api/user/logout-all", post(auth::logout_all))
        .route(
            "/api/user/profile",
            get(auth::get_profile).patch(auth::update_profile),
        )
}
