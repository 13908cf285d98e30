use axum::{routing::get, Router};

use crate::handlers::users;
use crate::state::AppState;

/// Admin user management
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/users",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/api/admin/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
}
