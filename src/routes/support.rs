use axum::{routing::get, Router};

use crate::handlers::support;
use crate::state::AppState;

pub fn support_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/support",
            get(support::list_tickets).post(support::create_ticket),
        )
        .route("/api/support/mine", get(support::my_tickets))
        .route(
            "/api/support/:id",
            get(support::get_ticket)
                .patch(support::update_ticket)
                .delete(support::delete_ticket),
        )
}
