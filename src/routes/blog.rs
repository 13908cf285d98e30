use axum::{routing::get, Router};

use crate::handlers::blog;
use crate::state::AppState;

pub fn blog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/blog", get(blog::list_posts).post(blog::create_post))
        .route("/api/blog/all", get(blog::list_all_posts))
        .route(
            "/api/blog/:id",
            get(blog::get_post)
                .patch(blog::update_post)
                .delete(blog::delete_post),
        )
}
