use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::coins;
use crate::state::AppState;

pub fn coin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/coins", get(coins::list_coins).post(coins::create_coin))
        .route(
            "/api/coins/:id",
            get(coins::get_coin)
                .patch(coins::update_coin)
                .delete(coins::delete_coin),
        )
        .route("/api/coins/import/:asset_id", post(coins::import_coin))
}
