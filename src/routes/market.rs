use axum::{routing::get, Router};

use crate::handlers::market;
use crate::state::AppState;

pub fn market_routes() -> Router<AppState> {
    Router::new()
        .route("/api/market/assets", get(market::list_assets))
        .route("/api/market/assets/:id", get(market::get_asset))
        .route("/api/market/assets/:id/history", get(market::asset_history))
}
