//! Wallet and ledger routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::wallet;
use crate::state::AppState;

pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/wallet",
            get(wallet::get_wallet).post(wallet::create_wallet),
        )
        .route("/api/wallet/deposit", post(wallet::deposit))
        .route("/api/wallet/withdraw", post(wallet::withdraw))
        .route("/api/wallet/buy", post(wallet::buy))
        .route("/api/wallet/sell", post(wallet::sell))
        .route("/api/wallet/transactions", get(wallet::list_transactions))
        .route("/api/admin/wallets", get(wallet::admin_list_wallets))
        .route(
            "/api/admin/wallets/:user_id",
            get(wallet::admin_get_wallet).delete(wallet::admin_delete_wallet),
        )
}
