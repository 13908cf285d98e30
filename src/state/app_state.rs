//! Application state shared across handlers

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::auth::AuthService;
use crate::blog::BlogService;
use crate::config::Config;
use crate::coins::CoinService;
use crate::ledger::LedgerService;
use crate::market::{MarketService, PriceSource};
use crate::support::SupportService;
use crate::users::UserService;
use crate::websocket::WsState;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub coin_service: Arc<CoinService>,
    pub market_service: Arc<MarketService>,
    pub ledger_service: Arc<LedgerService>,
    pub blog_service: Arc<BlogService>,
    pub support_service: Arc<SupportService>,
    pub ws_state: WsState,
    pub db_pool: PgPool,
}

impl AppState {
    /// Wire every service from configuration, a pool and a price source
    pub fn new(config: &Config, db_pool: PgPool, price_source: Arc<dyn PriceSource>) -> Self {
        let ws_state = WsState::new();

        let users = UserService::new(
            db_pool.clone(),
            config.bcrypt_cost,
            config.admin_emails.clone(),
        );
        let auth = AuthService::new(
            db_pool.clone(),
            users.clone(),
            config.jwt_secret.clone(),
            config.jwt_access_token_ttl_seconds,
            config.jwt_refresh_token_ttl_days,
        );
        let coins = CoinService::new(db_pool.clone());
        let market = MarketService::new(
            price_source,
            Duration::from_secs(config.market_quote_ttl_seconds),
        );
        let ledger = LedgerService::new(
            db_pool.clone(),
            coins.clone(),
            market.clone(),
            ws_state.clone(),
            config.ledger_max_retries,
        );

        Self {
            auth_service: Arc::new(auth),
            user_service: Arc::new(users),
            coin_service: Arc::new(coins),
            market_service: Arc::new(market),
            ledger_service: Arc::new(ledger),
            blog_service: Arc::new(BlogService::new(db_pool.clone())),
            support_service: Arc::new(SupportService::new(db_pool.clone())),
            ws_state,
            db_pool,
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}
