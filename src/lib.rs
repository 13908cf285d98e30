//! Coinfolio backend library
//!
//! Portfolio tracking API: accounts, a coin catalogue priced from a market
//! feed, a ledger-backed simulated wallet, a blog, and support tickets.

pub mod auth;
pub mod blog;
pub mod coins;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod market;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod support;
pub mod users;
pub mod websocket;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use config::Config;
use middleware::{ProxyPolicy, RateLimiter, SecurityHeaders};
use state::AppState;

/// Assemble every route and the middleware stack. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so clients are told
/// apart by peer address.
pub fn build_router(state: AppState, config: &Config, rate_limiter: RateLimiter) -> Router {
    let security = SecurityHeaders {
        hsts: config.environment.is_production(),
    };
    let proxy = ProxyPolicy {
        trust_forwarded: config.trust_proxy_headers,
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ws", get(websocket::ws_handler))
        .merge(routes::auth_routes())
        .merge(routes::user_routes())
        .merge(routes::coin_routes())
        .merge(routes::market_routes())
        .merge(routes::wallet_routes())
        .merge(routes::blog_routes())
        .merge(routes::support_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(configure_cors(config.cors_allowed_origins.as_deref()))
                .layer(axum::middleware::from_fn_with_state(
                    proxy,
                    middleware::resolve_client,
                ))
                .layer(axum::middleware::from_fn(middleware::request_tracing))
                .layer(axum::middleware::from_fn_with_state(
                    rate_limiter,
                    middleware::rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    security,
                    middleware::security_headers,
                )),
        )
}

async fn root() -> &'static str {
    "Coinfolio API Server"
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_latency_ms: Option<u64>,
    pub version: &'static str,
}

async fn health_check(State(pool): State<PgPool>) -> Json<HealthResponse> {
    let (status, database, database_latency_ms) = match db::check_health(&pool).await {
        Ok(latency) => (
            "healthy",
            "connected".to_string(),
            Some(latency.as_millis() as u64),
        ),
        Err(e) => ("unhealthy", format!("error: {e}"), None),
    };

    Json(HealthResponse {
        status,
        database,
        database_latency_ms,
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("idempotency-key"),
        ])
        .expose_headers(Any)
}
