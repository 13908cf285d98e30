//! Who-can-see-what checks through the full router against a real Postgres
//!
//! Run with `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use coinfolio_server::auth::ClientMeta;
    use coinfolio_server::blog::CreatePostRequest;
    use coinfolio_server::config::{Config, Environment};
    use coinfolio_server::market::{
        AssetQuote, HistoryInterval, MarketError, PricePoint, PriceSource,
    };
    use coinfolio_server::middleware::RateLimiter;
    use coinfolio_server::models::auth::{LoginRequest, SignupRequest};
    use coinfolio_server::models::UserRole;
    use coinfolio_server::state::AppState;
    use coinfolio_server::users::UpdateUserRequest;
    use coinfolio_server::{build_router, db};

    const PASSWORD: &str = "Cobol#1959";

    struct NoMarket;

    #[async_trait]
    impl PriceSource for NoMarket {
        async fn list_assets(
            &self,
            _ids: Option<&[String]>,
            _limit: Option<u32>,
        ) -> Result<Vec<AssetQuote>, MarketError> {
            Ok(vec![])
        }

        async fn get_asset(&self, id: &str) -> Result<AssetQuote, MarketError> {
            Err(MarketError::UnknownAsset(id.to_string()))
        }

        async fn history(
            &self,
            _id: &str,
            _interval: HistoryInterval,
            _start_ms: i64,
            _end_ms: i64,
        ) -> Result<Vec<PricePoint>, MarketError> {
            Ok(vec![])
        }
    }

    fn test_config(database_url: String) -> Config {
        Config {
            database_url,
            environment: Environment::Development,
            port: 0,
            db_max_connections: 5,
            db_acquire_timeout_seconds: 1,
            rate_limit_rps: 1000,
            trust_proxy_headers: false,
            cors_allowed_origins: None,
            log_level: "warn".to_string(),
            jwt_secret: "access-test-secret".to_string(),
            jwt_access_token_ttl_seconds: 3600,
            jwt_refresh_token_ttl_days: 30,
            bcrypt_cost: 4,
            market_api_url: "http://127.0.0.1:1".to_string(),
            market_api_key: None,
            market_quote_ttl_seconds: 30,
            market_sync_interval_seconds: 0,
            ledger_max_retries: 3,
            admin_emails: vec![],
        }
    }

    async fn setup() -> (AppState, Router) {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/coinfolio_test".to_string());
        let config = test_config(database_url);

        let pool = db::create_pool(&config)
            .await
            .expect("Failed to connect to test database");
        db::run_migrations(&pool).await.expect("migrations");

        let state = AppState::new(&config, pool, Arc::new(NoMarket));
        let app = build_router(state.clone(), &config, RateLimiter::new(config.rate_limit_rps));
        (state, app)
    }

    /// Register with `role` and log in; returns the user id and an access token
    async fn sign_in(state: &AppState, role: UserRole) -> (Uuid, String) {
        let email = format!("access-{}@example.com", Uuid::new_v4());
        let user = state
            .user_service
            .register(
                SignupRequest {
                    first_name: Some("Grace".to_string()),
                    last_name: Some("Hopper".to_string()),
                    email: Some(email.clone()),
                    phone_number: Some("07700900456".to_string()),
                    password: Some(PASSWORD.to_string()),
                    payment_details: false,
                },
                Some(role),
            )
            .await
            .expect("register");

        let tokens = state
            .auth_service
            .login(
                LoginRequest {
                    email: Some(email),
                    password: Some(PASSWORD.to_string()),
                },
                ClientMeta::default(),
            )
            .await
            .expect("login");

        (user.id, tokens.token)
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn status_of(app: &Router, req: Request<Body>) -> StatusCode {
        app.clone().oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_demoted_admin_loses_admin_routes_immediately() {
        let (state, app) = setup().await;
        let (admin_id, token) = sign_in(&state, UserRole::Admin).await;

        let list = || request(Method::GET, "/api/admin/wallets", Some(&token), None);
        assert_eq!(status_of(&app, list()).await, StatusCode::OK);

        state
            .user_service
            .update_user(
                admin_id,
                UpdateUserRequest {
                    role: Some(UserRole::User),
                    ..Default::default()
                },
                true,
            )
            .await
            .unwrap();

        // same token, still unexpired, but the account is no longer an admin
        assert_eq!(status_of(&app, list()).await, StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(&app, request(Method::GET, "/api/wallet", Some(&token), None)).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_support_ticket_visible_to_owner_and_admins_only() {
        let (state, app) = setup().await;
        let (_, owner) = sign_in(&state, UserRole::User).await;
        let (_, stranger) = sign_in(&state, UserRole::User).await;
        let (_, admin) = sign_in(&state, UserRole::Admin).await;

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/support",
                Some(&owner),
                Some(json!({
                    "body": "Where is my deposit?",
                    "firstName": "Grace",
                    "lastName": "Hopper",
                    "email": "grace@example.com"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let ticket: Value = serde_json::from_slice(&body).unwrap();
        let uri = format!("/api/support/{}", ticket["id"].as_str().unwrap());

        let get = |token: &str| request(Method::GET, &uri, Some(token), None);
        assert_eq!(status_of(&app, get(&owner)).await, StatusCode::OK);
        assert_eq!(status_of(&app, get(&stranger)).await, StatusCode::NOT_FOUND);
        assert_eq!(status_of(&app, get(&admin)).await, StatusCode::OK);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_blog_draft_hidden_from_non_admins() {
        let (state, app) = setup().await;
        let (admin_id, admin) = sign_in(&state, UserRole::Admin).await;
        let (_, reader) = sign_in(&state, UserRole::User).await;

        let draft = state
            .blog_service
            .create_post(
                admin_id,
                CreatePostRequest {
                    title: Some("Unreleased".to_string()),
                    body: Some("Coming soon".to_string()),
                    published: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let uri = format!("/api/blog/{}", draft.id);

        assert_eq!(
            status_of(&app, request(Method::GET, &uri, None, None)).await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(&app, request(Method::GET, &uri, Some(&reader), None)).await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(&app, request(Method::GET, &uri, Some(&admin), None)).await,
            StatusCode::OK
        );

        state.blog_service.delete_post(draft.id).await.unwrap();
    }
}
