//! Ledger persistence tests against a real Postgres
//!
//! Run with `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use sqlx::PgPool;
    use uuid::Uuid;

    use coinfolio_server::coins::{CoinService, CreateCoinRequest};
    use coinfolio_server::db;
    use coinfolio_server::ledger::{LedgerError, LedgerRequest, LedgerService};
    use coinfolio_server::market::{
        AssetQuote, HistoryInterval, MarketError, MarketService, PricePoint, PriceSource,
    };
    use coinfolio_server::models::auth::SignupRequest;
    use coinfolio_server::users::UserService;
    use coinfolio_server::websocket::WsState;

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

    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/coinfolio_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");
        db::run_migrations(&pool).await.expect("migrations");
        pool
    }

    struct Fixture {
        users: UserService,
        coins: CoinService,
        ledger: LedgerService,
    }

    fn fixture(pool: &PgPool, max_retries: u32) -> Fixture {
        let coins = CoinService::new(pool.clone());
        let market = MarketService::new(Arc::new(NoMarket), Duration::from_secs(30));
        Fixture {
            users: UserService::new(pool.clone(), 4, vec![]),
            ledger: LedgerService::new(
                pool.clone(),
                coins.clone(),
                market,
                WsState::new(),
                max_retries,
            ),
            coins,
        }
    }

    async fn new_user(users: &UserService) -> Uuid {
        let email = format!("ledger-{}@example.com", Uuid::new_v4());
        users
            .register(
                SignupRequest {
                    first_name: Some("Grace".to_string()),
                    last_name: Some("Hopper".to_string()),
                    email: Some(email),
                    phone_number: Some("07700900456".to_string()),
                    password: Some("Cobol#1959".to_string()),
                    payment_details: false,
                },
                None,
            )
            .await
            .expect("register")
            .id
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_signup_creates_empty_wallet() {
        let pool = setup_test_db().await;
        let f = fixture(&pool, 3);
        let user_id = new_user(&f.users).await;

        let wallet = f.ledger.get_wallet(user_id).await.unwrap();
        assert_eq!(wallet.cash_balance, dec!(0));
        assert!(wallet.holdings.is_empty());

        let (_, created) = f.ledger.create_wallet(user_id).await.unwrap();
        assert!(!created);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_idempotent_deposit_replays() {
        let pool = setup_test_db().await;
        let f = fixture(&pool, 3);
        let user_id = new_user(&f.users).await;
        let key = Some("deposit-once".to_string());

        let first = f
            .ledger
            .execute(user_id, LedgerRequest::Deposit { amount: dec!(25.50) }, key.clone())
            .await
            .unwrap();
        let second = f
            .ledger
            .execute(user_id, LedgerRequest::Deposit { amount: dec!(25.5) }, key.clone())
            .await
            .unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(first.transaction.id, second.transaction.id);
        assert_eq!(second.wallet.cash_balance, dec!(25.50));

        let conflict = f
            .ledger
            .execute(user_id, LedgerRequest::Deposit { amount: dec!(99) }, key)
            .await
            .unwrap_err();
        assert!(matches!(conflict, LedgerError::IdempotencyConflict));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_buy_and_sell_manual_coin() {
        let pool = setup_test_db().await;
        let f = fixture(&pool, 3);
        let user_id = new_user(&f.users).await;

        let coin = f
            .coins
            .create_coin(CreateCoinRequest {
                name: Some(format!("Test Coin {}", Uuid::new_v4())),
                symbol: Some("TST".to_string()),
                price_usd: Some(dec!(2.5)),
                ..Default::default()
            })
            .await
            .unwrap();

        f.ledger
            .execute(user_id, LedgerRequest::Deposit { amount: dec!(10) }, None)
            .await
            .unwrap();
        let bought = f
            .ledger
            .execute(
                user_id,
                LedgerRequest::Buy {
                    coin_id: coin.id,
                    quantity: dec!(3),
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(bought.wallet.cash_balance, dec!(2.50));
        assert_eq!(bought.wallet.amount_of(coin.id), dec!(3));

        let err = f
            .ledger
            .execute(
                user_id,
                LedgerRequest::Sell {
                    coin_id: coin.id,
                    quantity: dec!(4),
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAssets { .. }));

        // held coins block deletion
        assert!(f.coins.delete_coin(coin.id).await.is_err());

        let sold = f
            .ledger
            .execute(
                user_id,
                LedgerRequest::Sell {
                    coin_id: coin.id,
                    quantity: dec!(3),
                },
                None,
            )
            .await
            .unwrap();
        assert!(sold.wallet.holdings.is_empty());
        assert_eq!(sold.wallet.cash_balance, dec!(10));

        let log = f.ledger.list_transactions(user_id, 10, 0).await.unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].wallet_version, 3);
        assert_eq!(log[0].balance_after, dec!(10));

        f.coins.delete_coin(coin.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_deposits_all_land() {
        let pool = setup_test_db().await;
        let f = Arc::new(fixture(&pool, 50));
        let user_id = new_user(&f.users).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = f.clone();
                tokio::spawn(async move {
                    f.ledger
                        .execute(user_id, LedgerRequest::Deposit { amount: dec!(1.25) }, None)
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let wallet = f.ledger.get_wallet(user_id).await.unwrap();
        assert_eq!(wallet.cash_balance, dec!(10.00));
        assert_eq!(wallet.version, 8);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_lost_version_race_gives_up_after_retries() {
        let pool = setup_test_db().await;
        let f = Arc::new(fixture(&pool, 1));
        let user_id = new_user(&f.users).await;

        // Move the version under a held row lock so the deposit reads the old
        // version, blocks on its UPDATE, then matches nothing.
        let mut blocker = pool.begin().await.unwrap();
        sqlx::query("UPDATE wallets SET version = version + 1 WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *blocker)
            .await
            .unwrap();

        let deposit = {
            let f = f.clone();
            tokio::spawn(async move {
                f.ledger
                    .execute(user_id, LedgerRequest::Deposit { amount: dec!(5) }, None)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(300)).await;
        blocker.commit().await.unwrap();

        let err = deposit.await.unwrap().unwrap_err();
        assert!(matches!(err, LedgerError::ConcurrentModification));

        let wallet = f.ledger.get_wallet(user_id).await.unwrap();
        assert_eq!(wallet.cash_balance, dec!(0));
        assert_eq!(wallet.version, 1);
        assert!(f.ledger.list_transactions(user_id, 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_requests_with_same_key_apply_once() {
        let pool = setup_test_db().await;
        let f = Arc::new(fixture(&pool, 50));
        let user_id = new_user(&f.users).await;

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let f = f.clone();
                tokio::spawn(async move {
                    f.ledger
                        .execute(
                            user_id,
                            LedgerRequest::Deposit { amount: dec!(40) },
                            Some("payday".to_string()),
                        )
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(results.iter().filter(|r| !r.replayed).count(), 1);
        let tx_id = results[0].transaction.id;
        assert!(results.iter().all(|r| r.transaction.id == tx_id));

        let wallet = f.ledger.get_wallet(user_id).await.unwrap();
        assert_eq!(wallet.cash_balance, dec!(40));
        assert_eq!(wallet.version, 1);
        assert_eq!(f.ledger.list_transactions(user_id, 10, 0).await.unwrap().len(), 1);
    }
}
