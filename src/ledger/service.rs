//! Ledger service - persistence, idempotency and optimistic concurrency

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::coins::{CoinError, CoinService, CoinSource, PRICE_SCALE};
use crate::market::MarketService;
use crate::websocket::{HubEvent, WsState};

use super::model::{
    CoinRef, ExecuteResponse, Holding, LedgerOp, LedgerRequest, PortfolioSummary,
    WalletState, WalletTransaction,
};
use super::LedgerError;

const TX_COLUMNS: &str = "id, user_id, kind, coin_id, coin_name, quantity, price_usd, cash_delta, \
                          balance_after, wallet_version, idempotency_key, request_fingerprint, created_at";

const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Service owning every wallet mutation
#[derive(Clone)]
pub struct LedgerService {
    db_pool: PgPool,
    coins: CoinService,
    market: MarketService,
    ws_state: WsState,
    max_retries: u32,
}

impl LedgerService {
    pub fn new(
        db_pool: PgPool,
        coins: CoinService,
        market: MarketService,
        ws_state: WsState,
        max_retries: u32,
    ) -> Self {
        Self {
            db_pool,
            coins,
            market,
            ws_state,
            max_retries: max_retries.max(1),
        }
    }

    /// Create an empty wallet. Returns the existing one (and `false`) when present.
    pub async fn create_wallet(&self, user_id: Uuid) -> Result<(WalletState, bool), LedgerError> {
        let created = sqlx::query(
            "INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&self.db_pool)
        .await?
        .rows_affected()
            > 0;

        if created {
            tracing::info!(user_id = %user_id, "Wallet created");
        }

        Ok((self.get_wallet(user_id).await?, created))
    }

    pub async fn get_wallet(&self, user_id: Uuid) -> Result<WalletState, LedgerError> {
        let mut conn = self.db_pool.acquire().await?;
        load_wallet(&mut conn, user_id)
            .await?
            .ok_or(LedgerError::WalletNotFound)
    }

    /// Every wallet with its holdings, newest first
    pub async fn list_wallets(&self) -> Result<Vec<WalletState>, LedgerError> {
        let wallets: Vec<(Uuid, Decimal, i64)> = sqlx::query_as(
            "SELECT user_id, cash_balance, version FROM wallets ORDER BY created_at DESC",
        )
        .fetch_all(&self.db_pool)
        .await?;

        let rows: Vec<(Uuid, Uuid, String, Decimal)> = sqlx::query_as(
            "SELECT user_id, coin_id, coin_name, amount FROM wallet_holdings ORDER BY coin_name",
        )
        .fetch_all(&self.db_pool)
        .await?;

        let mut holdings: HashMap<Uuid, Vec<Holding>> = HashMap::new();
        for (user_id, coin_id, coin_name, amount) in rows {
            holdings.entry(user_id).or_default().push(Holding {
                coin_id,
                coin_name,
                amount,
            });
        }

        Ok(wallets
            .into_iter()
            .map(|(user_id, cash_balance, version)| WalletState {
                user_id,
                cash_balance,
                holdings: holdings.remove(&user_id).unwrap_or_default(),
                version,
            })
            .collect())
    }

    /// Remove a wallet together with its holdings and audit log
    pub async fn delete_wallet(&self, user_id: Uuid) -> Result<(), LedgerError> {
        let rows = sqlx::query("DELETE FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(LedgerError::WalletNotFound);
        }

        tracing::info!(user_id = %user_id, "Wallet deleted");
        Ok(())
    }

    /// Apply one balance change.
    ///
    /// With an idempotency key, a repeat of the same request returns the
    /// recorded result instead of running again.
    pub async fn execute(
        &self,
        user_id: Uuid,
        request: LedgerRequest,
        idempotency_key: Option<String>,
    ) -> Result<ExecuteResponse, LedgerError> {
        let idempotency_key = idempotency_key.map(check_idempotency_key).transpose()?;
        let fingerprint = request.fingerprint();

        if let Some(key) = &idempotency_key {
            if let Some(replay) = self.replay(user_id, key, &fingerprint).await? {
                return Ok(replay);
            }
        }

        let op = self.price(&request).await?;

        for attempt in 1..=self.max_retries {
            let mut tx = self.db_pool.begin().await?;

            let mut wallet = load_wallet(&mut tx, user_id)
                .await?
                .ok_or(LedgerError::WalletNotFound)?;
            let expected_version = wallet.version;
            let outcome = wallet.apply(&op)?;

            let updated = sqlx::query(
                r#"
                UPDATE wallets
                SET cash_balance = $1, version = $2, updated_at = NOW()
                WHERE user_id = $3 AND version = $4
                "#,
            )
            .bind(wallet.cash_balance)
            .bind(wallet.version)
            .bind(user_id)
            .bind(expected_version)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                tx.rollback().await?;
                tracing::debug!(
                    user_id = %user_id,
                    attempt,
                    expected_version,
                    "Wallet version moved, retrying"
                );
                tokio::time::sleep(Duration::from_millis(5 * attempt as u64)).await;
                continue;
            }

            if let Some(coin_id) = outcome.coin_id {
                write_holding(&mut tx, user_id, coin_id, wallet.holding(coin_id)).await?;
            }

            let inserted = sqlx::query_as::<_, WalletTransaction>(&format!(
                r#"
                INSERT INTO wallet_transactions (id, user_id, kind, coin_id, coin_name, quantity, price_usd,
                                                 cash_delta, balance_after, wallet_version,
                                                 idempotency_key, request_fingerprint)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING {TX_COLUMNS}
                "#
            ))
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(outcome.kind)
            .bind(outcome.coin_id)
            .bind(&outcome.coin_name)
            .bind(outcome.quantity)
            .bind(outcome.price)
            .bind(outcome.cash_delta)
            .bind(outcome.balance_after)
            .bind(outcome.version)
            .bind(&idempotency_key)
            .bind(&fingerprint)
            .fetch_one(&mut *tx)
            .await;

            let transaction = match inserted {
                Ok(row) => row,
                // Another request with the same key committed first
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    tx.rollback().await?;
                    let key = idempotency_key.as_deref().unwrap_or_default();
                    return self
                        .replay(user_id, key, &fingerprint)
                        .await?
                        .ok_or(LedgerError::ConcurrentModification);
                }
                Err(e) => return Err(e.into()),
            };

            tx.commit().await?;

            tracing::info!(
                user_id = %user_id,
                kind = outcome.kind.as_str(),
                coin_id = ?outcome.coin_id,
                cash_delta = %outcome.cash_delta,
                version = outcome.version,
                "Ledger entry committed"
            );

            self.ws_state.broadcast_event(HubEvent::WalletUpdated {
                user_id,
                kind: outcome.kind,
                balance_after: outcome.balance_after,
                version: outcome.version,
            });

            return Ok(ExecuteResponse {
                transaction,
                wallet,
                replayed: false,
            });
        }

        tracing::warn!(
            user_id = %user_id,
            retries = self.max_retries,
            "Giving up on wallet update after repeated version conflicts"
        );
        Err(LedgerError::ConcurrentModification)
    }

    /// Audit log for one user, newest first
    pub async fn list_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletTransaction>, LedgerError> {
        let rows = sqlx::query_as(&format!(
            r#"
            SELECT {TX_COLUMNS} FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, wallet_version DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows)
    }

    /// Wallet valued at current prices
    pub async fn portfolio_summary(&self, user_id: Uuid) -> Result<PortfolioSummary, LedgerError> {
        let wallet = self.get_wallet(user_id).await?;
        let prices = self.current_prices(&wallet.holdings).await?;
        Ok(wallet.summarize(&prices))
    }

    /// Prices for the given holdings: market quotes for live coins, the stored
    /// price for manual ones. Coins the market can't price are left out.
    async fn current_prices(
        &self,
        holdings: &[Holding],
    ) -> Result<HashMap<Uuid, Decimal>, LedgerError> {
        if holdings.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<Uuid> = holdings.iter().map(|h| h.coin_id).collect();
        let coins: Vec<(Uuid, String, Decimal, CoinSource)> = sqlx::query_as(
            "SELECT id, asset_id, price_usd, source FROM coins WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.db_pool)
        .await?;

        let live_ids: Vec<String> = coins
            .iter()
            .filter(|(_, _, _, source)| *source == CoinSource::Live)
            .map(|(_, asset_id, _, _)| asset_id.clone())
            .collect();

        let quotes = if live_ids.is_empty() {
            HashMap::new()
        } else {
            match self.market.quotes(&live_ids).await {
                Ok(quotes) => quotes,
                Err(e) => {
                    tracing::warn!(error = %e, "Market quotes unavailable for portfolio valuation");
                    HashMap::new()
                }
            }
        };

        Ok(coins
            .into_iter()
            .filter_map(|(id, asset_id, price, source)| match source {
                CoinSource::Manual => Some((id, price)),
                CoinSource::Live => quotes
                    .get(&asset_id)
                    .map(|q| (id, q.price_usd.round_dp(PRICE_SCALE))),
            })
            .collect())
    }

    /// Turn a request into a priced op
    async fn price(&self, request: &LedgerRequest) -> Result<LedgerOp, LedgerError> {
        let (coin_id, quantity) = match request {
            LedgerRequest::Deposit { amount } => return Ok(LedgerOp::Deposit { amount: *amount }),
            LedgerRequest::Withdraw { amount } => {
                return Ok(LedgerOp::Withdraw { amount: *amount })
            }
            LedgerRequest::Buy { coin_id, quantity } | LedgerRequest::Sell { coin_id, quantity } => {
                (*coin_id, *quantity)
            }
        };

        let coin = self.coins.get_coin(coin_id).await.map_err(|e| match e {
            CoinError::NotFound => LedgerError::CoinNotFound,
            CoinError::Database(err) => LedgerError::Database(err),
            other => LedgerError::InvalidAmount(other.to_string()),
        })?;

        let price = match coin.source {
            CoinSource::Live => self
                .market
                .quote(&coin.asset_id)
                .await?
                .price_usd
                .round_dp(PRICE_SCALE),
            CoinSource::Manual => coin.price_usd,
        };

        let coin = CoinRef {
            id: coin.id,
            name: coin.name,
        };

        Ok(match request {
            LedgerRequest::Sell { .. } => LedgerOp::Sell {
                coin,
                quantity,
                price,
            },
            _ => LedgerOp::Buy {
                coin,
                quantity,
                price,
            },
        })
    }

    async fn replay(
        &self,
        user_id: Uuid,
        key: &str,
        fingerprint: &str,
    ) -> Result<Option<ExecuteResponse>, LedgerError> {
        let recorded: Option<WalletTransaction> = sqlx::query_as(&format!(
            "SELECT {TX_COLUMNS} FROM wallet_transactions WHERE user_id = $1 AND idempotency_key = $2"
        ))
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.db_pool)
        .await?;

        let Some(transaction) = recorded else {
            return Ok(None);
        };

        if transaction.request_fingerprint.as_deref() != Some(fingerprint) {
            return Err(LedgerError::IdempotencyConflict);
        }

        tracing::info!(user_id = %user_id, transaction_id = %transaction.id, "Replaying idempotent request");

        Ok(Some(ExecuteResponse {
            transaction,
            wallet: self.get_wallet(user_id).await?,
            replayed: true,
        }))
    }
}

fn check_idempotency_key(key: String) -> Result<String, LedgerError> {
    let key = key.trim().to_string();
    if key.is_empty()
        || key.len() > MAX_IDEMPOTENCY_KEY_LEN
        || key.chars().any(|c| c.is_control())
    {
        return Err(LedgerError::InvalidIdempotencyKey);
    }
    Ok(key)
}

async fn load_wallet(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Option<WalletState>, sqlx::Error> {
    let row: Option<(Decimal, i64)> =
        sqlx::query_as("SELECT cash_balance, version FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

    let Some((cash_balance, version)) = row else {
        return Ok(None);
    };

    let holdings = sqlx::query_as::<_, Holding>(
        "SELECT coin_id, coin_name, amount FROM wallet_holdings WHERE user_id = $1 ORDER BY coin_name",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(WalletState {
        user_id,
        cash_balance,
        holdings,
        version,
    }))
}

/// Persist one coin position after a trade: upsert when held, delete at zero
async fn write_holding(
    conn: &mut PgConnection,
    user_id: Uuid,
    coin_id: Uuid,
    holding: Option<&Holding>,
) -> Result<(), sqlx::Error> {
    match holding {
        Some(h) => {
            sqlx::query(
                r#"
                INSERT INTO wallet_holdings (user_id, coin_id, coin_name, amount)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id, coin_id) DO UPDATE SET amount = EXCLUDED.amount
                "#,
            )
            .bind(user_id)
            .bind(coin_id)
            .bind(&h.coin_name)
            .bind(h.amount)
            .execute(conn)
            .await?;
        }
        None => {
            sqlx::query("DELETE FROM wallet_holdings WHERE user_id = $1 AND coin_id = $2")
                .bind(user_id)
                .bind(coin_id)
                .execute(conn)
                .await?;
        }
    }
    Ok(())
}
