//! Coin service - catalogue CRUD and live price upserts

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::market::AssetQuote;

use super::model::{slugify_asset_id, Coin, CoinSource, CreateCoinRequest, UpdateCoinRequest};

const COIN_COLUMNS: &str = "id, asset_id, name, symbol, price_usd, market_cap_usd, volume_usd_24h, \
                            change_percent_24h, supply, rank, source, created_at, updated_at";

/// Stored prices keep 8 decimal places
pub const PRICE_SCALE: u32 = 8;

/// Coin service errors
#[derive(Error, Debug)]
pub enum CoinError {
    #[error("Please fill in all fields")]
    MissingFields(Vec<String>),

    #[error("Price must be greater than zero")]
    InvalidPrice,

    #[error("Coin not found")]
    NotFound,

    #[error("A coin with asset id '{0}' already exists")]
    AssetIdTaken(String),

    #[error("Coin is held in at least one wallet")]
    InUse,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<CoinError> for ApiError {
    fn from(e: CoinError) -> Self {
        match e {
            CoinError::MissingFields(fields) => ApiError::MissingFields(fields),
            CoinError::InvalidPrice => ApiError::ValidationError(e.to_string()),
            CoinError::NotFound => ApiError::NotFound(e.to_string()),
            CoinError::AssetIdTaken(_) | CoinError::InUse => ApiError::Conflict(e.to_string()),
            CoinError::Database(err) => err.into(),
        }
    }
}

fn checked_price(price: Decimal) -> Result<Decimal, CoinError> {
    let price = price.round_dp(PRICE_SCALE);
    if price <= Decimal::ZERO {
        return Err(CoinError::InvalidPrice);
    }
    Ok(price)
}

/// Service for the coin catalogue
#[derive(Clone)]
pub struct CoinService {
    db_pool: PgPool,
}

impl CoinService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// All coins, newest first
    pub async fn list_coins(&self) -> Result<Vec<Coin>, CoinError> {
        let coins = sqlx::query_as(&format!(
            "SELECT {COIN_COLUMNS} FROM coins ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db_pool)
        .await?;

        Ok(coins)
    }

    pub async fn list_live(&self) -> Result<Vec<Coin>, CoinError> {
        let coins = sqlx::query_as(&format!(
            "SELECT {COIN_COLUMNS} FROM coins WHERE source = $1 ORDER BY asset_id"
        ))
        .bind(CoinSource::Live)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(coins)
    }

    pub async fn get_coin(&self, id: Uuid) -> Result<Coin, CoinError> {
        sqlx::query_as(&format!("SELECT {COIN_COLUMNS} FROM coins WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or(CoinError::NotFound)
    }

    pub async fn create_coin(&self, req: CreateCoinRequest) -> Result<Coin, CoinError> {
        let empty = req.empty_fields();
        if !empty.is_empty() {
            return Err(CoinError::MissingFields(empty));
        }

        let name = req.name.unwrap_or_default().trim().to_string();
        let symbol = req.symbol.unwrap_or_default().trim().to_uppercase();
        let price_usd = checked_price(req.price_usd.unwrap_or_default())?;
        let asset_id = req
            .asset_id
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| slugify_asset_id(&name));

        let coin: Coin = sqlx::query_as(&format!(
            r#"
            INSERT INTO coins (id, asset_id, name, symbol, price_usd, market_cap_usd, volume_usd_24h,
                               change_percent_24h, supply, rank, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {COIN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&asset_id)
        .bind(&name)
        .bind(&symbol)
        .bind(price_usd)
        .bind(req.market_cap_usd)
        .bind(req.volume_usd_24h)
        .bind(req.change_percent_24h)
        .bind(req.supply)
        .bind(req.rank)
        .bind(req.source)
        .fetch_one(&self.db_pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CoinError::AssetIdTaken(asset_id.clone())
            }
            _ => CoinError::Database(e),
        })?;

        tracing::info!(coin_id = %coin.id, asset_id = %coin.asset_id, "Coin created");
        Ok(coin)
    }

    pub async fn update_coin(&self, id: Uuid, req: UpdateCoinRequest) -> Result<Coin, CoinError> {
        let price_usd = req.price_usd.map(checked_price).transpose()?;

        sqlx::query_as(&format!(
            r#"
            UPDATE coins SET
                name = COALESCE($2, name),
                symbol = COALESCE($3, symbol),
                price_usd = COALESCE($4, price_usd),
                market_cap_usd = COALESCE($5, market_cap_usd),
                volume_usd_24h = COALESCE($6, volume_usd_24h),
                change_percent_24h = COALESCE($7, change_percent_24h),
                supply = COALESCE($8, supply),
                rank = COALESCE($9, rank),
                source = COALESCE($10, source),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COIN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(req.name.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .bind(req.symbol.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()))
        .bind(price_usd)
        .bind(req.market_cap_usd)
        .bind(req.volume_usd_24h)
        .bind(req.change_percent_24h)
        .bind(req.supply)
        .bind(req.rank)
        .bind(req.source)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(CoinError::NotFound)
    }

    /// Delete a coin nobody holds
    pub async fn delete_coin(&self, id: Uuid) -> Result<(), CoinError> {
        let held: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM wallet_holdings WHERE coin_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.db_pool)
        .await?;

        if held {
            return Err(CoinError::InUse);
        }

        // A holding created after the check still trips the RESTRICT foreign key
        let rows = sqlx::query("DELETE FROM coins WHERE id = $1")
            .bind(id)
            .execute(&self.db_pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => CoinError::InUse,
                _ => CoinError::Database(e),
            })?
            .rows_affected();

        if rows == 0 {
            return Err(CoinError::NotFound);
        }

        tracing::info!(coin_id = %id, "Coin deleted");
        Ok(())
    }

    /// Insert or refresh a live coin from a market quote.
    ///
    /// Returns `None` when the asset id belongs to a manual coin, which
    /// market data never overwrites.
    pub async fn upsert_live(&self, quote: &AssetQuote) -> Result<Option<Coin>, CoinError> {
        let price_usd = checked_price(quote.price_usd)?;

        let coin = sqlx::query_as(&format!(
            r#"
            INSERT INTO coins (id, asset_id, name, symbol, price_usd, market_cap_usd, volume_usd_24h,
                               change_percent_24h, supply, rank, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'live')
            ON CONFLICT (asset_id) DO UPDATE SET
                name = EXCLUDED.name,
                symbol = EXCLUDED.symbol,
                price_usd = EXCLUDED.price_usd,
                market_cap_usd = EXCLUDED.market_cap_usd,
                volume_usd_24h = EXCLUDED.volume_usd_24h,
                change_percent_24h = EXCLUDED.change_percent_24h,
                supply = EXCLUDED.supply,
                rank = EXCLUDED.rank,
                updated_at = NOW()
            WHERE coins.source = 'live'
            RETURNING {COIN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&quote.id)
        .bind(&quote.name)
        .bind(&quote.symbol)
        .bind(price_usd)
        .bind(quote.market_cap_usd.map(|d| d.round_dp(2)))
        .bind(quote.volume_usd_24h.map(|d| d.round_dp(2)))
        .bind(quote.change_percent_24h.map(|d| d.round_dp(4)))
        .bind(quote.supply.map(|d| d.round_dp(PRICE_SCALE)))
        .bind(quote.rank)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(coin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use rust_decimal_macros::dec;

    #[test]
    fn test_checked_price() {
        assert_eq!(checked_price(dec!(0.123456789)).unwrap(), dec!(0.12345679));
        assert!(matches!(checked_price(dec!(0)), Err(CoinError::InvalidPrice)));
        assert!(matches!(checked_price(dec!(-1)), Err(CoinError::InvalidPrice)));
        // Rounds away to nothing at 8 places
        assert!(matches!(
            checked_price(dec!(0.000000001)),
            Err(CoinError::InvalidPrice)
        ));
    }

    #[test]
    fn test_coin_error_mapping() {
        assert_eq!(
            ApiError::from(CoinError::InUse).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(CoinError::AssetIdTaken("btc".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(CoinError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CoinError::MissingFields(vec!["name".into()])).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
