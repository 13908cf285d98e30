//! Coin catalogue models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Where a coin's price comes from
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Default)]
#[sqlx(type_name = "coin_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CoinSource {
    /// Refreshed from the market API
    Live,
    /// Entered by an admin
    #[default]
    Manual,
}

/// Coin record
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub id: Uuid,
    pub asset_id: String,
    pub name: String,
    pub symbol: String,
    pub price_usd: Decimal,
    pub market_cap_usd: Option<Decimal>,
    pub volume_usd_24h: Option<Decimal>,
    pub change_percent_24h: Option<Decimal>,
    pub supply: Option<Decimal>,
    pub rank: Option<i32>,
    pub source: CoinSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Body for POST /api/coins
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCoinRequest {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub price_usd: Option<Decimal>,
    pub asset_id: Option<String>,
    pub market_cap_usd: Option<Decimal>,
    pub volume_usd_24h: Option<Decimal>,
    pub change_percent_24h: Option<Decimal>,
    pub supply: Option<Decimal>,
    pub rank: Option<i32>,
    #[serde(default)]
    pub source: CoinSource,
}

impl CreateCoinRequest {
    pub fn empty_fields(&self) -> Vec<String> {
        let mut empty = Vec::new();
        if self.name.as_deref().map_or(true, |s| s.trim().is_empty()) {
            empty.push("name".to_string());
        }
        if self.symbol.as_deref().map_or(true, |s| s.trim().is_empty()) {
            empty.push("symbol".to_string());
        }
        if self.price_usd.is_none() {
            empty.push("priceUsd".to_string());
        }
        empty
    }
}

/// Body for PATCH /api/coins/:id
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCoinRequest {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub price_usd: Option<Decimal>,
    pub market_cap_usd: Option<Decimal>,
    pub volume_usd_24h: Option<Decimal>,
    pub change_percent_24h: Option<Decimal>,
    pub supply: Option<Decimal>,
    pub rank: Option<i32>,
    pub source: Option<CoinSource>,
}

/// Default `asset_id` for a manually created coin: lowercase, spaces to dashes
pub fn slugify_asset_id(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
