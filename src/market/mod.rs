//! Market data: external prices, history and the live-coin sync loop

mod client;
pub mod model;
mod service;
mod sync;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ApiError;

pub use client::CoinCapClient;
pub use model::{AssetQuote, HistoryInterval, PricePoint};
pub use service::{MarketService, MAX_LIST_LIMIT};
pub use sync::{PriceSync, SyncError};

/// Market data errors
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Invalid history interval: {0}")]
    InvalidInterval(String),

    #[error("History start must be before end")]
    InvalidRange,

    #[error("Market API rate limit reached")]
    RateLimited,

    #[error("Market API returned status {0}")]
    Upstream(u16),

    #[error("Market API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected market API payload: {0}")]
    Decode(String),

    #[error("Invalid market API base URL: {0}")]
    BaseUrl(String),
}

impl From<MarketError> for ApiError {
    fn from(e: MarketError) -> Self {
        match e {
            MarketError::UnknownAsset(_) => ApiError::NotFound(e.to_string()),
            MarketError::InvalidInterval(_) | MarketError::InvalidRange => {
                ApiError::BadRequest(e.to_string())
            }
            MarketError::RateLimited => ApiError::ServiceUnavailable(e.to_string()),
            MarketError::Upstream(_) | MarketError::Http(_) | MarketError::Decode(_) => {
                ApiError::ExternalServiceError(e.to_string())
            }
            MarketError::BaseUrl(_) => ApiError::InternalError(e.to_string()),
        }
    }
}

/// Anything that can answer price questions. `CoinCapClient` in production,
/// fakes in tests.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current quotes, optionally restricted to `ids`
    async fn list_assets(
        &self,
        ids: Option<&[String]>,
        limit: Option<u32>,
    ) -> Result<Vec<AssetQuote>, MarketError>;

    async fn get_asset(&self, id: &str) -> Result<AssetQuote, MarketError>;

    /// Price points between two unix-millisecond instants
    async fn history(
        &self,
        id: &str,
        interval: HistoryInterval,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PricePoint>, MarketError>;
}
