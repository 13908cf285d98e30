//! Market service: cached quotes on top of a `PriceSource`

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use super::model::{AssetQuote, HistoryInterval, PricePoint};
use super::{MarketError, PriceSource};

/// Upper bound on the page size forwarded upstream
pub const MAX_LIST_LIMIT: u32 = 2000;

#[derive(Debug, Clone)]
struct CachedQuote {
    quote: AssetQuote,
    fetched_at: Instant,
}

/// Quote lookups with a per-asset TTL cache
#[derive(Clone)]
pub struct MarketService {
    source: Arc<dyn PriceSource>,
    cache: Arc<RwLock<HashMap<String, CachedQuote>>>,
    ttl: Duration,
}

impl MarketService {
    pub fn new(source: Arc<dyn PriceSource>, ttl: Duration) -> Self {
        Self {
            source,
            cache: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    async fn cached(&self, asset_id: &str) -> Option<AssetQuote> {
        let cache = self.cache.read().await;
        cache
            .get(asset_id)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.quote.clone())
    }

    async fn store(&self, quotes: &[AssetQuote]) {
        let now = Instant::now();
        let mut cache = self.cache.write().await;
        for quote in quotes {
            cache.insert(
                quote.id.clone(),
                CachedQuote {
                    quote: quote.clone(),
                    fetched_at: now,
                },
            );
        }
    }

    /// Current quote for one asset; served from cache while fresh
    pub async fn quote(&self, asset_id: &str) -> Result<AssetQuote, MarketError> {
        if let Some(quote) = self.cached(asset_id).await {
            return Ok(quote);
        }

        let quote = self.source.get_asset(asset_id).await?;
        tracing::debug!(asset_id, price_usd = %quote.price_usd, "Fetched quote");
        self.store(std::slice::from_ref(&quote)).await;
        Ok(quote)
    }

    /// Quotes for several assets. Fresh cache hits are reused and the rest are
    /// fetched in one request. Assets upstream doesn't know are left out.
    pub async fn quotes(&self, asset_ids: &[String]) -> Result<HashMap<String, AssetQuote>, MarketError> {
        let mut found = HashMap::new();
        let mut missing = Vec::new();

        for id in asset_ids {
            match self.cached(id).await {
                Some(quote) => {
                    found.insert(id.clone(), quote);
                }
                None if !missing.contains(id) => missing.push(id.clone()),
                None => {}
            }
        }

        if !missing.is_empty() {
            let fetched = self
                .source
                .list_assets(Some(&missing), Some(missing.len() as u32))
                .await?;
            self.store(&fetched).await;
            found.extend(fetched.into_iter().map(|q| (q.id.clone(), q)));
        }

        Ok(found)
    }

    /// Market listing passthrough; results refresh the cache
    pub async fn list_assets(
        &self,
        ids: Option<&[String]>,
        limit: Option<u32>,
    ) -> Result<Vec<AssetQuote>, MarketError> {
        let limit = limit.map(|l| l.clamp(1, MAX_LIST_LIMIT));
        let quotes = self.source.list_assets(ids, limit).await?;
        self.store(&quotes).await;
        Ok(quotes)
    }

    pub async fn history(
        &self,
        asset_id: &str,
        interval: HistoryInterval,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PricePoint>, MarketError> {
        if start_ms >= end_ms {
            return Err(MarketError::InvalidRange);
        }
        self.source.history(asset_id, interval, start_ms, end_ms).await
    }

    /// Drop every cached quote
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }
}
