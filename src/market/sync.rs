use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

use crate::coins::{CoinError, CoinService};
use crate::websocket::{HubEvent, WsState};

use super::{MarketError, MarketService};

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Coins(#[from] CoinError),
}

/// Keeps `live` coins in step with the market API and pushes price ticks
#[derive(Clone)]
pub struct PriceSync {
    coins: CoinService,
    market: MarketService,
    ws_state: WsState,
    interval: Duration,
}

impl PriceSync {
    pub fn new(
        coins: CoinService,
        market: MarketService,
        ws_state: WsState,
        interval: Duration,
    ) -> Self {
        Self {
            coins,
            market,
            ws_state,
            interval,
        }
    }

    /// Spawn the polling loop. A zero interval leaves sync disabled.
    pub fn start(&self) {
        if self.interval.is_zero() {
            tracing::info!("Market price sync disabled");
            return;
        }

        tracing::info!(interval_secs = self.interval.as_secs(), "Starting market price sync");
        let sync = self.clone();
        tokio::spawn(async move {
            sync.run().await;
        });
    }

    async fn run(&self) {
        loop {
            match self.sync_once().await {
                Ok(updated) => tracing::debug!(updated, "Price sync pass complete"),
                Err(e) => {
                    tracing::error!(error = %e, "Price sync pass failed");
                    sleep(ERROR_BACKOFF).await;
                }
            }
            sleep(self.interval).await;
        }
    }

    /// One pass over every live coin. Returns how many rows were refreshed.
    pub async fn sync_once(&self) -> Result<usize, SyncError> {
        let live = self.coins.list_live().await?;
        if live.is_empty() {
            return Ok(0);
        }

        let asset_ids: Vec<String> = live.iter().map(|c| c.asset_id.clone()).collect();
        self.market.invalidate().await;
        let quotes = self.market.quotes(&asset_ids).await?;

        let mut updated = 0;
        for coin in &live {
            let Some(quote) = quotes.get(&coin.asset_id) else {
                tracing::warn!(asset_id = %coin.asset_id, "No market quote for live coin");
                continue;
            };

            match self.coins.upsert_live(quote).await {
                Ok(Some(refreshed)) => {
                    updated += 1;
                    self.ws_state.broadcast_event(HubEvent::PriceTick {
                        coin_id: refreshed.id,
                        asset_id: refreshed.asset_id,
                        price_usd: refreshed.price_usd,
                        change_percent_24h: refreshed.change_percent_24h,
                    });
                }
                Ok(None) => {
                    tracing::warn!(asset_id = %coin.asset_id, "Coin became manual during sync, skipped");
                }
                Err(e) => {
                    tracing::error!(asset_id = %coin.asset_id, error = %e, "Failed to refresh live coin");
                }
            }
        }

        Ok(updated)
    }
}
