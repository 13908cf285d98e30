//! CoinCap REST client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::model::{AssetQuote, Envelope, HistoryInterval, PricePoint, RawAsset, RawPricePoint};
use super::{MarketError, PriceSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the CoinCap v2 API (or anything serving the same shape)
#[derive(Clone)]
pub struct CoinCapClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl CoinCapClient {
    pub fn new(base_url: impl AsRef<str>, api_key: Option<String>) -> Result<Self, MarketError> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| MarketError::BaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(MarketError::BaseUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("coinfolio-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// GET `base_url/segments...`. Each segment is percent-encoded on its own,
    /// so an id cannot add path levels or a query string.
    fn get(&self, segments: &[&str]) -> Result<RequestBuilder, MarketError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MarketError::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);

        let request = self
            .client
            .get(url)
            .header("Accept", "application/json");

        Ok(match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        })
    }

    /// Send, map status codes, and unwrap the `data` envelope
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        asset_id: Option<&str>,
    ) -> Result<T, MarketError> {
        let response = request.send().await?;
        let status = response.status();

        match status {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(MarketError::UnknownAsset(
                    asset_id.unwrap_or_default().to_string(),
                ))
            }
            StatusCode::TOO_MANY_REQUESTS => return Err(MarketError::RateLimited),
            s => return Err(MarketError::Upstream(s.as_u16())),
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| MarketError::Decode(e.to_string()))?;

        Ok(envelope.data)
    }
}

#[async_trait]
impl PriceSource for CoinCapClient {
    async fn list_assets(
        &self,
        ids: Option<&[String]>,
        limit: Option<u32>,
    ) -> Result<Vec<AssetQuote>, MarketError> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(ids) = ids.filter(|ids| !ids.is_empty()) {
            query.push(("ids", ids.join(",")));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        let raw: Vec<RawAsset> = self.fetch(self.get(&["assets"])?.query(&query), None).await?;
        raw.into_iter().map(AssetQuote::try_from).collect()
    }

    async fn get_asset(&self, id: &str) -> Result<AssetQuote, MarketError> {
        check_asset_id(id)?;
        let raw: Option<RawAsset> = self.fetch(self.get(&["assets", id])?, Some(id)).await?;

        raw.ok_or_else(|| MarketError::UnknownAsset(id.to_string()))?
            .try_into()
    }

    async fn history(
        &self,
        id: &str,
        interval: HistoryInterval,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PricePoint>, MarketError> {
        check_asset_id(id)?;
        let request = self.get(&["assets", id, "history"])?.query(&[
            ("interval", interval.as_str().to_string()),
            ("start", start_ms.to_string()),
            ("end", end_ms.to_string()),
        ]);

        let raw: Vec<RawPricePoint> = self.fetch(request, Some(id)).await?;
        raw.into_iter().map(PricePoint::try_from).collect()
    }
}

/// CoinCap ids are slugs like `bitcoin` or `usd-coin`
fn check_asset_id(id: &str) -> Result<(), MarketError> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MarketError::UnknownAsset(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_asset_id() {
        assert!(check_asset_id("bitcoin").is_ok());
        assert!(check_asset_id("usd-coin").is_ok());
        for bad in ["", "..", "bitcoin/history", "btc?limit=1", "a b", "%2e%2e"] {
            assert!(
                matches!(check_asset_id(bad), Err(MarketError::UnknownAsset(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn test_base_url_path_is_kept() {
        let client = CoinCapClient::new("https://api.coincap.io/v2/", None).unwrap();
        let request = client.get(&["assets", "bitcoin"]).unwrap().build().unwrap();
        assert_eq!(request.url().as_str(), "https://api.coincap.io/v2/assets/bitcoin");

        assert!(matches!(
            CoinCapClient::new("not a url", None),
            Err(MarketError::BaseUrl(_))
        ));
    }
}
