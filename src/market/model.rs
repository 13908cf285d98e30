//! Market data types
//!
//! CoinCap sends every numeric field as a JSON string (or null), so the wire
//! structs keep them as strings and conversion into the public types parses
//! them into `Decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::MarketError;

/// Current market snapshot for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuote {
    /// CoinCap asset id, e.g. `bitcoin`
    pub id: String,
    pub rank: Option<i32>,
    pub symbol: String,
    pub name: String,
    pub supply: Option<Decimal>,
    pub market_cap_usd: Option<Decimal>,
    pub volume_usd_24h: Option<Decimal>,
    pub price_usd: Decimal,
    pub change_percent_24h: Option<Decimal>,
}

/// One point on a price history chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub price_usd: Decimal,
    /// Unix time in milliseconds
    pub time: i64,
    pub date: Option<String>,
}

/// Candle width accepted by the history endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryInterval {
    M1,
    M5,
    M15,
    M30,
    H1,
    H2,
    H6,
    H12,
    #[default]
    D1,
}

impl HistoryInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryInterval::M1 => "m1",
            HistoryInterval::M5 => "m5",
            HistoryInterval::M15 => "m15",
            HistoryInterval::M30 => "m30",
            HistoryInterval::H1 => "h1",
            HistoryInterval::H2 => "h2",
            HistoryInterval::H6 => "h6",
            HistoryInterval::H12 => "h12",
            HistoryInterval::D1 => "d1",
        }
    }
}

impl FromStr for HistoryInterval {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m1" => Ok(HistoryInterval::M1),
            "m5" => Ok(HistoryInterval::M5),
            "m15" => Ok(HistoryInterval::M15),
            "m30" => Ok(HistoryInterval::M30),
            "h1" => Ok(HistoryInterval::H1),
            "h2" => Ok(HistoryInterval::H2),
            "h6" => Ok(HistoryInterval::H6),
            "h12" => Ok(HistoryInterval::H12),
            "d1" => Ok(HistoryInterval::D1),
            other => Err(MarketError::InvalidInterval(other.to_string())),
        }
    }
}

// ============================================================================
// Wire format
// ============================================================================

/// `{"data": ...}` wrapper around every CoinCap response
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawAsset {
    pub id: String,
    pub rank: Option<String>,
    pub symbol: String,
    pub name: String,
    pub supply: Option<String>,
    pub market_cap_usd: Option<String>,
    #[serde(rename = "volumeUsd24Hr")]
    pub volume_usd_24h: Option<String>,
    pub price_usd: Option<String>,
    #[serde(rename = "changePercent24Hr")]
    pub change_percent_24h: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPricePoint {
    pub price_usd: String,
    pub time: i64,
    pub date: Option<String>,
}

/// Parse a CoinCap numeric string. Plain and scientific notation are accepted.
pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, MarketError> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map(|d| d.normalize())
        .map_err(|_| MarketError::Decode(format!("{field}: '{raw}' is not a number")))
}

fn parse_optional(field: &str, raw: Option<String>) -> Result<Option<Decimal>, MarketError> {
    raw.map(|v| parse_decimal(field, &v)).transpose()
}

impl TryFrom<RawAsset> for AssetQuote {
    type Error = MarketError;

    fn try_from(raw: RawAsset) -> Result<Self, Self::Error> {
        let price = raw
            .price_usd
            .ok_or_else(|| MarketError::Decode(format!("{}: missing priceUsd", raw.id)))?;

        Ok(AssetQuote {
            rank: raw.rank.and_then(|r| r.trim().parse().ok()),
            supply: parse_optional("supply", raw.supply)?,
            market_cap_usd: parse_optional("marketCapUsd", raw.market_cap_usd)?,
            volume_usd_24h: parse_optional("volumeUsd24Hr", raw.volume_usd_24h)?,
            price_usd: parse_decimal("priceUsd", &price)?,
            change_percent_24h: parse_optional("changePercent24Hr", raw.change_percent_24h)?,
            id: raw.id,
            symbol: raw.symbol,
            name: raw.name,
        })
    }
}

impl TryFrom<RawPricePoint> for PricePoint {
    type Error = MarketError;

    fn try_from(raw: RawPricePoint) -> Result<Self, Self::Error> {
        Ok(PricePoint {
            price_usd: parse_decimal("priceUsd", &raw.price_usd)?,
            time: raw.time,
            date: raw.date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_raw_asset_conversion() {
        let raw: RawAsset = serde_json::from_value(serde_json::json!({
            "id": "bitcoin",
            "rank": "1",
            "symbol": "BTC",
            "name": "Bitcoin",
            "supply": "19700000.0000000000000000",
            "maxSupply": "21000000.0000000000000000",
            "marketCapUsd": "1323456789012.3456",
            "volumeUsd24Hr": null,
            "priceUsd": "67180.1234567890",
            "changePercent24Hr": "-1.25",
            "vwap24Hr": "67000.1"
        }))
        .unwrap();

        let quote = AssetQuote::try_from(raw).unwrap();
        assert_eq!(quote.rank, Some(1));
        assert_eq!(quote.price_usd, dec!(67180.123456789));
        assert_eq!(quote.volume_usd_24h, None);
        assert_eq!(quote.change_percent_24h, Some(dec!(-1.25)));
    }

    #[test]
    fn test_missing_price_is_decode_error() {
        let raw: RawAsset = serde_json::from_value(serde_json::json!({
            "id": "ghost",
            "symbol": "GST",
            "name": "Ghost",
            "priceUsd": null
        }))
        .unwrap();

        assert!(matches!(
            AssetQuote::try_from(raw),
            Err(MarketError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_decimal_scientific() {
        assert_eq!(parse_decimal("p", "1.5e-7").unwrap(), dec!(0.00000015));
        assert!(parse_decimal("p", "abc").is_err());
    }

    #[test]
    fn test_history_interval_parse() {
        assert_eq!("h12".parse::<HistoryInterval>().unwrap(), HistoryInterval::H12);
        assert_eq!(HistoryInterval::default().as_str(), "d1");
        assert!("w1".parse::<HistoryInterval>().is_err());
    }
}
