//! CoinCap client against a mock HTTP server

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coinfolio_server::market::{
    CoinCapClient, HistoryInterval, MarketError, MarketService, PriceSource,
};

fn bitcoin() -> serde_json::Value {
    json!({
        "id": "bitcoin",
        "rank": "1",
        "symbol": "BTC",
        "name": "Bitcoin",
        "supply": "19700000.0000000000000000",
        "maxSupply": "21000000.0000000000000000",
        "marketCapUsd": "1323456789012.3456000000000000",
        "volumeUsd24Hr": "12345678901.2345678900000000",
        "priceUsd": "67180.1234567890123456",
        "changePercent24Hr": "2.5012345678901234",
        "vwap24Hr": "66900.1"
    })
}

fn ethereum() -> serde_json::Value {
    json!({
        "id": "ethereum",
        "rank": "2",
        "symbol": "ETH",
        "name": "Ethereum",
        "supply": "120000000",
        "maxSupply": null,
        "marketCapUsd": "420000000000",
        "volumeUsd24Hr": "9000000000",
        "priceUsd": "3500.5",
        "changePercent24Hr": "-0.75",
        "vwap24Hr": null
    })
}

#[tokio::test]
async fn test_list_assets_passes_ids_and_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets"))
        .and(query_param("ids", "bitcoin,ethereum"))
        .and(query_param("limit", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [bitcoin(), ethereum()], "timestamp": 1 })),
        )
        .mount(&mock_server)
        .await;

    let client = CoinCapClient::new(mock_server.uri(), None).unwrap();
    let ids = vec!["bitcoin".to_string(), "ethereum".to_string()];
    let assets = client.list_assets(Some(&ids), Some(2)).await.unwrap();

    assert_eq!(assets.len(), 2);
    assert_eq!(assets[0].symbol, "BTC");
    assert_eq!(assets[1].price_usd, dec!(3500.5));
    assert_eq!(assets[1].change_percent_24h, Some(dec!(-0.75)));
}

#[tokio::test]
async fn test_get_asset_sends_api_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets/bitcoin"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": bitcoin() })))
        .mount(&mock_server)
        .await;

    let client = CoinCapClient::new(mock_server.uri(), Some("test-key".to_string())).unwrap();
    let quote = client.get_asset("bitcoin").await.unwrap();

    assert_eq!(quote.id, "bitcoin");
    assert_eq!(quote.rank, Some(1));
    assert_eq!(quote.supply, Some(dec!(19700000)));
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets/notacoin"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "notacoin not found" })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets/busy"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/assets/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = CoinCapClient::new(mock_server.uri(), None).unwrap();

    assert!(matches!(
        client.get_asset("notacoin").await,
        Err(MarketError::UnknownAsset(id)) if id == "notacoin"
    ));
    assert!(matches!(
        client.get_asset("busy").await,
        Err(MarketError::RateLimited)
    ));
    assert!(matches!(
        client.get_asset("broken").await,
        Err(MarketError::Upstream(503))
    ));
    assert!(matches!(
        client.get_asset("garbled").await,
        Err(MarketError::Decode(_))
    ));
}

#[tokio::test]
async fn test_history_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets/ethereum/history"))
        .and(query_param("interval", "h1"))
        .and(query_param("start", "1700000000000"))
        .and(query_param("end", "1700007200000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "priceUsd": "2010.55", "time": 1700000000000i64, "date": "2023-11-14T22:00:00.000Z" },
                { "priceUsd": "2012.1", "time": 1700003600000i64, "date": "2023-11-14T23:00:00.000Z" }
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = CoinCapClient::new(mock_server.uri(), None).unwrap();
    let points = client
        .history("ethereum", HistoryInterval::H1, 1_700_000_000_000, 1_700_007_200_000)
        .await
        .unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].price_usd, dec!(2010.55));
    assert_eq!(points[1].time, 1_700_003_600_000);
}

#[tokio::test]
async fn test_market_service_serves_repeat_quotes_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/assets/bitcoin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": bitcoin() })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CoinCapClient::new(mock_server.uri(), None).unwrap();
    let market = MarketService::new(Arc::new(client), Duration::from_secs(60));

    let first = market.quote("bitcoin").await.unwrap();
    let second = market.quote("bitcoin").await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_malformed_asset_ids_never_reach_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": bitcoin() })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = CoinCapClient::new(mock_server.uri(), None).unwrap();

    for id in ["bitcoin/history", "bitcoin?limit=1", ".."] {
        assert!(matches!(
            client.get_asset(id).await,
            Err(MarketError::UnknownAsset(_))
        ));
    }
    assert!(matches!(
        client
            .history("../assets", HistoryInterval::D1, 0, 1)
            .await,
        Err(MarketError::UnknownAsset(_))
    ));
}
