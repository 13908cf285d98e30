use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::error::ApiError;
use crate::market::{AssetQuote, HistoryInterval, PricePoint};
use crate::state::AppState;

const DEFAULT_HISTORY_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct AssetsQuery {
    /// Comma separated asset ids
    pub ids: Option<String>,
    pub limit: Option<u32>,
}

impl AssetsQuery {
    fn ids(&self) -> Option<Vec<String>> {
        let ids: Vec<String> = self
            .ids
            .as_deref()?
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        (!ids.is_empty()).then_some(ids)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub interval: Option<String>,
    /// Unix milliseconds
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl HistoryQuery {
    /// Missing bounds default to the trailing thirty days at daily candles
    fn resolve(&self) -> Result<(HistoryInterval, i64, i64), ApiError> {
        let interval = match self.interval.as_deref() {
            Some(raw) => raw.parse::<HistoryInterval>()?,
            None => HistoryInterval::default(),
        };
        let end = self.end.unwrap_or_else(|| Utc::now().timestamp_millis());
        let start = self
            .start
            .unwrap_or(end - Duration::days(DEFAULT_HISTORY_DAYS).num_milliseconds());
        Ok((interval, start, end))
    }
}

/// GET /api/market/assets
pub async fn list_assets(
    State(state): State<AppState>,
    Query(query): Query<AssetsQuery>,
) -> Result<Json<Vec<AssetQuote>>, ApiError> {
    let ids = query.ids();
    let assets = state
        .market_service
        .list_assets(ids.as_deref(), query.limit)
        .await?;
    Ok(Json(assets))
}

/// GET /api/market/assets/:id
pub async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AssetQuote>, ApiError> {
    Ok(Json(state.market_service.quote(&id.to_lowercase()).await?))
}

/// GET /api/market/assets/:id/history
pub async fn asset_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PricePoint>>, ApiError> {
    let (interval, start, end) = query.resolve()?;
    let points = state
        .market_service
        .history(&id.to_lowercase(), interval, start, end)
        .await?;
    Ok(Json(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_query_defaults() {
        let (interval, start, end) = HistoryQuery::default().resolve().unwrap();
        assert_eq!(interval, HistoryInterval::D1);
        assert_eq!(end - start, 30 * 24 * 60 * 60 * 1000);
    }

    #[test]
    fn test_history_query_rejects_unknown_interval() {
        let query = HistoryQuery {
            interval: Some("w1".to_string()),
            ..Default::default()
        };
        assert!(query.resolve().is_err());
    }

    #[test]
    fn test_assets_query_splits_ids() {
        let query = AssetsQuery {
            ids: Some("Bitcoin, ethereum,,".to_string()),
            limit: None,
        };
        assert_eq!(
            query.ids(),
            Some(vec!["bitcoin".to_string(), "ethereum".to_string()])
        );
        assert_eq!(AssetsQuery::default().ids(), None);
    }
}
