//! Coin catalogue endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::AdminUser;
use crate::coins::{Coin, CoinError, CreateCoinRequest, UpdateCoinRequest};
use crate::error::ApiError;
use crate::models::MessageResponse;
use crate::state::AppState;

/// GET /api/coins
pub async fn list_coins(State(state): State<AppState>) -> Result<Json<Vec<Coin>>, ApiError> {
    Ok(Json(state.coin_service.list_coins().await?))
}

/// GET /api/coins/:id
pub async fn get_coin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Coin>, ApiError> {
    Ok(Json(state.coin_service.get_coin(id).await?))
}

/// POST /api/coins
pub async fn create_coin(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(req): Json<CreateCoinRequest>,
) -> Result<(StatusCode, Json<Coin>), ApiError> {
    let coin = state.coin_service.create_coin(req).await?;
    Ok((StatusCode::CREATED, Json(coin)))
}

/// POST /api/coins/import/:asset_id
///
/// Creates or refreshes a live coin from the market API. Refused with 409 when
/// the asset id already belongs to a manually priced coin.
pub async fn import_coin(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(asset_id): Path<String>,
) -> Result<Json<Coin>, ApiError> {
    let quote = state.market_service.quote(asset_id.trim()).await?;
    let coin = state
        .coin_service
        .upsert_live(&quote)
        .await?
        .ok_or_else(|| ApiError::from(CoinError::AssetIdTaken(quote.id.clone())))?;

    tracing::info!(coin_id = %coin.id, asset_id = %coin.asset_id, "Live coin imported");
    Ok(Json(coin))
}

/// PATCH /api/coins/:id
pub async fn update_coin(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCoinRequest>,
) -> Result<Json<Coin>, ApiError> {
    Ok(Json(state.coin_service.update_coin(id, req).await?))
}

/// DELETE /api/coins/:id
pub async fn delete_coin(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.coin_service.delete_coin(id).await?;
    Ok(Json(MessageResponse::new("Coin deleted")))
}
