//! Wallet endpoints. Every balance change goes through the ledger.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;

use super::{AdminUser, AuthenticatedUser};
use crate::error::ApiError;
use crate::ledger::{
    CashRequest, ExecuteResponse, LedgerRequest, PortfolioSummary, TradeRequest, WalletState,
    WalletTransaction,
};
use crate::models::{MessageResponse, PaginationParams};
use crate::state::AppState;

const IDEMPOTENCY_KEY: &str = "idempotency-key";

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    headers
        .get(IDEMPOTENCY_KEY)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|_| ApiError::BadRequest("Idempotency-Key must be ASCII".to_string()))
        })
        .transpose()
}

async fn execute(
    state: &AppState,
    user: &AuthenticatedUser,
    headers: &HeaderMap,
    request: LedgerRequest,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let key = idempotency_key(headers)?;
    let response = state
        .ledger_service
        .execute(user.user_id, request, key)
        .await?;
    Ok(Json(response))
}

/// GET /api/wallet
pub async fn get_wallet(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<PortfolioSummary>, ApiError> {
    Ok(Json(
        state.ledger_service.portfolio_summary(user.user_id).await?,
    ))
}

/// POST /api/wallet. 201 when created, 200 when it already existed.
pub async fn create_wallet(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<(StatusCode, Json<WalletState>), ApiError> {
    let (wallet, created) = state.ledger_service.create_wallet(user.user_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(wallet)))
}

/// POST /api/wallet/deposit
pub async fn deposit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CashRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let amount = req.required_amount()?;
    execute(&state, &user, &headers, LedgerRequest::Deposit { amount }).await
}

/// POST /api/wallet/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CashRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let amount = req.required_amount()?;
    execute(&state, &user, &headers, LedgerRequest::Withdraw { amount }).await
}

/// POST /api/wallet/buy
pub async fn buy(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<TradeRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let (coin_id, quantity) = req.required()?;
    execute(&state, &user, &headers, LedgerRequest::Buy { coin_id, quantity }).await
}

/// POST /api/wallet/sell
pub async fn sell(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<TradeRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let (coin_id, quantity) = req.required()?;
    execute(&state, &user, &headers, LedgerRequest::Sell { coin_id, quantity }).await
}

/// GET /api/wallet/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<PaginationParams>,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    let (limit, offset) = page.resolve();
    let rows = state
        .ledger_service
        .list_transactions(user.user_id, limit, offset)
        .await?;
    Ok(Json(rows))
}

pub async fn admin_list_wallets(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<WalletState>>, ApiError> {
    Ok(Json(state.ledger_service.list_wallets().await?))
}

pub async fn admin_get_wallet(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PortfolioSummary>, ApiError> {
    Ok(Json(state.ledger_service.portfolio_summary(user_id).await?))
}

pub async fn admin_delete_wallet(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.ledger_service.delete_wallet(user_id).await?;
    tracing::info!(admin_id = %admin.user_id, user_id = %user_id, "Wallet deleted");
    Ok(Json(MessageResponse::new("Wallet deleted")))
}
