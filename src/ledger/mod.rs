//! Wallet ledger
//!
//! Every change to a cash balance or coin holding flows through here: the
//! pure engine decides, the service persists under an optimistic version
//! check and writes the audit row in the same transaction.

mod engine;
pub mod model;
mod service;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::market::MarketError;

pub use engine::{trade_value, validate_amount, CASH_SCALE, QUANTITY_SCALE};
pub use model::*;
pub use service::LedgerService;

/// Ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: {required} required, {available} available")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient assets: {requested} requested, {held} held")]
    InsufficientAssets {
        coin_id: Uuid,
        requested: Decimal,
        held: Decimal,
    },

    #[error("Please fill in all fields")]
    MissingFields(Vec<String>),

    #[error("Idempotency-Key must be 1 to 255 visible characters")]
    InvalidIdempotencyKey,

    #[error("Idempotency-Key was already used for a different request")]
    IdempotencyConflict,

    #[error("Concurrent modification")]
    ConcurrentModification,

    #[error("Wallet not found")]
    WalletNotFound,

    #[error("Coin not found")]
    CoinNotFound,

    #[error("Price unavailable: {0}")]
    Market(#[from] MarketError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidAmount(_) | LedgerError::InvalidIdempotencyKey => {
                ApiError::ValidationError(e.to_string())
            }
            LedgerError::MissingFields(fields) => ApiError::MissingFields(fields),
            LedgerError::InsufficientFunds { .. } | LedgerError::InsufficientAssets { .. } => {
                ApiError::UnprocessableEntity(e.to_string())
            }
            LedgerError::IdempotencyConflict | LedgerError::ConcurrentModification => {
                ApiError::Conflict(e.to_string())
            }
            LedgerError::WalletNotFound | LedgerError::CoinNotFound => {
                ApiError::NotFound(e.to_string())
            }
            LedgerError::Market(err) => err.into(),
            LedgerError::Database(err) => err.into(),
        }
    }
}
