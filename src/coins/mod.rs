//! Coin catalogue: manual entries and live market-tracked coins

mod model;
mod service;

pub use model::*;
pub use service::{CoinError, CoinService, PRICE_SCALE};
