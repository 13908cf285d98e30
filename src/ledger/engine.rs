//! Pure wallet arithmetic
//!
//! `WalletState::apply` is the only place balances change. It validates the
//! op, works on a copy, and swaps the copy in only when every check passed,
//! so a rejected op leaves the wallet exactly as it was.
//!
//! Invariants after every successful apply:
//! - `cash_balance >= 0`, with at most two decimal places
//! - every holding amount is > 0, with at most eight decimal places
//! - no two holdings share a coin id
//! - `version` went up by exactly one

use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use uuid::Uuid;

use super::model::{
    CoinRef, Holding, LedgerOp, LedgerOutcome, PortfolioAsset, PortfolioSummary, WalletState,
};
use super::LedgerError;

/// Decimal places for cash
pub const CASH_SCALE: u32 = 2;
/// Decimal places for coin quantities
pub const QUANTITY_SCALE: u32 = 8;

/// Largest cash balance the `NUMERIC(20, 2)` column can hold
fn max_cash_balance() -> Decimal {
    Decimal::from_i128_with_scale(10i128.pow(20) - 1, CASH_SCALE)
}

/// Largest holding the `NUMERIC(30, 8)` column can hold
fn max_holding_amount() -> Decimal {
    Decimal::from_i128_with_scale(10i128.pow(28) - 1, QUANTITY_SCALE)
}

/// Reject non-positive values and values finer than `scale` places
pub fn validate_amount(field: &str, value: Decimal, scale: u32) -> Result<Decimal, LedgerError> {
    if value <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "{field} must be greater than zero"
        )));
    }
    if value.normalize().scale() > scale {
        return Err(LedgerError::InvalidAmount(format!(
            "{field} supports at most {scale} decimal places"
        )));
    }
    Ok(value)
}

/// `quantity × price` rounded to cents, midpoint away from zero
pub fn trade_value(quantity: Decimal, price: Decimal) -> Result<Decimal, LedgerError> {
    quantity
        .checked_mul(price)
        .map(|v| v.round_dp_with_strategy(CASH_SCALE, RoundingStrategy::MidpointAwayFromZero))
        .ok_or_else(|| LedgerError::InvalidAmount("trade value is out of range".to_string()))
}

impl WalletState {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            cash_balance: Decimal::ZERO,
            holdings: Vec::new(),
            version: 0,
        }
    }

    pub fn holding(&self, coin_id: Uuid) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.coin_id == coin_id)
    }

    /// Amount held of a coin, zero when absent
    pub fn amount_of(&self, coin_id: Uuid) -> Decimal {
        self.holding(coin_id).map_or(Decimal::ZERO, |h| h.amount)
    }

    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.cash_balance >= amount
    }

    pub fn has_sufficient_assets(&self, coin_id: Uuid, quantity: Decimal) -> bool {
        self.amount_of(coin_id) >= quantity
    }

    /// Value holdings at `prices` (coin id to USD). Holdings without a price
    /// are listed with null price/value and left out of the totals. So is a
    /// holding whose value would overflow the totals.
    pub fn summarize(&self, prices: &HashMap<Uuid, Decimal>) -> PortfolioSummary {
        let mut holdings_value_usd = Decimal::ZERO;
        let mut total_value_usd = self.cash_balance;

        let assets: Vec<PortfolioAsset> = self
            .holdings
            .iter()
            .map(|h| {
                let price_usd = prices.get(&h.coin_id).copied();
                let value_usd = price_usd
                    .and_then(|p| trade_value(h.amount, p).ok())
                    .and_then(|value| {
                        let holdings = holdings_value_usd.checked_add(value)?;
                        let total = total_value_usd.checked_add(value)?;
                        holdings_value_usd = holdings;
                        total_value_usd = total;
                        Some(value)
                    });
                PortfolioAsset {
                    coin_id: h.coin_id,
                    coin_name: h.coin_name.clone(),
                    amount: h.amount,
                    price_usd,
                    value_usd,
                }
            })
            .collect();

        PortfolioSummary {
            total_assets: assets.len(),
            cash_balance: self.cash_balance,
            holdings_value_usd,
            total_value_usd,
            assets,
            version: self.version,
        }
    }

    /// Apply an op. On error the state is unchanged.
    pub fn apply(&mut self, op: &LedgerOp) -> Result<LedgerOutcome, LedgerError> {
        let mut next = self.clone();
        let outcome = next.apply_in_place(op)?;
        *self = next;
        Ok(outcome)
    }

    fn apply_in_place(&mut self, op: &LedgerOp) -> Result<LedgerOutcome, LedgerError> {
        let (cash_delta, trade) = match op {
            LedgerOp::Deposit { amount } => {
                let amount = validate_amount("amount", *amount, CASH_SCALE)?;
                self.credit(amount)?;
                (amount, None)
            }
            LedgerOp::Withdraw { amount } => {
                let amount = validate_amount("amount", *amount, CASH_SCALE)?;
                self.debit(amount)?;
                (-amount, None)
            }
            LedgerOp::Buy {
                coin,
                quantity,
                price,
            } => {
                let (quantity, price, cost) = priced(*quantity, *price)?;
                self.debit(cost)?;
                self.modify_holding(coin, quantity)?;
                (-cost, Some((coin, quantity, price)))
            }
            LedgerOp::Sell {
                coin,
                quantity,
                price,
            } => {
                let (quantity, price, proceeds) = priced(*quantity, *price)?;
                let held = self.amount_of(coin.id);
                if held < quantity {
                    return Err(LedgerError::InsufficientAssets {
                        coin_id: coin.id,
                        requested: quantity,
                        held,
                    });
                }
                self.modify_holding(coin, -quantity)?;
                self.credit(proceeds)?;
                (proceeds, Some((coin, quantity, price)))
            }
        };

        self.version += 1;

        Ok(LedgerOutcome {
            kind: op.kind(),
            coin_id: trade.map(|(coin, _, _)| coin.id),
            coin_name: trade.map(|(coin, _, _)| coin.name.clone()),
            quantity: trade.map(|(_, q, _)| q),
            price: trade.map(|(_, _, p)| p),
            cash_delta,
            balance_after: self.cash_balance,
            version: self.version,
        })
    }

    fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        let balance = self
            .cash_balance
            .checked_add(amount)
            .filter(|b| *b <= max_cash_balance())
            .ok_or_else(|| {
                LedgerError::InvalidAmount("cash balance would exceed the maximum".to_string())
            })?;
        self.cash_balance = balance;
        Ok(())
    }

    fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if !self.has_sufficient_funds(amount) {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: self.cash_balance,
            });
        }
        self.cash_balance -= amount;
        Ok(())
    }

    /// Add a signed delta to a holding: creates it when absent, removes it at zero
    fn modify_holding(&mut self, coin: &CoinRef, delta: Decimal) -> Result<(), LedgerError> {
        match self.holdings.iter().position(|h| h.coin_id == coin.id) {
            Some(index) => {
                let amount = self.holdings[index].amount + delta;
                if amount > max_holding_amount() {
                    return Err(LedgerError::InvalidAmount(
                        "holding would exceed the maximum".to_string(),
                    ));
                }
                if amount <= Decimal::ZERO {
                    self.holdings.remove(index);
                } else {
                    self.holdings[index].amount = amount;
                }
            }
            None if delta > Decimal::ZERO => {
                if delta > max_holding_amount() {
                    return Err(LedgerError::InvalidAmount(
                        "holding would exceed the maximum".to_string(),
                    ));
                }
                self.holdings.push(Holding {
                    coin_id: coin.id,
                    coin_name: coin.name.clone(),
                    amount: delta,
                });
            }
            None => {}
        }
        Ok(())
    }
}

/// Validate a trade's quantity and price and compute its cash value
fn priced(quantity: Decimal, price: Decimal) -> Result<(Decimal, Decimal, Decimal), LedgerError> {
    let quantity = validate_amount("quantity", quantity, QUANTITY_SCALE)?;
    if price <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(
            "price must be greater than zero".to_string(),
        ));
    }
    let value = trade_value(quantity, price)?;
    if value <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(
            "trade value rounds to zero".to_string(),
        ));
    }
    Ok((quantity, price, value))
}
