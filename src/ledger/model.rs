//! Wallet and ledger models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use super::LedgerError;

/// Kind of balance change recorded in the audit log
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "wallet_tx_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Buy,
    Sell,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::Buy => "buy",
            TransactionKind::Sell => "sell",
        }
    }
}

/// One coin position inside a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub coin_id: Uuid,
    pub coin_name: String,
    pub amount: Decimal,
}

/// Cash plus holdings at a given version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub user_id: Uuid,
    pub cash_balance: Decimal,
    pub holdings: Vec<Holding>,
    pub version: i64,
}

/// The coin side of a trade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinRef {
    pub id: Uuid,
    pub name: String,
}

/// A fully priced balance change, ready for the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    Deposit {
        amount: Decimal,
    },
    Withdraw {
        amount: Decimal,
    },
    Buy {
        coin: CoinRef,
        quantity: Decimal,
        price: Decimal,
    },
    Sell {
        coin: CoinRef,
        quantity: Decimal,
        price: Decimal,
    },
}

impl LedgerOp {
    pub fn kind(&self) -> TransactionKind {
        match self {
            LedgerOp::Deposit { .. } => TransactionKind::Deposit,
            LedgerOp::Withdraw { .. } => TransactionKind::Withdraw,
            LedgerOp::Buy { .. } => TransactionKind::Buy,
            LedgerOp::Sell { .. } => TransactionKind::Sell,
        }
    }
}

/// What an applied op did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerOutcome {
    pub kind: TransactionKind,
    pub coin_id: Option<Uuid>,
    pub coin_name: Option<String>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    /// Signed change to cash: positive for deposit/sell
    pub cash_delta: Decimal,
    pub balance_after: Decimal,
    pub version: i64,
}

/// Audit log row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: TransactionKind,
    pub coin_id: Option<Uuid>,
    pub coin_name: Option<String>,
    pub quantity: Option<Decimal>,
    pub price_usd: Option<Decimal>,
    pub cash_delta: Decimal,
    pub balance_after: Decimal,
    pub wallet_version: i64,
    pub idempotency_key: Option<String>,
    #[serde(skip_serializing)]
    pub request_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Body for deposit and withdraw
#[derive(Debug, Default, Deserialize)]
pub struct CashRequest {
    pub amount: Option<Decimal>,
}

/// Body for buy and sell
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub coin_id: Option<Uuid>,
    pub quantity: Option<Decimal>,
}

impl CashRequest {
    pub fn required_amount(self) -> Result<Decimal, LedgerError> {
        self.amount
            .ok_or_else(|| LedgerError::MissingFields(vec!["amount".to_string()]))
    }
}

impl TradeRequest {
    pub fn required(self) -> Result<(Uuid, Decimal), LedgerError> {
        match (self.coin_id, self.quantity) {
            (Some(coin_id), Some(quantity)) => Ok((coin_id, quantity)),
            (coin_id, quantity) => {
                let mut missing = Vec::new();
                if coin_id.is_none() {
                    missing.push("coinId".to_string());
                }
                if quantity.is_none() {
                    missing.push("quantity".to_string());
                }
                Err(LedgerError::MissingFields(missing))
            }
        }
    }
}

/// An unpriced request as the caller sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerRequest {
    Deposit { amount: Decimal },
    Withdraw { amount: Decimal },
    Buy { coin_id: Uuid, quantity: Decimal },
    Sell { coin_id: Uuid, quantity: Decimal },
}

impl LedgerRequest {
    pub fn kind(&self) -> TransactionKind {
        match self {
            LedgerRequest::Deposit { .. } => TransactionKind::Deposit,
            LedgerRequest::Withdraw { .. } => TransactionKind::Withdraw,
            LedgerRequest::Buy { .. } => TransactionKind::Buy,
            LedgerRequest::Sell { .. } => TransactionKind::Sell,
        }
    }

    /// Stable hash of the request body, stored next to an idempotency key.
    /// `1.50` and `1.5` fingerprint the same.
    pub fn fingerprint(&self) -> String {
        let canonical = match self {
            LedgerRequest::Deposit { amount } | LedgerRequest::Withdraw { amount } => {
                format!("{}|{}", self.kind().as_str(), amount.normalize())
            }
            LedgerRequest::Buy { coin_id, quantity } | LedgerRequest::Sell { coin_id, quantity } => {
                format!("{}|{}|{}", self.kind().as_str(), coin_id, quantity.normalize())
            }
        };

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Result of POST /api/wallet/{deposit,withdraw,buy,sell}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub transaction: WalletTransaction,
    pub wallet: WalletState,
    /// True when an idempotency key matched an earlier request
    pub replayed: bool,
}

/// One holding valued at the current price
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAsset {
    pub coin_id: Uuid,
    pub coin_name: String,
    pub amount: Decimal,
    pub price_usd: Option<Decimal>,
    pub value_usd: Option<Decimal>,
}

/// GET /api/wallet
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_assets: usize,
    pub cash_balance: Decimal,
    pub assets: Vec<PortfolioAsset>,
    /// Sum over holdings that have a price
    pub holdings_value_usd: Decimal,
    pub total_value_usd: Decimal,
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_request_reports_missing_fields() {
        let err = TradeRequest::default().required().unwrap_err();
        match err {
            LedgerError::MissingFields(fields) => assert_eq!(fields, vec!["coinId", "quantity"]),
            other => panic!("unexpected error: {other:?}"),
        }

        let ok = TradeRequest {
            coin_id: Some(Uuid::nil()),
            quantity: Some(dec!(0.5)),
        }
        .required()
        .unwrap();
        assert_eq!(ok, (Uuid::nil(), dec!(0.5)));
        assert!(CashRequest::default().required_amount().is_err());
    }

    #[test]
    fn test_fingerprint_ignores_trailing_zeros() {
        let a = LedgerRequest::Deposit { amount: dec!(1.50) };
        let b = LedgerRequest::Deposit { amount: dec!(1.5) };
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_kind_and_coin() {
        let coin = Uuid::new_v4();
        let buy = LedgerRequest::Buy {
            coin_id: coin,
            quantity: dec!(1),
        };
        let sell = LedgerRequest::Sell {
            coin_id: coin,
            quantity: dec!(1),
        };
        let other = LedgerRequest::Buy {
            coin_id: Uuid::new_v4(),
            quantity: dec!(1),
        };

        assert_ne!(buy.fingerprint(), sell.fingerprint());
        assert_ne!(buy.fingerprint(), other.fingerprint());
        assert_eq!(
            LedgerRequest::Deposit { amount: dec!(5) }.fingerprint(),
            LedgerRequest::Deposit { amount: dec!(5) }.fingerprint()
        );
    }

    #[test]
    fn test_trade_request_camel_case() {
        let id = Uuid::new_v4();
        let req: TradeRequest = serde_json::from_value(serde_json::json!({
            "coinId": id,
            "quantity": "0.25"
        }))
        .unwrap();
        assert_eq!(req.coin_id, Some(id));
        assert_eq!(req.quantity, Some(dec!(0.25)));
    }

    #[test]
    fn test_transaction_hides_fingerprint() {
        let tx = WalletTransaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: TransactionKind::Deposit,
            coin_id: None,
            coin_name: None,
            quantity: None,
            price_usd: None,
            cash_delta: dec!(10.00),
            balance_after: dec!(10.00),
            wallet_version: 1,
            idempotency_key: Some("k1".to_string()),
            request_fingerprint: Some("abc".to_string()),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["kind"], "deposit");
        assert!(json.get("requestFingerprint").is_none());
    }
}
