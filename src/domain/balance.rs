use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account balance snapshot. Re-fetched on every call; nothing is cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub cash_balance: Option<Decimal>,
    pub cash_available: Option<Decimal>,
    pub total_value: Option<Decimal>,
    pub margin_used: Option<Decimal>,
    pub margin_available: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub currency: Option<String>,
}
