use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    /// Name used on the provider wire
    pub(crate) fn provider_name(&self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }

    pub(crate) fn from_provider(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("sell") {
            Self::Sell
        } else {
            Self::Buy
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order type
///
/// Unrecognized provider values are carried through unchanged in `Other`
/// rather than rejected, so new provider order types do not break parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    #[serde(untagged)]
    Other(String),
}

impl OrderType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Market => "market",
            Self::Limit => "limit",
            Self::Stop => "stop",
            Self::StopLimit => "stop_limit",
            Self::Other(raw) => raw,
        }
    }

    /// Name used on the provider wire (`OpenOrderType` / `OrderType`)
    pub(crate) fn provider_name(&self) -> String {
        match self {
            Self::Market => "Market".to_string(),
            Self::Limit => "Limit".to_string(),
            Self::Stop => "Stop".to_string(),
            Self::StopLimit => "StopLimit".to_string(),
            Self::Other(raw) => raw.clone(),
        }
    }

    pub(crate) fn from_provider(raw: &str) -> Self {
        match raw {
            "Market" => Self::Market,
            "Limit" => Self::Limit,
            "Stop" => Self::Stop,
            "StopLimit" => Self::StopLimit,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Filled,
    Working,
    Parked,
    #[serde(untagged)]
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Filled => "filled",
            Self::Working => "working",
            Self::Parked => "parked",
            Self::Other(raw) => raw,
        }
    }

    /// Still resting on the book
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Working | Self::Parked)
    }

    pub(crate) fn from_provider(raw: &str) -> Self {
        match raw {
            "Filled" => Self::Filled,
            "Working" => Self::Working,
            "Parked" => Self::Parked,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An order as reported by the provider (or synthesized after submission
/// when no confirmation was available).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub time: Option<DateTime<Utc>>,
    pub uic: Option<i64>,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub client_id: Option<String>,
    pub account_id: Option<String>,
    pub exchange_id: Option<String>,
    pub asset_type: Option<String>,
    pub external_reference: Option<String>,
}

/// Optional order-placement fields, passed through to the provider only
/// when set.
#[derive(Debug, Clone, Default)]
pub struct OrderOptions {
    pub asset_type: Option<String>,
    pub external_reference: Option<String>,
    /// Defaults to true on the wire when unset
    pub manual_order: Option<bool>,
    pub is_force_open: Option<bool>,
    pub trailing_stop_step: Option<Decimal>,
    pub trailing_stop_distance_to_market: Option<Decimal>,
}

/// Parameters for pre-trade validation (and the shared order translation).
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub account_key: String,
    pub side: OrderSide,
    pub uic: i64,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub stop_limit: Option<Decimal>,
    pub options: OrderOptions,
}

impl OrderRequest {
    pub fn market(account_key: &str, side: OrderSide, uic: i64, quantity: Decimal) -> Self {
        Self {
            account_key: account_key.to_string(),
            side,
            uic,
            quantity,
            order_type: OrderType::Market,
            price: None,
            stop_limit: None,
            options: OrderOptions::default(),
        }
    }

    pub fn limit(
        account_key: &str,
        side: OrderSide,
        uic: i64,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            account_key: account_key.to_string(),
            side,
            uic,
            quantity,
            order_type: OrderType::Limit,
            price: Some(price),
            stop_limit: None,
            options: OrderOptions::default(),
        }
    }
}

/// Pre-trade check result. The provider may return any subset of these.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PreCheckResult {
    pub estimated_cash_required: Option<Decimal>,
    pub estimated_cash_required_currency: Option<String>,
    pub margin_impact_buy_sell: Option<Decimal>,
    pub pre_check_result: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}
