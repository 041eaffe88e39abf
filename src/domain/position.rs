use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Position status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
    Closing,
    Partial,
    Locked,
    #[serde(untagged)]
    Other(String),
}

impl PositionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Closing => "closing",
            Self::Partial => "partial",
            Self::Locked => "locked",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::Partial)
    }

    pub(crate) fn from_provider(raw: &str) -> Self {
        match raw {
            "Open" => Self::Open,
            "Closed" => Self::Closed,
            "Closing" => Self::Closing,
            "Partial" | "PartiallyClosed" => Self::Partial,
            "Locked" => Self::Locked,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An open position.
///
/// `raw` keeps the provider record the position was normalized from. It is
/// diagnostic-only: skipped by serde and ignored by `PartialEq`, and read
/// back only for the source-order lookup after a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub uic: Option<i64>,
    pub client_id: Option<String>,
    pub account_id: Option<String>,
    pub order_id: Option<String>,
    pub status: PositionStatus,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub value: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(skip)]
    pub(crate) raw: Value,
}

impl Position {
    /// Raw provider record this position was normalized from.
    pub fn source(&self) -> &Value {
        &self.raw
    }

    /// Id of the order this position was opened from, read from the raw
    /// provider record.
    pub fn source_order_id(&self) -> Option<&str> {
        crate::normalize::position_source_order_id(&self.raw)
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.uic == other.uic
            && self.client_id == other.client_id
            && self.account_id == other.account_id
            && self.order_id == other.order_id
            && self.status == other.status
            && self.quantity == other.quantity
            && self.price == other.price
            && self.value == other.value
            && self.currency == other.currency
    }
}

/// A netted position across the instrument. Same shape as [`Position`]
/// plus the provider's asset type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetPosition {
    pub id: String,
    pub uic: Option<i64>,
    pub client_id: Option<String>,
    pub account_id: Option<String>,
    pub order_id: Option<String>,
    pub status: PositionStatus,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub value: Option<Decimal>,
    pub currency: Option<String>,
    pub asset_type: Option<String>,
    #[serde(skip)]
    pub(crate) raw: Value,
}

impl NetPosition {
    pub fn source(&self) -> &Value {
        &self.raw
    }
}

impl PartialEq for NetPosition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.uic == other.uic
            && self.client_id == other.client_id
            && self.account_id == other.account_id
            && self.order_id == other.order_id
            && self.status == other.status
            && self.quantity == other.quantity
            && self.price == other.price
            && self.value == other.value
            && self.currency == other.currency
            && self.asset_type == other.asset_type
    }
}

/// A closed position; status is always `closed` and `value` carries the
/// realized result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub id: String,
    pub uic: Option<i64>,
    pub client_id: Option<String>,
    pub account_id: Option<String>,
    pub order_id: Option<String>,
    pub status: PositionStatus,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub value: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(skip)]
    pub(crate) raw: Value,
}

impl ClosedPosition {
    pub fn source(&self) -> &Value {
        &self.raw
    }
}

impl PartialEq for ClosedPosition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.uic == other.uic
            && self.client_id == other.client_id
            && self.account_id == other.account_id
            && self.order_id == other.order_id
            && self.status == other.status
            && self.quantity == other.quantity
            && self.price == other.price
            && self.value == other.value
            && self.currency == other.currency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_mapping_covers_provider_vocabulary() {
        assert_eq!(PositionStatus::from_provider("Open"), PositionStatus::Open);
        assert_eq!(
            PositionStatus::from_provider("PartiallyClosed"),
            PositionStatus::Partial
        );
        assert_eq!(
            PositionStatus::from_provider("Locked"),
            PositionStatus::Locked
        );
        assert_eq!(
            PositionStatus::from_provider("Frozen"),
            PositionStatus::Other("Frozen".to_string())
        );
    }

    #[test]
    fn raw_record_is_excluded_from_equality_and_serialization() {
        let a = Position {
            id: "p1".to_string(),
            uic: Some(21),
            client_id: None,
            account_id: None,
            order_id: None,
            status: PositionStatus::Open,
            quantity: None,
            price: None,
            value: None,
            currency: None,
            raw: json!({"PositionBase": {"SourceOrderId": "o-1"}}),
        };
        let mut b = a.clone();
        b.raw = json!({"something": "entirely different"});

        assert_eq!(a, b);

        let rendered = serde_json::to_string(&a).expect("serialize");
        assert!(!rendered.contains("SourceOrderId"));
    }
}
