//! Response normalization: provider payloads into internal entities.
//!
//! The provider reports conceptually equivalent values under different
//! nested names per entity kind (open price is `PositionBase.OpenPrice` for
//! positions but `NetPositionBase.AverageOpenPrice` for net positions), so
//! every entity has its own explicit field table; nothing is inferred
//! generically.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::{
    Balance, ClosedPosition, NetPosition, Order, OrderSide, OrderStatus, OrderType, Position,
    PositionStatus,
};
use crate::error::SaxoError;

// ==================== Field tables ====================

mod position_fields {
    pub const ID: &[&str] = &["PositionId"];
    pub const UIC: &[&str] = &["PositionBase", "Uic"];
    pub const CLIENT_ID: &[&str] = &["PositionBase", "ClientId"];
    pub const ACCOUNT_ID: &[&str] = &["PositionBase", "AccountId"];
    pub const SOURCE_ORDER_ID: &[&str] = &["PositionBase", "SourceOrderId"];
    pub const STATUS: &[&str] = &["PositionBase", "Status"];
    pub const QUANTITY: &[&str] = &["PositionBase", "Amount"];
    pub const OPEN_PRICE: &[&str] = &["PositionBase", "OpenPrice"];
    pub const CURRENT_VALUE: &[&str] = &["PositionView", "CurrentPrice"];
    pub const CURRENCY: &[&str] = &["PositionBase", "Currency"];
}

mod net_position_fields {
    pub const ID: &[&str] = &["NetPositionId"];
    pub const UIC: &[&str] = &["NetPositionBase", "Uic"];
    pub const CLIENT_ID: &[&str] = &["NetPositionBase", "ClientId"];
    pub const ACCOUNT_ID: &[&str] = &["NetPositionBase", "AccountId"];
    pub const SOURCE_ORDER_ID: &[&str] = &["NetPositionBase", "SourceOrderId"];
    pub const STATUS: &[&str] = &["NetPositionBase", "Status"];
    pub const QUANTITY: &[&str] = &["NetPositionBase", "Amount"];
    pub const OPEN_PRICE: &[&str] = &["NetPositionBase", "AverageOpenPrice"];
    pub const CURRENT_VALUE: &[&str] = &["NetPositionView", "MarketValue"];
    pub const CURRENCY: &[&str] = &["NetPositionBase", "Currency"];
    pub const ASSET_TYPE: &[&str] = &["NetPositionBase", "AssetType"];
}

mod closed_position_fields {
    pub const ID: &[&str] = &["PositionId"];
    pub const UIC: &[&str] = &["PositionBase", "Uic"];
    pub const CLIENT_ID: &[&str] = &["PositionBase", "ClientId"];
    pub const ACCOUNT_ID: &[&str] = &["PositionBase", "AccountId"];
    pub const SOURCE_ORDER_ID: &[&str] = &["PositionBase", "SourceOrderId"];
    pub const QUANTITY: &[&str] = &["PositionBase", "Amount"];
    pub const OPEN_PRICE: &[&str] = &["PositionBase", "OpenPrice"];
    pub const REALIZED_VALUE: &[&str] = &["PositionView", "ProfitLoss"];
    pub const CURRENCY: &[&str] = &["PositionBase", "Currency"];
}

mod order_fields {
    pub const ID: &[&str] = &["OrderId"];
    pub const TIME: &[&str] = &["OrderTime"];
    pub const UIC: &[&str] = &["Uic"];
    pub const SIDE: &[&str] = &["BuySell"];
    pub const ORDER_TYPE: &[&str] = &["OpenOrderType"];
    pub const STATUS: &[&str] = &["Status"];
    pub const PRICE: &[&str] = &["Price"];
    pub const QUANTITY: &[&str] = &["Amount"];
    pub const CLIENT_ID: &[&str] = &["ClientId"];
    pub const ACCOUNT_ID: &[&str] = &["AccountId"];
    pub const EXCHANGE_ID: &[&str] = &["Exchange", "ExchangeId"];
    pub const ASSET_TYPE: &[&str] = &["AssetType"];
    pub const EXTERNAL_REFERENCE: &[&str] = &["ExternalReference"];
}

mod balance_fields {
    pub const CASH_BALANCE: &[&str] = &["CashBalance"];
    pub const CASH_AVAILABLE: &[&str] = &["CashAvailableForTrading"];
    pub const TOTAL_VALUE: &[&str] = &["TotalValue"];
    pub const MARGIN_USED: &[&str] = &["MarginUsedByCurrentPositions"];
    pub const MARGIN_AVAILABLE: &[&str] = &["MarginAvailableForTrading"];
    pub const UNREALIZED_PNL: &[&str] = &["UnrealizedMarginProfitLoss"];
    pub const CURRENCY: &[&str] = &["Currency"];
}

// ==================== Lookup helpers ====================

pub(crate) fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, key| node.get(*key))
}

pub(crate) fn str_at(root: &Value, path: &[&str]) -> Option<String> {
    match lookup(root, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn decimal_at(root: &Value, path: &[&str]) -> Option<Decimal> {
    match lookup(root, path)? {
        Value::String(s) => Decimal::from_str_exact(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str_exact(&n.to_string()).ok(),
        _ => None,
    }
}

pub(crate) fn i64_at(root: &Value, path: &[&str]) -> Option<i64> {
    match lookup(root, path)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn bool_at(root: &Value, path: &[&str]) -> Option<bool> {
    match lookup(root, path)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(matches!(s.as_str(), "true" | "TRUE" | "1" | "yes" | "YES")),
        _ => None,
    }
}

fn time_at(root: &Value, path: &[&str]) -> Option<DateTime<Utc>> {
    lookup(root, path)?
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Unwrap the provider's `{Data: [...]}` list envelope; bare arrays are
/// also accepted.
pub(crate) fn data_rows(payload: &Value) -> &[Value] {
    if let Some(rows) = payload.as_array() {
        return rows;
    }
    payload
        .get("Data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Source order id of a raw position record, used for the post-submission
/// lookup.
pub(crate) fn position_source_order_id(raw: &Value) -> Option<&str> {
    lookup(raw, position_fields::SOURCE_ORDER_ID).and_then(Value::as_str)
}

// ==================== Error classification ====================

/// Classify a provider error payload.
///
/// Errors arrive in one of two mutually exclusive shapes: a top-level
/// `{ErrorCode, Message, ModelState?}` or a nested
/// `{ErrorInfo: {ErrorCode, Message}}`. Any other payload is a successful
/// result and passes through unchanged.
pub fn classify_error(payload: &Value) -> Option<SaxoError> {
    if let Some(code) = payload.get("ErrorCode").and_then(Value::as_str) {
        return Some(SaxoError::Api {
            code: code.to_string(),
            message: payload
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            model_state: payload.get("ModelState").cloned(),
        });
    }

    if let Some(info) = payload.get("ErrorInfo") {
        if let Some(code) = info.get("ErrorCode").and_then(Value::as_str) {
            return Some(SaxoError::Api {
                code: code.to_string(),
                message: info
                    .get("Message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                model_state: None,
            });
        }
    }

    None
}

// ==================== Entity mappers ====================

/// Normalize a raw position record. Returns None when the record carries
/// no position id.
pub fn map_position(raw: &Value) -> Option<Position> {
    use position_fields as f;

    Some(Position {
        id: str_at(raw, f::ID)?,
        uic: i64_at(raw, f::UIC),
        client_id: str_at(raw, f::CLIENT_ID),
        account_id: str_at(raw, f::ACCOUNT_ID),
        order_id: str_at(raw, f::SOURCE_ORDER_ID),
        status: str_at(raw, f::STATUS)
            .as_deref()
            .map(PositionStatus::from_provider)
            .unwrap_or(PositionStatus::Open),
        quantity: decimal_at(raw, f::QUANTITY),
        price: decimal_at(raw, f::OPEN_PRICE),
        value: decimal_at(raw, f::CURRENT_VALUE),
        currency: str_at(raw, f::CURRENCY),
        raw: raw.clone(),
    })
}

pub fn map_positions(payload: &Value) -> Vec<Position> {
    data_rows(payload).iter().filter_map(map_position).collect()
}

pub fn map_net_position(raw: &Value) -> Option<NetPosition> {
    use net_position_fields as f;

    Some(NetPosition {
        id: str_at(raw, f::ID)?,
        uic: i64_at(raw, f::UIC),
        client_id: str_at(raw, f::CLIENT_ID),
        account_id: str_at(raw, f::ACCOUNT_ID),
        order_id: str_at(raw, f::SOURCE_ORDER_ID),
        status: str_at(raw, f::STATUS)
            .as_deref()
            .map(PositionStatus::from_provider)
            .unwrap_or(PositionStatus::Open),
        quantity: decimal_at(raw, f::QUANTITY),
        price: decimal_at(raw, f::OPEN_PRICE),
        value: decimal_at(raw, f::CURRENT_VALUE),
        currency: str_at(raw, f::CURRENCY),
        asset_type: str_at(raw, f::ASSET_TYPE),
        raw: raw.clone(),
    })
}

pub fn map_net_positions(payload: &Value) -> Vec<NetPosition> {
    data_rows(payload)
        .iter()
        .filter_map(map_net_position)
        .collect()
}

/// Closed records share the position shape but report their realized
/// result under `PositionView.ProfitLoss`; status is fixed to closed.
pub fn map_closed_position(raw: &Value) -> Option<ClosedPosition> {
    use closed_position_fields as f;

    Some(ClosedPosition {
        id: str_at(raw, f::ID)?,
        uic: i64_at(raw, f::UIC),
        client_id: str_at(raw, f::CLIENT_ID),
        account_id: str_at(raw, f::ACCOUNT_ID),
        order_id: str_at(raw, f::SOURCE_ORDER_ID),
        status: PositionStatus::Closed,
        quantity: decimal_at(raw, f::QUANTITY),
        price: decimal_at(raw, f::OPEN_PRICE),
        value: decimal_at(raw, f::REALIZED_VALUE),
        currency: str_at(raw, f::CURRENCY),
        raw: raw.clone(),
    })
}

pub fn map_closed_positions(payload: &Value) -> Vec<ClosedPosition> {
    data_rows(payload)
        .iter()
        .filter_map(map_closed_position)
        .collect()
}

/// Normalize a raw order record. Returns None when the record carries no
/// order id.
pub fn map_order(raw: &Value) -> Option<Order> {
    use order_fields as f;

    Some(Order {
        id: str_at(raw, f::ID)?,
        time: time_at(raw, f::TIME),
        uic: i64_at(raw, f::UIC),
        side: str_at(raw, f::SIDE)
            .as_deref()
            .map(OrderSide::from_provider)
            .unwrap_or(OrderSide::Buy),
        order_type: str_at(raw, f::ORDER_TYPE)
            .as_deref()
            .map(OrderType::from_provider)
            .unwrap_or_else(|| OrderType::Other("Unknown".to_string())),
        status: str_at(raw, f::STATUS)
            .as_deref()
            .map(OrderStatus::from_provider)
            .unwrap_or(OrderStatus::Working),
        price: decimal_at(raw, f::PRICE),
        quantity: decimal_at(raw, f::QUANTITY),
        client_id: str_at(raw, f::CLIENT_ID),
        account_id: str_at(raw, f::ACCOUNT_ID),
        exchange_id: str_at(raw, f::EXCHANGE_ID),
        asset_type: str_at(raw, f::ASSET_TYPE),
        external_reference: str_at(raw, f::EXTERNAL_REFERENCE),
    })
}

pub fn map_orders(payload: &Value) -> Vec<Order> {
    data_rows(payload).iter().filter_map(map_order).collect()
}

pub fn map_balance(raw: &Value) -> Balance {
    use balance_fields as f;

    Balance {
        cash_balance: decimal_at(raw, f::CASH_BALANCE),
        cash_available: decimal_at(raw, f::CASH_AVAILABLE),
        total_value: decimal_at(raw, f::TOTAL_VALUE),
        margin_used: decimal_at(raw, f::MARGIN_USED),
        margin_available: decimal_at(raw, f::MARGIN_AVAILABLE),
        unrealized_pnl: decimal_at(raw, f::UNREALIZED_PNL),
        currency: str_at(raw, f::CURRENCY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn position_record() -> Value {
        json!({
            "PositionId": "5001",
            "PositionBase": {
                "Uic": 211,
                "ClientId": "C1",
                "AccountId": "A1",
                "SourceOrderId": "9001",
                "Status": "Open",
                "Amount": 10000,
                "OpenPrice": 1.0925,
                "Currency": "EUR"
            },
            "PositionView": {
                "CurrentPrice": 1.0931,
                "ProfitLoss": 6.0
            }
        })
    }

    #[test]
    fn position_uses_position_base_open_price() {
        let position = map_position(&position_record()).expect("record has an id");

        assert_eq!(position.id, "5001");
        assert_eq!(position.uic, Some(211));
        assert_eq!(position.client_id.as_deref(), Some("C1"));
        assert_eq!(position.account_id.as_deref(), Some("A1"));
        assert_eq!(position.order_id.as_deref(), Some("9001"));
        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(position.quantity, Some(dec!(10000)));
        assert_eq!(position.price, Some(dec!(1.0925)));
        assert_eq!(position.value, Some(dec!(1.0931)));
        assert_eq!(position.source_order_id(), Some("9001"));
    }

    #[test]
    fn net_position_uses_average_open_price_and_market_value() {
        let record = json!({
            "NetPositionId": "EURUSD__FxSpot",
            "NetPositionBase": {
                "Uic": 21,
                "Amount": 50000,
                "AverageOpenPrice": 1.0910,
                "AssetType": "FxSpot",
                "Status": "Open",
                "Currency": "USD"
            },
            "NetPositionView": {
                "MarketValue": 54575.0
            }
        });

        let net = map_net_position(&record).expect("record has an id");
        assert_eq!(net.id, "EURUSD__FxSpot");
        assert_eq!(net.price, Some(dec!(1.0910)));
        assert_eq!(net.value, Some(dec!(54575.0)));
        assert_eq!(net.asset_type.as_deref(), Some("FxSpot"));
    }

    #[test]
    fn closed_position_fixes_status_and_reads_profit_loss() {
        let record = json!({
            "PositionId": "7007",
            "PositionBase": {
                "Uic": 21,
                "Status": "Open",
                "Amount": 100,
                "OpenPrice": 45.2,
                "Currency": "USD"
            },
            "PositionView": {
                "CurrentPrice": 46.0,
                "ProfitLoss": 80.0
            }
        });

        let closed = map_closed_position(&record).expect("record has an id");
        assert_eq!(closed.status, PositionStatus::Closed);
        assert_eq!(closed.value, Some(dec!(80.0)));
        assert_eq!(closed.price, Some(dec!(45.2)));
    }

    #[test]
    fn order_enums_translate_with_unknown_passthrough() {
        let record = json!({
            "OrderId": "9001",
            "OrderTime": "2024-03-01T10:15:00Z",
            "Uic": 211,
            "BuySell": "Sell",
            "OpenOrderType": "StopLimit",
            "Status": "Parked",
            "Price": 101.5,
            "Amount": 25,
            "ClientId": "C1",
            "AccountId": "A1",
            "Exchange": {"ExchangeId": "NYSE"},
            "AssetType": "Stock",
            "ExternalReference": "my-ref"
        });

        let order = map_order(&record).expect("record has an id");
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.order_type, OrderType::StopLimit);
        assert_eq!(order.status, OrderStatus::Parked);
        assert_eq!(order.price, Some(dec!(101.5)));
        assert_eq!(order.exchange_id.as_deref(), Some("NYSE"));
        assert_eq!(order.external_reference.as_deref(), Some("my-ref"));
        assert!(order.time.is_some());

        let unknown = json!({
            "OrderId": "9002",
            "OpenOrderType": "TrailingStop",
            "Status": "PendingReview"
        });
        let order = map_order(&unknown).expect("record has an id");
        assert_eq!(
            order.order_type,
            OrderType::Other("TrailingStop".to_string())
        );
        assert_eq!(
            order.status,
            OrderStatus::Other("PendingReview".to_string())
        );
    }

    #[test]
    fn order_without_id_is_dropped() {
        assert!(map_order(&json!({"Status": "Working"})).is_none());
        assert!(map_orders(&json!({"Data": [{"Status": "Working"}, {"OrderId": "1"}]})).len() == 1);
    }

    #[test]
    fn balance_maps_flat_fields() {
        let record = json!({
            "CashBalance": 10000.5,
            "CashAvailableForTrading": 9500.0,
            "TotalValue": 10420.25,
            "MarginUsedByCurrentPositions": 500.0,
            "MarginAvailableForTrading": 9000.0,
            "UnrealizedMarginProfitLoss": -79.75,
            "Currency": "EUR"
        });

        let balance = map_balance(&record);
        assert_eq!(balance.cash_balance, Some(dec!(10000.5)));
        assert_eq!(balance.cash_available, Some(dec!(9500.0)));
        assert_eq!(balance.margin_used, Some(dec!(500.0)));
        assert_eq!(balance.unrealized_pnl, Some(dec!(-79.75)));
        assert_eq!(balance.currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn data_envelope_and_bare_arrays_both_unwrap() {
        let enveloped = json!({"__count": 1, "Data": [position_record()]});
        assert_eq!(map_positions(&enveloped).len(), 1);

        let bare = json!([position_record()]);
        assert_eq!(map_positions(&bare).len(), 1);

        assert!(map_positions(&json!({"unexpected": true})).is_empty());
    }

    #[test]
    fn classify_top_level_error_shape() {
        let payload = json!({
            "ErrorCode": "X",
            "Message": "bad",
            "ModelState": {"Amount": ["must be positive"]}
        });

        match classify_error(&payload) {
            Some(SaxoError::Api {
                code,
                message,
                model_state,
            }) => {
                assert_eq!(code, "X");
                assert_eq!(message, "bad");
                assert!(model_state.is_some());
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn classify_nested_error_shape() {
        let payload = json!({"ErrorInfo": {"ErrorCode": "IllegalInstrumentId", "Message": "nope"}});

        match classify_error(&payload) {
            Some(SaxoError::Api { code, message, .. }) => {
                assert_eq!(code, "IllegalInstrumentId");
                assert_eq!(message, "nope");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn non_error_payloads_pass_through() {
        assert!(classify_error(&json!({"OrderId": "1"})).is_none());
        assert!(classify_error(&json!({"Data": []})).is_none());
        assert!(classify_error(&Value::Null).is_none());
        // an ErrorCode that is not a string is not the error shape
        assert!(classify_error(&json!({"ErrorCode": 17})).is_none());
    }
}
