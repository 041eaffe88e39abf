//! Order lifecycle: validation, submission, and post-submission
//! reconciliation.
//!
//! The provider gives no synchronous confirmation of what became of an
//! accepted order: it may still be working, or it may have executed
//! immediately and turned into a position. After every submission the
//! gateway re-resolves the order's identity (order-by-id, then
//! position-by-source-order-id, then a synthesized working order) instead
//! of trusting the submission response.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    Order, OrderOptions, OrderOutcome, OrderRequest, OrderSide, OrderStatus, OrderType,
    PreCheckResult,
};
use crate::error::{Result, SaxoError};
use crate::normalize;
use crate::transport::Transport;

pub(crate) const TRADE_ORDERS_PATH: &str = "/trade/v2/orders";
pub(crate) const TRADE_PRECHECK_PATH: &str = "/trade/v2/orders/precheck";
pub(crate) const PORT_ORDERS_PATH: &str = "/port/v1/orders";
pub(crate) const PORT_POSITIONS_PATH: &str = "/port/v1/positions";

/// Trading operations bound to one session.
pub struct OrderGateway {
    transport: Arc<dyn Transport>,
    client_key: String,
}

impl OrderGateway {
    pub fn new(transport: Arc<dyn Transport>, client_key: &str) -> Self {
        Self {
            transport,
            client_key: client_key.to_string(),
        }
    }

    /// Submit an order and resolve what it became.
    ///
    /// Once the provider has accepted the submission (returned an order
    /// id) this call does not fail the caller: if neither the order nor a
    /// matching position can be confirmed afterwards, a working order is
    /// synthesized from the submitted parameters.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, options))]
    pub async fn create_order(
        &self,
        account_key: &str,
        side: OrderSide,
        uic: i64,
        quantity: Decimal,
        order_type: OrderType,
        price: Option<Decimal>,
        stop_limit: Option<Decimal>,
        options: &OrderOptions,
    ) -> Result<OrderOutcome> {
        validate_order(&order_type, price, stop_limit)?;

        let body = order_body(
            account_key,
            side,
            uic,
            quantity,
            &order_type,
            price,
            stop_limit,
            options,
        );
        let resp = self.transport.post(TRADE_ORDERS_PATH, Some(body)).await?;

        let order_id = normalize::str_at(&resp, &["OrderId"]).ok_or_else(|| {
            SaxoError::Submission("order response carried no order id".to_string())
        })?;
        info!(%order_id, "order accepted");

        Ok(self
            .resolve_submission(
                account_key,
                &order_id,
                side,
                uic,
                quantity,
                order_type,
                price,
                options,
            )
            .await)
    }

    /// Reconcile a just-accepted submission to its final identity.
    #[allow(clippy::too_many_arguments)]
    async fn resolve_submission(
        &self,
        account_key: &str,
        order_id: &str,
        side: OrderSide,
        uic: i64,
        quantity: Decimal,
        order_type: OrderType,
        price: Option<Decimal>,
        options: &OrderOptions,
    ) -> OrderOutcome {
        // Still on the book?
        match self.get_order(order_id).await {
            Ok(Some(order)) => return OrderOutcome::Pending(order),
            Ok(None) => debug!(order_id, "order lookup returned no order"),
            Err(err) => debug!(order_id, error = %err, "order lookup failed"),
        }

        // Absent from the book means executed immediately: find the
        // position it opened.
        match self.account_positions(account_key).await {
            Ok(positions) => {
                if let Some(position) = positions
                    .into_iter()
                    .find(|p| p.source_order_id() == Some(order_id))
                {
                    info!(order_id, position_id = %position.id, "order executed into position");
                    return OrderOutcome::Executed(position);
                }
            }
            Err(err) => warn!(order_id, error = %err, "position scan failed"),
        }

        warn!(order_id, "no confirmation available, synthesizing working order");
        OrderOutcome::Pending(Order {
            id: order_id.to_string(),
            time: Some(Utc::now()),
            uic: Some(uic),
            side,
            order_type,
            status: OrderStatus::Working,
            price,
            quantity: Some(quantity),
            client_id: Some(self.client_key.clone()),
            account_id: Some(account_key.to_string()),
            exchange_id: None,
            asset_type: options.asset_type.clone(),
            external_reference: options.external_reference.clone(),
        })
    }

    /// Fetch a single order by id; None when the payload is not an order.
    pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        let path = format!("{}/{}/{}", TRADE_ORDERS_PATH, self.client_key, order_id);
        let payload = self.transport.get(&path, None).await?;
        Ok(normalize::map_order(&payload))
    }

    /// Current open orders for an account.
    pub async fn account_orders(&self, account_key: &str) -> Result<Vec<Order>> {
        let query = [
            ("ClientKey", self.client_key.clone()),
            ("AccountKey", account_key.to_string()),
        ];
        let payload = self.transport.get(PORT_ORDERS_PATH, Some(&query)).await?;
        Ok(normalize::map_orders(&payload))
    }

    /// Current open positions for an account.
    pub async fn account_positions(&self, account_key: &str) -> Result<Vec<crate::domain::Position>> {
        let query = [
            ("ClientKey", self.client_key.clone()),
            ("AccountKey", account_key.to_string()),
        ];
        let payload = self
            .transport
            .get(PORT_POSITIONS_PATH, Some(&query))
            .await?;
        Ok(normalize::map_positions(&payload))
    }

    /// Modify an open order's price and/or quantity.
    ///
    /// The modify endpoint needs the order's full type context, not a
    /// partial patch, so the current order list is consulted first; an
    /// absent target fails without issuing the PATCH.
    #[instrument(skip(self))]
    pub async fn modify_order(
        &self,
        account_key: &str,
        order_id: &str,
        price: Option<Decimal>,
        quantity: Option<Decimal>,
    ) -> Result<()> {
        let orders = self.account_orders(account_key).await?;
        let target = orders
            .into_iter()
            .find(|order| order.id == order_id)
            .ok_or_else(|| SaxoError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;

        let mut body = Map::new();
        body.insert("AccountKey".to_string(), json!(account_key));
        body.insert("OrderId".to_string(), json!(order_id));
        body.insert(
            "OrderType".to_string(),
            json!(target.order_type.provider_name()),
        );
        if let Some(asset_type) = &target.asset_type {
            body.insert("AssetType".to_string(), json!(asset_type));
        }
        if let Some(price) = price {
            body.insert("OrderPrice".to_string(), json!(price));
        }
        if let Some(quantity) = quantity {
            body.insert("Amount".to_string(), json!(quantity));
        }

        self.transport
            .patch(TRADE_ORDERS_PATH, Some(Value::Object(body)))
            .await?;
        info!(order_id, "order modified");
        Ok(())
    }

    /// Cancel a single order.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, account_key: &str, order_id: &str) -> Result<()> {
        let path = format!("{}/{}", TRADE_ORDERS_PATH, order_id);
        let query = [("AccountKey", account_key.to_string())];
        self.transport.delete(&path, Some(&query)).await?;
        info!(order_id, "order cancelled");
        Ok(())
    }

    /// Cancel every order on the account for one instrument.
    #[instrument(skip(self))]
    pub async fn cancel_all_orders(
        &self,
        account_key: &str,
        asset_type: &str,
        uic: i64,
    ) -> Result<()> {
        let query = [
            ("AccountKey", account_key.to_string()),
            ("AssetType", asset_type.to_string()),
            ("Uic", uic.to_string()),
        ];
        self.transport
            .delete(TRADE_ORDERS_PATH, Some(&query))
            .await?;
        info!(account_key, asset_type, uic, "orders cancelled");
        Ok(())
    }

    /// Pre-trade check; validated and translated exactly like a real
    /// submission.
    pub async fn pre_check_order(&self, request: &OrderRequest) -> Result<PreCheckResult> {
        validate_order(&request.order_type, request.price, request.stop_limit)?;

        let body = order_body(
            &request.account_key,
            request.side,
            request.uic,
            request.quantity,
            &request.order_type,
            request.price,
            request.stop_limit,
            &request.options,
        );
        let payload = self.transport.post(TRADE_PRECHECK_PATH, Some(body)).await?;
        Ok(serde_json::from_value(payload)?)
    }
}

/// Reject malformed order parameters before anything touches the network.
fn validate_order(
    order_type: &OrderType,
    price: Option<Decimal>,
    stop_limit: Option<Decimal>,
) -> Result<()> {
    match order_type {
        OrderType::Stop if stop_limit.is_none() => Err(SaxoError::Validation(
            "stop orders require a stop-limit price".to_string(),
        )),
        OrderType::Market if price.is_some() || stop_limit.is_some() => Err(SaxoError::Validation(
            "market orders cannot carry a price".to_string(),
        )),
        OrderType::Limit | OrderType::StopLimit if price.is_none() => Err(SaxoError::Validation(
            "limit and stop-limit orders require a price".to_string(),
        )),
        OrderType::Other(raw) => Err(SaxoError::Validation(format!(
            "invalid order type: {}",
            raw
        ))),
        _ => Ok(()),
    }
}

/// Translate an order to the provider's shape. Optional fields appear on
/// the wire only when set; duration is omitted for market orders and
/// defaults to good-till-cancel otherwise.
#[allow(clippy::too_many_arguments)]
fn order_body(
    account_key: &str,
    side: OrderSide,
    uic: i64,
    quantity: Decimal,
    order_type: &OrderType,
    price: Option<Decimal>,
    stop_limit: Option<Decimal>,
    options: &OrderOptions,
) -> Value {
    let mut body = Map::new();
    body.insert("AccountKey".to_string(), json!(account_key));
    body.insert("Uic".to_string(), json!(uic));
    body.insert("BuySell".to_string(), json!(side.provider_name()));
    body.insert("Amount".to_string(), json!(quantity));
    body.insert("OrderType".to_string(), json!(order_type.provider_name()));
    body.insert(
        "ManualOrder".to_string(),
        json!(options.manual_order.unwrap_or(true)),
    );

    if let Some(price) = price {
        body.insert("OrderPrice".to_string(), json!(price));
    }
    if let Some(stop_limit) = stop_limit {
        body.insert("StopLimitPrice".to_string(), json!(stop_limit));
    }
    if !matches!(order_type, OrderType::Market) {
        body.insert(
            "OrderDuration".to_string(),
            json!({"DurationType": "GoodTillCancel"}),
        );
    }
    if let Some(asset_type) = &options.asset_type {
        body.insert("AssetType".to_string(), json!(asset_type));
    }
    if let Some(reference) = &options.external_reference {
        body.insert("ExternalReference".to_string(), json!(reference));
    }
    if let Some(force_open) = options.is_force_open {
        body.insert("IsForceOpen".to_string(), json!(force_open));
    }
    if let Some(step) = options.trailing_stop_step {
        body.insert("TrailingStopStep".to_string(), json!(step));
    }
    if let Some(distance) = options.trailing_stop_distance_to_market {
        body.insert(
            "TrailingStopDistanceToMarket".to_string(),
            json!(distance),
        );
    }

    Value::Object(body)
}
