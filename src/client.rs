//! Client facade: session construction and the per-account object graph.
//!
//! The facade is thin: credentials resolve to a token once, the caller
//! identity is fetched once, and every data call after that is a fresh
//! request. Nothing is cached between calls.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth;
use crate::config::{AppConfig, Credentials};
use crate::domain::{
    Balance, ClosedPosition, NetPosition, Order, OrderOptions, OrderOutcome, OrderRequest,
    OrderSide, OrderType, Position, PreCheckResult,
};
use crate::error::Result;
use crate::normalize;
use crate::orders::{OrderGateway, PORT_ORDERS_PATH, PORT_POSITIONS_PATH};
use crate::transport::{HttpTransport, Transport};

const CLIENTS_ME_PATH: &str = "/port/v1/clients/me";
const ACCOUNTS_ME_PATH: &str = "/port/v1/accounts/me";
const BALANCES_PATH: &str = "/port/v1/balances";
const NET_POSITIONS_PATH: &str = "/port/v1/netpositions";
const CLOSED_POSITIONS_PATH: &str = "/port/v1/closedpositions";
const EXPOSURE_PATH: &str = "/port/v1/exposure";

/// Resolved session. Exactly one per client, immutable, never renewed.
#[derive(Clone)]
pub struct Session {
    access_token: String,
    pub client_id: String,
    pub client_key: String,
    pub name: Option<String>,
}

impl Session {
    /// Token every request is authenticated with.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_key", &self.client_key)
            .field("name", &self.name)
            .finish()
    }
}

struct ClientCore {
    transport: Arc<dyn Transport>,
    session: Session,
    gateway: OrderGateway,
    config: Option<AppConfig>,
}

impl ClientCore {
    /// Fetch a list endpoint, "me"-scoped when no account is given.
    async fn list(
        &self,
        base: &str,
        account_key: Option<&str>,
        extra: &[(&str, String)],
    ) -> Result<Value> {
        match account_key {
            None => {
                let path = format!("{}/me", base);
                let query = if extra.is_empty() { None } else { Some(extra) };
                self.transport.get(&path, query).await
            }
            Some(key) => {
                let mut query: Vec<(&str, String)> = vec![
                    ("ClientKey", self.session.client_key.clone()),
                    ("AccountKey", key.to_string()),
                ];
                query.extend(extra.iter().map(|(k, v)| (*k, v.clone())));
                self.transport.get(base, Some(query.as_slice())).await
            }
        }
    }
}

/// Swallow a read failure into an empty result. Only the client-level list
/// reads do this; mutations and balance/precheck propagate.
fn lenient<T>(what: &str, result: Result<Vec<T>>) -> Vec<T> {
    match result {
        Ok(items) => items,
        Err(err) => {
            warn!(error = %err, "{} fetch failed, returning empty", what);
            Vec::new()
        }
    }
}

/// Authenticated API client.
pub struct Client {
    core: Arc<ClientCore>,
}

impl Client {
    /// Resolve credentials and establish a session.
    ///
    /// The account variant runs the full login flow; the token variant
    /// uses the token as-is. Any failure aborts construction entirely.
    pub async fn connect(config: AppConfig, credentials: Credentials) -> Result<Self> {
        let access_token = match &credentials {
            Credentials::Token { token } => token.clone(),
            Credentials::Account { username, password } => {
                info!("no token provided, running login flow");
                auth::authenticate(username, password, &config).await?.access_token
            }
        };

        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config.api_endpoint, &access_token)?);
        Self::with_transport(transport, Some(config), access_token).await
    }

    /// Build a client over an existing transport; shared by `connect` and
    /// the tests.
    pub(crate) async fn with_transport(
        transport: Arc<dyn Transport>,
        config: Option<AppConfig>,
        access_token: String,
    ) -> Result<Self> {
        let me = transport.get(CLIENTS_ME_PATH, None).await?;

        let client_id = normalize::str_at(&me, &["ClientId"])
            .ok_or_else(|| anyhow::anyhow!("clients/me response carried no ClientId"))?;
        let client_key = normalize::str_at(&me, &["ClientKey"])
            .ok_or_else(|| anyhow::anyhow!("clients/me response carried no ClientKey"))?;
        let name = normalize::str_at(&me, &["Name"]);

        info!(%client_id, "session established");

        let gateway = OrderGateway::new(transport.clone(), &client_key);
        let session = Session {
            access_token,
            client_id,
            client_key,
            name,
        };

        Ok(Self {
            core: Arc::new(ClientCore {
                transport,
                session,
                gateway,
                config,
            }),
        })
    }

    pub fn id(&self) -> &str {
        &self.core.session.client_id
    }

    pub fn key(&self) -> &str {
        &self.core.session.client_key
    }

    pub fn name(&self) -> Option<&str> {
        self.core.session.name.as_deref()
    }

    pub fn session(&self) -> &Session {
        &self.core.session
    }

    /// Configuration this client was constructed with, when built via
    /// [`Client::connect`].
    pub fn config(&self) -> Option<&AppConfig> {
        self.core.config.as_ref()
    }

    /// Accounts owned by the caller. Fetched fresh on every call.
    pub async fn get_accounts(&self) -> Result<Vec<Account>> {
        let payload = self.core.transport.get(ACCOUNTS_ME_PATH, None).await?;
        Ok(normalize::data_rows(&payload)
            .iter()
            .filter_map(|raw| self.account_from(raw))
            .collect())
    }

    fn account_from(&self, raw: &Value) -> Option<Account> {
        Some(Account {
            id: normalize::str_at(raw, &["AccountId"])?,
            key: normalize::str_at(raw, &["AccountKey"])?,
            active: normalize::bool_at(raw, &["Active"]).unwrap_or(true),
            currency: normalize::str_at(raw, &["Currency"]),
            core: self.core.clone(),
        })
    }

    pub async fn get_positions(&self, account_key: Option<&str>) -> Vec<Position> {
        lenient(
            "positions",
            self.core
                .list(PORT_POSITIONS_PATH, account_key, &[])
                .await
                .map(|p| normalize::map_positions(&p)),
        )
    }

    pub async fn get_orders(&self, account_key: Option<&str>) -> Vec<Order> {
        lenient(
            "orders",
            self.core
                .list(PORT_ORDERS_PATH, account_key, &[])
                .await
                .map(|p| normalize::map_orders(&p)),
        )
    }

    pub async fn get_net_positions(&self, account_key: Option<&str>) -> Vec<NetPosition> {
        lenient(
            "net positions",
            self.core
                .list(NET_POSITIONS_PATH, account_key, &[])
                .await
                .map(|p| normalize::map_net_positions(&p)),
        )
    }

    /// Closed positions, optionally restricted to a time range.
    pub async fn get_closed_positions(
        &self,
        account_key: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<ClosedPosition> {
        let mut extra = Vec::new();
        if let Some(from) = from {
            extra.push((
                "FromDateTime",
                from.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        if let Some(to) = to {
            extra.push(("ToDateTime", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        lenient(
            "closed positions",
            self.core
                .list(CLOSED_POSITIONS_PATH, account_key, &extra)
                .await
                .map(|p| normalize::map_closed_positions(&p)),
        )
    }

    /// Net exposure rows, passed through unnormalized.
    pub async fn get_exposure(&self, account_key: Option<&str>) -> Vec<Value> {
        lenient(
            "exposure",
            self.core
                .list(EXPOSURE_PATH, account_key, &[])
                .await
                .map(|p| normalize::data_rows(&p).to_vec()),
        )
    }

    /// Pre-trade check; propagates failures.
    pub async fn pre_check_order(&self, request: &OrderRequest) -> Result<PreCheckResult> {
        self.core.gateway.pre_check_order(request).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.core.session.client_id)
            .field("key", &self.core.session.client_key)
            .field("name", &self.core.session.name)
            .finish()
    }
}

/// One account of the caller, with trading operations bound to its key.
#[derive(Clone)]
pub struct Account {
    pub id: String,
    pub key: String,
    pub active: bool,
    pub currency: Option<String>,
    core: Arc<ClientCore>,
}

impl Account {
    /// Balance snapshot; propagates failures.
    pub async fn get_balance(&self) -> Result<Balance> {
        let query = [
            ("ClientKey", self.core.session.client_key.clone()),
            ("AccountKey", self.key.clone()),
        ];
        let payload = self
            .core
            .transport
            .get(BALANCES_PATH, Some(&query))
            .await?;
        Ok(normalize::map_balance(&payload))
    }

    pub async fn get_positions(&self) -> Vec<Position> {
        lenient(
            "account positions",
            self.core.gateway.account_positions(&self.key).await,
        )
    }

    pub async fn get_orders(&self) -> Vec<Order> {
        lenient(
            "account orders",
            self.core.gateway.account_orders(&self.key).await,
        )
    }

    pub async fn buy(
        &self,
        uic: i64,
        quantity: Decimal,
        order_type: OrderType,
        price: Option<Decimal>,
        stop_limit: Option<Decimal>,
        options: &OrderOptions,
    ) -> Result<OrderOutcome> {
        self.core
            .gateway
            .create_order(
                &self.key,
                OrderSide::Buy,
                uic,
                quantity,
                order_type,
                price,
                stop_limit,
                options,
            )
            .await
    }

    pub async fn sell(
        &self,
        uic: i64,
        quantity: Decimal,
        order_type: OrderType,
        price: Option<Decimal>,
        stop_limit: Option<Decimal>,
        options: &OrderOptions,
    ) -> Result<OrderOutcome> {
        self.core
            .gateway
            .create_order(
                &self.key,
                OrderSide::Sell,
                uic,
                quantity,
                order_type,
                price,
                stop_limit,
                options,
            )
            .await
    }

    pub async fn modify_order(
        &self,
        order_id: &str,
        price: Option<Decimal>,
        quantity: Option<Decimal>,
    ) -> Result<()> {
        self.core
            .gateway
            .modify_order(&self.key, order_id, price, quantity)
            .await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.core.gateway.cancel_order(&self.key, order_id).await
    }

    pub async fn cancel_all_orders(&self, asset_type: &str, uic: i64) -> Result<()> {
        self.core
            .gateway
            .cancel_all_orders(&self.key, asset_type, uic)
            .await
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("active", &self.active)
            .field("currency", &self.currency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SaxoError;
    use crate::transport::mock::MockTransport;
    use rust_decimal_macros::dec;
    use serde_json::json;

    async fn client_with(mock: Arc<MockTransport>) -> Client {
        mock.on(
            "GET",
            CLIENTS_ME_PATH,
            Ok(json!({"ClientId": "C1", "ClientKey": "K1", "Name": "Jane Trader"})),
        );
        Client::with_transport(mock, None, "token".to_string())
            .await
            .expect("client construction")
    }

    fn script_accounts(mock: &MockTransport) {
        mock.on(
            "GET",
            ACCOUNTS_ME_PATH,
            Ok(json!({"Data": [
                {"AccountId": "A1", "AccountKey": "AK1", "Active": true, "Currency": "EUR"},
                {"AccountId": "A2", "AccountKey": "AK2", "Active": false, "Currency": "USD"}
            ]})),
        );
    }

    #[tokio::test]
    async fn token_credential_seeds_the_session_from_clients_me() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock).await;

        assert_eq!(client.id(), "C1");
        assert_eq!(client.key(), "K1");
        assert_eq!(client.name(), Some("Jane Trader"));
    }

    #[tokio::test]
    async fn construction_fails_when_identity_is_missing() {
        let mock = Arc::new(MockTransport::new());
        mock.on("GET", CLIENTS_ME_PATH, Ok(json!({"Name": "No ids"})));

        let err = Client::with_transport(mock, None, "token".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, SaxoError::Other(_)));
    }

    #[tokio::test]
    async fn accounts_are_mapped_from_the_data_envelope() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock.clone()).await;
        script_accounts(&mock);

        let accounts = client.get_accounts().await.expect("accounts");
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, "A1");
        assert_eq!(accounts[0].key, "AK1");
        assert!(accounts[0].active);
        assert_eq!(accounts[1].currency.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn list_reads_swallow_failures_into_empty() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock.clone()).await;

        mock.on(
            "GET",
            "/port/v1/positions/me",
            Err(MockTransport::http_error(500)),
        );
        mock.on(
            "GET",
            "/port/v1/orders/me",
            Err(MockTransport::http_error(500)),
        );
        mock.on(
            "GET",
            "/port/v1/netpositions/me",
            Err(MockTransport::http_error(500)),
        );
        mock.on(
            "GET",
            "/port/v1/closedpositions/me",
            Err(MockTransport::http_error(500)),
        );
        mock.on(
            "GET",
            "/port/v1/exposure/me",
            Err(MockTransport::http_error(500)),
        );

        assert!(client.get_positions(None).await.is_empty());
        assert!(client.get_orders(None).await.is_empty());
        assert!(client.get_net_positions(None).await.is_empty());
        assert!(client.get_closed_positions(None, None, None).await.is_empty());
        assert!(client.get_exposure(None).await.is_empty());
    }

    #[tokio::test]
    async fn account_scoped_reads_carry_client_and_account_keys() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock.clone()).await;

        mock.on("GET", "/port/v1/positions", Ok(json!({"Data": []})));
        client.get_positions(Some("AK1")).await;

        assert!(mock
            .calls()
            .iter()
            .any(|call| call == "GET /port/v1/positions?ClientKey=K1&AccountKey=AK1"));
    }

    #[tokio::test]
    async fn closed_positions_pass_the_time_range_through() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock.clone()).await;

        mock.on("GET", "/port/v1/closedpositions", Ok(json!({"Data": []})));
        let from = "2024-03-01T00:00:00Z".parse().unwrap();
        let to = "2024-03-31T00:00:00Z".parse().unwrap();
        client
            .get_closed_positions(Some("AK1"), Some(from), Some(to))
            .await;

        let calls = mock.calls();
        let call = calls.last().expect("one call");
        assert!(call.contains("FromDateTime=2024-03-01T00:00:00Z"));
        assert!(call.contains("ToDateTime=2024-03-31T00:00:00Z"));
    }

    #[tokio::test]
    async fn balance_propagates_failures() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock.clone()).await;
        script_accounts(&mock);
        let accounts = client.get_accounts().await.expect("accounts");

        mock.on("GET", BALANCES_PATH, Err(MockTransport::http_error(500)));
        let err = accounts[0].get_balance().await.unwrap_err();
        assert!(matches!(err, SaxoError::Transport { status: 500, .. }));
    }

    #[tokio::test]
    async fn balance_surfaces_classified_api_errors() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock.clone()).await;
        script_accounts(&mock);
        let accounts = client.get_accounts().await.expect("accounts");

        mock.on(
            "GET",
            BALANCES_PATH,
            Err(SaxoError::Api {
                code: "X".to_string(),
                message: "bad".to_string(),
                model_state: None,
            }),
        );

        match accounts[0].get_balance().await.unwrap_err() {
            SaxoError::Api { code, message, .. } => {
                assert_eq!(code, "X");
                assert_eq!(message, "bad");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn balance_maps_the_provider_fields() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock.clone()).await;
        script_accounts(&mock);
        let accounts = client.get_accounts().await.expect("accounts");

        mock.on(
            "GET",
            BALANCES_PATH,
            Ok(json!({
                "CashBalance": 1000.0,
                "CashAvailableForTrading": 900.0,
                "TotalValue": 1100.0,
                "Currency": "EUR"
            })),
        );

        let balance = accounts[0].get_balance().await.expect("balance");
        assert_eq!(balance.cash_balance, Some(dec!(1000.0)));
        assert_eq!(balance.cash_available, Some(dec!(900.0)));
        assert_eq!(balance.currency.as_deref(), Some("EUR"));
    }

    #[tokio::test]
    async fn account_reads_are_lenient_too() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock.clone()).await;
        script_accounts(&mock);
        let accounts = client.get_accounts().await.expect("accounts");

        mock.on(
            "GET",
            "/port/v1/positions",
            Err(MockTransport::http_error(500)),
        );
        mock.on(
            "GET",
            "/port/v1/orders",
            Err(MockTransport::http_error(500)),
        );

        assert!(accounts[0].get_positions().await.is_empty());
        assert!(accounts[0].get_orders().await.is_empty());
    }

    #[test]
    fn session_debug_redacts_the_token() {
        let session = Session {
            access_token: "secret-token".to_string(),
            client_id: "C1".to_string(),
            client_key: "K1".to_string(),
            name: None,
        };
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("C1"));
    }
}
