pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod normalize;
pub mod orders;
pub mod transport;

pub use auth::TokenResponse;
pub use client::{Account, Client, Session};
pub use config::{AppConfig, Credentials, SIM_API_ENDPOINT, SIM_AUTH_ENDPOINT};
pub use domain::{
    Balance, ClosedPosition, NetPosition, Order, OrderOptions, OrderOutcome, OrderRequest,
    OrderSide, OrderStatus, OrderType, Position, PositionStatus, PreCheckResult,
};
pub use error::{AuthError, Result, SaxoError};
pub use orders::OrderGateway;
pub use transport::{HttpTransport, Transport};
