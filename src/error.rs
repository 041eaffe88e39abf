use serde_json::Value;
use thiserror::Error;

/// Errors raised by the browserless login flow.
///
/// Each variant maps to one step of the authorization-code exchange; the
/// flow is strict and never retried, so the first failure aborts client
/// construction.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid auth endpoint: {0}")]
    Endpoint(String),

    #[error("authorize request did not redirect to the login host (location: {location:?})")]
    UnexpectedRedirect { location: Option<String> },

    #[error("login was not accepted: no redirect returned")]
    LoginFailed,

    #[error("no authorization code in the post-login redirect")]
    NoAuthCode,

    #[error("token exchange failed: status={status} body={body}")]
    TokenExchange { status: u16, body: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Main error type for the client
#[derive(Error, Debug)]
pub enum SaxoError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Authentication errors (fatal to client construction)
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    // Malformed order parameters; rejected before any request is issued
    #[error("Validation failed: {0}")]
    Validation(String),

    // Classified provider error payloads
    #[error("API error {code}: {message}")]
    Api {
        code: String,
        message: String,
        model_state: Option<Value>,
    },

    // Modify/cancel target absent from the provider's current order list
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("Order submission failed: {0}")]
    Submission(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Non-2xx with no classifiable payload
    #[error("Unexpected response: status={status} body={body}")]
    Transport { status: u16, body: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for SaxoError
pub type Result<T> = std::result::Result<T, SaxoError>;
