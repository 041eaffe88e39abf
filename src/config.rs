use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// OpenAPI gateway for the simulation environment.
pub const SIM_API_ENDPOINT: &str = "https://gateway.saxobank.com/sim/openapi";

/// Authorization endpoint for the simulation environment.
pub const SIM_AUTH_ENDPOINT: &str = "https://sim.logonvalidation.net";

/// Per-client configuration.
///
/// Every client owns its own resolved config; there is no process-wide
/// state. Endpoints default to the simulation environment when omitted.
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// Application key issued by the developer portal
    pub app_key: String,
    /// Application secret, used only for the token exchange
    pub app_secret: String,
    /// Redirect URI registered for the application
    pub redirect_uri: String,
    /// OpenAPI gateway base URL
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Authorization base URL
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,
}

fn default_api_endpoint() -> String {
    SIM_API_ENDPOINT.to_string()
}

fn default_auth_endpoint() -> String {
    SIM_AUTH_ENDPOINT.to_string()
}

impl AppConfig {
    /// Create a configuration targeting the simulation environment.
    pub fn new(app_key: &str, app_secret: &str, redirect_uri: &str) -> Self {
        Self {
            app_key: app_key.to_string(),
            app_secret: app_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            api_endpoint: default_api_endpoint(),
            auth_endpoint: default_auth_endpoint(),
        }
    }

    /// Load configuration from `config/` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory.
    ///
    /// Environment variables override file values
    /// (`SAXO_APP_KEY`, `SAXO_API_ENDPOINT`, etc.). The loaded value is
    /// still passed explicitly to [`crate::Client::connect`].
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("api_endpoint", SIM_API_ENDPOINT)?
            .set_default("auth_endpoint", SIM_AUTH_ENDPOINT)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(Environment::with_prefix("SAXO").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.app_key.trim().is_empty() {
            errors.push("app_key must not be empty".to_string());
        }
        if self.app_secret.trim().is_empty() {
            errors.push("app_secret must not be empty".to_string());
        }
        if url::Url::parse(&self.redirect_uri).is_err() {
            errors.push(format!("redirect_uri is not a valid URL: {}", self.redirect_uri));
        }
        if url::Url::parse(&self.api_endpoint).is_err() {
            errors.push(format!("api_endpoint is not a valid URL: {}", self.api_endpoint));
        }
        if url::Url::parse(&self.auth_endpoint).is_err() {
            errors.push(format!("auth_endpoint is not a valid URL: {}", self.auth_endpoint));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("api_endpoint", &self.api_endpoint)
            .field("auth_endpoint", &self.auth_endpoint)
            .finish()
    }
}

/// Caller credentials, consumed once at client construction.
///
/// The account variant runs the full login flow; the token variant skips it
/// and uses the given access token directly.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum Credentials {
    Account { username: String, password: String },
    Token { token: String },
}

impl Credentials {
    pub fn account(username: &str, password: &str) -> Self {
        Self::Account {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn token(token: &str) -> Self {
        Self::Token {
            token: token.to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account { username, .. } => f
                .debug_struct("Credentials::Account")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token { .. } => f
                .debug_struct("Credentials::Token")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_to_simulation_endpoints() {
        let config = AppConfig::new("key", "secret", "http://localhost/callback");
        assert_eq!(config.api_endpoint, SIM_API_ENDPOINT);
        assert_eq!(config.auth_endpoint, SIM_AUTH_ENDPOINT);
    }

    #[test]
    fn validate_rejects_bad_redirect_uri() {
        let mut config = AppConfig::new("key", "secret", "not a url");
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("redirect_uri")));

        config.redirect_uri = "http://localhost/callback".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AppConfig::new("key", "supersecret", "http://localhost/callback");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("supersecret"));

        let creds = Credentials::account("user", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));

        let creds = Credentials::token("tok-123");
        assert!(!format!("{:?}", creds).contains("tok-123"));
    }
}
