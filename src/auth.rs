//! Browserless authorization-code login.
//!
//! The provider has no headless grant: the flow walks the real login pages
//! by hand. Each step's request is built from the previous response's
//! headers, so the sequence is strictly ordered and never parallelized or
//! retried; the first irregular response aborts the whole flow.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE};
use reqwest::Response;
use serde::Deserialize;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::AuthError;

/// Host suffix the authorize redirect must land on.
const LOGIN_HOST_SUFFIX: &str = "logonvalidation.net";

/// Token endpoint response.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Run the login flow and exchange the resulting authorization code for an
/// access token.
pub async fn authenticate(
    username: &str,
    password: &str,
    config: &AppConfig,
) -> Result<TokenResponse, AuthError> {
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(concat!("saxo-client/", env!("CARGO_PKG_VERSION")))
        .build()?;

    // Correlation value for the authorize exchange. The provider is not
    // observed to echo it back, and the flow does not check for it.
    let state = Uuid::new_v4().simple().to_string();

    let authorize = authorize_url(config, &state)?;
    debug!(url = %authorize, "requesting authorization code");
    let resp = http.get(authorize).send().await?;

    let location = location_header(&resp);
    let parsed = location.as_deref().and_then(|l| Url::parse(l).ok());
    let login_url = match parsed {
        Some(url) if is_login_host(&url) => url,
        _ => return Err(AuthError::UnexpectedRedirect { location }),
    };

    debug!(host = ?login_url.host_str(), "submitting login form");
    let now = Utc::now().timestamp_millis().to_string();
    let form = [
        ("PageLoadInfo", now.clone()),
        ("LoginSubmitTime", now),
        ("field_userid", username.to_string()),
        ("field_password", password.to_string()),
        ("Platform", "MacIntel".to_string()),
        ("IsMobile", "false".to_string()),
        ("Locality", "en-GB".to_string()),
        ("field_isSrp", "false".to_string()),
    ];
    let login_resp = http.post(login_url.clone()).form(&form).send().await?;

    let redirect = location_header(&login_resp).ok_or(AuthError::LoginFailed)?;
    let cookie = login_resp
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    // The redirect may be relative to the login host.
    let redirect_url = login_url
        .join(&redirect)
        .map_err(|_| AuthError::LoginFailed)?;

    debug!("following post-login redirect");
    let follow = http.get(redirect_url).header(COOKIE, cookie).send().await?;

    let final_location = location_header(&follow).ok_or(AuthError::NoAuthCode)?;
    let code = extract_code(&final_location).ok_or(AuthError::NoAuthCode)?;

    exchange_code(&http, config, &code).await
}

/// Exchange an authorization code for a token, authenticating with HTTP
/// Basic `app_key:app_secret`.
async fn exchange_code(
    http: &reqwest::Client,
    config: &AppConfig,
    code: &str,
) -> Result<TokenResponse, AuthError> {
    let token_url = format!("{}/token", config.auth_endpoint.trim_end_matches('/'));
    let basic = BASE64_STANDARD.encode(format!("{}:{}", config.app_key, config.app_secret));

    debug!("exchanging authorization code for token");
    let resp = http
        .post(&token_url)
        .header(AUTHORIZATION, format!("Basic {}", basic))
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
        ])
        .send()
        .await?;

    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(AuthError::TokenExchange {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|err| AuthError::TokenExchange {
        status: status.as_u16(),
        body: format!("unparsable token response: {}", err),
    })
}

fn location_header(resp: &Response) -> Option<String> {
    resp.headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn authorize_url(config: &AppConfig, state: &str) -> Result<Url, AuthError> {
    Url::parse_with_params(
        &format!("{}/authorize", config.auth_endpoint.trim_end_matches('/')),
        &[
            ("response_type", "code"),
            ("client_id", config.app_key.as_str()),
            ("state", state),
            ("redirect_uri", config.redirect_uri.as_str()),
        ],
    )
    .map_err(|err| AuthError::Endpoint(err.to_string()))
}

fn is_login_host(url: &Url) -> bool {
    match url.host_str() {
        Some(host) => {
            host == LOGIN_HOST_SUFFIX || host.ends_with(&format!(".{}", LOGIN_HOST_SUFFIX))
        }
        None => false,
    }
}

/// Pull the `code` query parameter out of a redirect location.
fn extract_code(location: &str) -> Option<String> {
    let url = Url::parse(location)
        .or_else(|_| Url::parse(&format!("http://localhost/{}", location.trim_start_matches('/'))))
        .ok()?;

    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
}
