//! Authenticated JSON transport for the OpenAPI gateway.
//!
//! Every operation in the crate funnels through [`Transport::request`]: one
//! request, one response, no retries and no timeouts. Callers needing
//! either wrap the client externally.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, SaxoError};
use crate::normalize;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<Value>,
    ) -> Result<Value>;

    async fn get(&self, path: &str, query: Option<&[(&str, String)]>) -> Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value> {
        self.request(Method::POST, path, None, body).await
    }

    async fn patch(&self, path: &str, body: Option<Value>) -> Result<Value> {
        self.request(Method::PATCH, path, None, body).await
    }

    async fn delete(&self, path: &str, query: Option<&[(&str, String)]>) -> Result<Value> {
        self.request(Method::DELETE, path, query, None).await
    }
}

/// Bearer-token HTTP transport over the gateway base URL.
pub struct HttpTransport {
    http: Client,
    base_url: String,
    access_token: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, access_token: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("saxo-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let mut req = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.access_token);

        if let Some(query) = query {
            req = req.query(query);
        }

        if let Some(body) = body {
            req = req.json(&body);
        }

        debug!(%method, path, "issuing request");

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if text.trim().is_empty() {
            if status.is_success() {
                return Ok(Value::Null);
            }
            return Err(SaxoError::Transport {
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = match serde_json::from_str(&text) {
            Ok(payload) => payload,
            Err(err) => {
                if status.is_success() {
                    return Err(err.into());
                }
                return Err(SaxoError::Transport {
                    status: status.as_u16(),
                    body: text,
                });
            }
        };

        // A classified provider error wins over the bare status code.
        if let Some(err) = normalize::classify_error(&payload) {
            return Err(err);
        }

        if !status.is_success() {
            return Err(SaxoError::Transport {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(payload)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Scripted in-memory transport for unit tests.
    ///
    /// Responses are keyed by `"METHOD path"` and consumed in FIFO order;
    /// every request is recorded so tests can assert on what was (not)
    /// issued.
    #[derive(Default)]
    pub struct MockTransport {
        responses: Mutex<HashMap<String, VecDeque<Result<Value>>>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(&self, method: &str, path: &str, response: Result<Value>) {
            self.responses
                .lock()
                .unwrap()
                .entry(format!("{} {}", method, path))
                .or_default()
                .push_back(response);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn http_error(status: u16) -> SaxoError {
            SaxoError::Transport {
                status,
                body: String::new(),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn request(
            &self,
            method: Method,
            path: &str,
            query: Option<&[(&str, String)]>,
            _body: Option<Value>,
        ) -> Result<Value> {
            let key = format!("{} {}", method, path);

            let mut recorded = key.clone();
            if let Some(query) = query {
                let rendered: Vec<String> =
                    query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                recorded = format!("{}?{}", key, rendered.join("&"));
            }
            self.calls.lock().unwrap().push(recorded);

            match self
                .responses
                .lock()
                .unwrap()
                .get_mut(&key)
                .and_then(VecDeque::pop_front)
            {
                Some(response) => response,
                None => Err(SaxoError::Transport {
                    status: 599,
                    body: format!("no scripted response for {}", key),
                }),
            }
        }
    }
}
