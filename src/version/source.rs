//! Version source trait and the HTTP registry implementation.
//!
//! `VersionSource` abstracts the network call for testability.
//! `HttpVersionSource` talks to an npm-compatible registry over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde_json::Value;

use crate::config::HttpConfig;
use crate::error::Result;

/// Outcome of a registry read.
///
/// `status_code` is 0 on success. Transport failures use -1 and non-2xx
/// responses carry the HTTP status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResponse {
    pub status_code: i32,
    pub body: Option<Value>,
    pub error_message: Option<String>,
}

impl FetchResponse {
    /// A successful read with a JSON body.
    pub fn ok(body: Value) -> Self {
        Self {
            status_code: 0,
            body: Some(body),
            error_message: None,
        }
    }

    /// A failed read.
    pub fn failed(status_code: i32, message: impl Into<String>) -> Self {
        Self {
            status_code,
            body: None,
            error_message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == 0
    }
}

/// Where "latest published version" information comes from.
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Read `url`. Never fails; problems are reported in the response.
    async fn fetch(&self, url: &str) -> FetchResponse;
}

/// Registry client over HTTP.
pub struct HttpVersionSource {
    client: reqwest::Client,
}

impl HttpVersionSource {
    /// Build a client, with an optional request timeout.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("autoupdate/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_config(http: &HttpConfig) -> Result<Self> {
        Self::new(http.timeout())
    }
}

#[async_trait]
impl VersionSource for HttpVersionSource {
    async fn fetch(&self, url: &str) -> FetchResponse {
        let response = match self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchResponse::failed(-1, e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchResponse::failed(i32::from(status.as_u16()), format!("HTTP {}", status));
        }

        match response.json::<Value>().await {
            Ok(body) => FetchResponse::ok(body),
            Err(e) => FetchResponse::failed(-1, format!("invalid JSON body: {}", e)),
        }
    }
}
