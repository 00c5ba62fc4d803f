//! HTTP JSON source

use std::time::Duration;

use async_trait::async_trait;
use eyre::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::SourceConfig;
use crate::coordinator::{Fetch, FetchError};

/// Polls a URL and yields its JSON body
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    pointer: Option<String>,
    http: Client,
}

impl HttpSource {
    /// Build a source from configuration
    ///
    /// `connect_timeout` bounds connection setup only; the coordinator's
    /// fetch timeout bounds the whole request.
    pub fn from_config(config: &SourceConfig, connect_timeout: Duration) -> Result<Self> {
        debug!(?config, "HttpSource::from_config: called");
        let url = config
            .url
            .clone()
            .ok_or_else(|| eyre::eyre!("No source URL configured. Pass --url or set source.url in the config file."))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).context(format!("Invalid header name: {name}"))?;
            let value = HeaderValue::from_str(value).context(format!("Invalid value for header {name}"))?;
            headers.insert(name, value);
        }

        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .default_headers(headers)
            .user_agent(concat!("uc/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            url,
            pointer: config.pointer.clone(),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn select(&self, body: Value) -> Result<Value, FetchError> {
        match &self.pointer {
            None => Ok(body),
            Some(pointer) => body
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| FetchError::update_failed(format!("No value at {pointer} in response from {}", self.url))),
        }
    }
}

#[async_trait]
impl Fetch<Value> for HttpSource {
    async fn fetch(&self) -> Result<Value, FetchError> {
        debug!(url = %self.url, "HttpSource::fetch: called");
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::update_failed(format!("Error requesting {}: {e}", self.url)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(%status, "HttpSource::fetch: credentials rejected");
            return Err(FetchError::auth_failed(format!("{} returned {status}", self.url)));
        }
        if !status.is_success() {
            debug!(%status, "HttpSource::fetch: error status");
            return Err(FetchError::update_failed(format!("{} returned {status}", self.url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::update_failed(format!("Error reading response from {}: {e}", self.url)))?;

        let body: Value = serde_json::from_slice(&bytes)
            .context(format!("Invalid JSON from {}", self.url))
            .map_err(FetchError::unexpected)?;

        self.select(body)
    }
}
