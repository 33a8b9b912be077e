//! HTTP transport seam
//!
//! All network traffic goes through the `Transport` trait so the token,
//! catalog and query logic can be exercised against in-memory fakes.

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::time::Duration;

use super::constants::USER_AGENT;
use super::error::{ArcgisError, Result};

/// Minimal JSON-over-HTTP surface the adapter needs
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` with the given query parameters and parse the body as JSON
    async fn get_json(&self, url: &str, params: &[(String, String)], timeout: Duration) -> Result<Value>;

    /// POST `form` url-encoded to `url` and parse the body as JSON
    async fn post_form(&self, url: &str, form: &[(String, String)], timeout: Duration) -> Result<Value>;
}

/// reqwest-backed transport with connection pooling
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(verify_tls: bool) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(!verify_tls)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ArcgisError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Wrap an already configured reqwest client
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    async fn read_response(url: &str, timeout: Duration, response: std::result::Result<reqwest::Response, reqwest::Error>) -> Result<Value> {
        let response = response.map_err(|e| map_send_error(url, timeout, e))?;
        let status = response.status();
        debug!("Response status from {}: {}", url, status);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ArcgisError::network(url, Some(status.as_u16()), text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| map_send_error(url, timeout, e))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str, params: &[(String, String)], timeout: Duration) -> Result<Value> {
        let response = self
            .http_client
            .get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .await;
        Self::read_response(url, timeout, response).await
    }

    async fn post_form(&self, url: &str, form: &[(String, String)], timeout: Duration) -> Result<Value> {
        let response = self
            .http_client
            .post(url)
            .form(form)
            .timeout(timeout)
            .send()
            .await;
        Self::read_response(url, timeout, response).await
    }
}

fn map_send_error(url: &str, timeout: Duration, error: reqwest::Error) -> ArcgisError {
    if error.is_timeout() {
        ArcgisError::Timeout {
            endpoint: url.to_string(),
            seconds: timeout.as_secs(),
        }
    } else {
        ArcgisError::network(url, error.status().map(|s| s.as_u16()), error.to_string())
    }
}
