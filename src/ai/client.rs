use super::{ApiRequest, ApiResponse, ProxySettings, Transport};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// reqwest-backed transport. A client is built per attempt so the proxy
/// setting is an argument rather than ambient state.
pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn client_for(&self, proxy: &ProxySettings) -> Result<Client> {
        let builder = Client::builder().timeout(self.timeout);
        let builder = match &proxy.url {
            Some(url) => builder.proxy(
                reqwest::Proxy::all(url)
                    .map_err(|e| Error::Config(format!("Invalid proxy URL '{}': {}", url, e)))?,
            ),
            None => builder.no_proxy(),
        };
        Ok(builder.build()?)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest, proxy: &ProxySettings) -> Result<ApiResponse> {
        let client = self.client_for(proxy)?;

        let mut builder = client
            .post(&request.url)
            .header("Content-Type", "application/json")
            .json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("Failed to send request to {}: {}", request.url, e);
            Error::Network(e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!("API error (status {}): {}", status, body);
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}
