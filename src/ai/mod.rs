//! Outbound calls to Google's image-generation APIs
//!
//! Requests are built per vendor ([`imagen`], [`gemini`]) into a plain
//! [`ApiRequest`] and sent through a [`Transport`]. A network-level failure is
//! retried at most once with an alternate proxy setting.

pub mod client;
pub mod gemini;
pub mod imagen;
pub mod mime;
pub mod mock;

pub use client::HttpTransport;
pub use gemini::GeminiApi;
pub use imagen::ImagenApi;
pub use mock::MockTransport;

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A fully built vendor request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Raw vendor response; the body is kept as text so error pages that are not
/// JSON can still be reported.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// How the transport reaches the network for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
    /// Proxy URL, or `None` for a direct connection.
    pub url: Option<String>,
}

impl ProxySettings {
    pub fn direct() -> Self {
        Self { url: None }
    }

    pub fn via(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    pub fn describe(&self) -> &str {
        self.url.as_deref().unwrap_or("direct")
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`. Non-success statuses are returned as responses; only
    /// failures to complete the exchange are errors.
    async fn send(&self, request: &ApiRequest, proxy: &ProxySettings) -> Result<ApiResponse>;
}

/// Response plus the proxy setting that produced it.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub response: ApiResponse,
    pub proxy: ProxySettings,
    pub used_fallback: bool,
}

/// Sends once with `primary`; on a network error, sends exactly once more with
/// `alternate` when one is given and differs from `primary`.
pub async fn send_with_proxy_fallback(
    transport: &dyn Transport,
    request: &ApiRequest,
    primary: &ProxySettings,
    alternate: Option<&ProxySettings>,
) -> Result<SendOutcome> {
    tracing::debug!("Sending request to {} ({})", request.url, primary.describe());

    let err = match transport.send(request, primary).await {
        Ok(response) => {
            return Ok(SendOutcome {
                response,
                proxy: primary.clone(),
                used_fallback: false,
            })
        }
        Err(e) => e,
    };

    let alternate = match alternate {
        Some(alternate) if err.is_network() && alternate != primary => alternate,
        _ => return Err(err),
    };

    tracing::warn!(
        "Request failed ({}); retrying once via {}",
        err,
        alternate.describe()
    );
    let response = transport.send(request, alternate).await?;
    Ok(SendOutcome {
        response,
        proxy: alternate.clone(),
        used_fallback: true,
    })
}
