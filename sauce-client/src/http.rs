//! HTTP side of the client: one GET per RPC call

use async_trait::async_trait;
use sauce_core::{Error, Result};
use url::Url;

/// Base-address-relative GET returning the body text
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `path` (absolute path, resolved against the base address)
    ///
    /// Non-success statuses are errors.
    async fn get_text(&self, path: &str) -> Result<String>;
}

/// [`HttpTransport`] backed by a `reqwest::Client`
///
/// Closing happens on drop, once per instance.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Transport with a default rustls client
    pub fn new(base_url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Transport sharing an existing client (pool, proxy, timeouts)
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_text(&self, path: &str) -> Result<String> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| Error::InvalidUrl(e.to_string()))?;

        tracing::debug!(url = %url, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Http(e.to_string()))?;

        response.text().await.map_err(|e| Error::Http(e.to_string()))
    }
}
