//! HTTP client for calls to the document store and identity service

use crate::config::OutgoingSettings;
use anyhow::Result;
use reqwest::{Client, Method, RequestBuilder};
use std::time::Duration;
use url::Url;

/// HTTP client wrapper with storefront-specific configuration
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(settings.request_timeout)
            .map_err(|e| anyhow::anyhow!("invalid outgoing.request_timeout: {}", e))?;
        let mut builder = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(settings.pool_maxsize)
            .gzip(true);

        if let Some(ref proxy_url) = settings.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            default_timeout: timeout,
            user_agent: format!("storefront/{}", crate::VERSION),
        })
    }

    /// Start a request with the default headers applied
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .timeout(self.default_timeout)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json")
    }

    /// Per-request timeout applied to every call
    pub fn timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Get current user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_settings_timeout_applied() {
        let settings = OutgoingSettings {
            request_timeout: 2.5,
            ..Default::default()
        };
        let client = HttpClient::with_settings(&settings).unwrap();
        assert_eq!(client.timeout(), Duration::from_millis(2500));
        assert!(client.user_agent().starts_with("storefront/"));
    }
}
