//! Build dependency downloads
//!
//! Some repositories need files that live outside the checkout (shared
//! includes, generated specs). The metadata service lists them; the prepare
//! stage downloads them through a [`DependencyFetcher`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Downloads build dependency files
#[async_trait]
pub trait DependencyFetcher: Send + Sync {
    /// Returns the body of `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP implementation of DependencyFetcher
pub struct HttpDependencyFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpDependencyFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: autobuilder_client::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for HttpDependencyFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DependencyFetcher for HttpDependencyFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Failed to download {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to download {}: {} - {}", url, status, body);
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read {}", url))?;
        Ok(body.to_vec())
    }
}
