//! HTTP fetch transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::LoaderConfig;
use crate::transport::{Fetch, FetchError, Result};

/// Fetches manifests and remote entries over HTTP(S).
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_attempts: u32,
}

impl HttpFetcher {
    /// Create a fetcher from loader configuration.
    pub fn new(config: &LoaderConfig) -> Self {
        Self::with_client(Client::new(), config.request_timeout(), config.max_attempts)
    }

    /// Create a fetcher around an existing reqwest client.
    pub fn with_client(client: Client, timeout: Duration, max_attempts: u32) -> Self {
        Self {
            client,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| classify(url, e))?;
        Ok(bytes.to_vec())
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < self.max_attempts => {
                    log::warn!(
                        "Fetch attempt {} for {} failed: {}, retrying...",
                        attempt,
                        url,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
