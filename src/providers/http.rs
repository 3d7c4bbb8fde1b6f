use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::config::ProviderConfig;
use crate::core::error::{FeedError, Result};
use crate::core::payload::RawPayload;
use crate::core::provider::ProviderClient;
use crate::providers::util::{is_transient, with_retry};

/// Talks to the provider over plain HTTP: `POST` for setup, `GET` for data.
pub struct HttpProviderClient {
    client: reqwest::Client,
    setup_url: String,
    latest_url: String,
    retries: usize,
    retry_delay: Duration,
}

impl HttpProviderClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("oraclefeed/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;
        let base_url = config.base_url.trim_end_matches('/');

        Ok(HttpProviderClient {
            client,
            setup_url: format!("{}{}", base_url, config.setup_path),
            latest_url: format!("{}{}", base_url, config.latest_path),
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    #[instrument(name = "ProviderSetup", skip(self), fields(url = %self.setup_url))]
    async fn setup(&self) -> Result<()> {
        let response = with_retry(
            || async { self.client.post(&self.setup_url).send().await },
            self.retries,
            self.retry_delay,
            is_transient,
        )
        .await
        .map_err(|e| FeedError::Setup(format!("Request error: {} URL: {}", e, self.setup_url)))?;

        if !response.status().is_success() {
            return Err(FeedError::Setup(format!(
                "HTTP error: {} URL: {}",
                response.status(),
                self.setup_url
            )));
        }

        debug!("Provider setup complete");
        Ok(())
    }

    #[instrument(name = "ProviderFetch", skip(self), fields(url = %self.latest_url))]
    async fn get_latest_data(&self) -> Result<RawPayload> {
        let response = with_retry(
            || async { self.client.get(&self.latest_url).send().await },
            self.retries,
            self.retry_delay,
            is_transient,
        )
        .await
        .map_err(|e| {
            FeedError::Transport(format!("Request error: {} URL: {}", e, self.latest_url))
        })?;

        if !response.status().is_success() {
            return Err(FeedError::Transport(format!(
                "HTTP error: {} URL: {}",
                response.status(),
                self.latest_url
            )));
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "Received provider response");

        RawPayload::from_body(&body)
    }
}
