//! HTTP client for catalogue traffic with rate limiting and
//! cancellation support.
//!
//! The catalogue client funnels every request through [`HttpClient`] so
//! page fetches respect the configured request rate. Validator clients
//! talk to services that pace themselves (job polling), so they share a
//! plain pooled client built by [`build_client`].

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{
    Client, StatusCode,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::services::ValidationError;
use crate::infrastructure::config::HttpConfig;

/// A send that did not produce a response.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl From<SendError> for ValidationError {
    fn from(error: SendError) -> Self {
        match error {
            SendError::Cancelled => Self::Cancelled,
            SendError::Transport(source) => Self::Transport(source),
        }
    }
}

/// Build the pooled client shared by the validator implementations.
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
    );
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .context("Failed to create HTTP client")
}

/// Rate-limited HTTP client for the harvest side.
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = build_client(config)?;
        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// POST a JSON document and return the status plus the body text.
    ///
    /// The rate-limiter wait, the request, and the body read all race the
    /// cancellation token, so a shutdown never hangs on a slow catalogue.
    pub async fn post_json_with_cancellation<T>(
        &self,
        url: &str,
        body: &T,
        cancel: &CancellationToken,
    ) -> Result<(StatusCode, String), SendError>
    where
        T: serde::Serialize + ?Sized,
    {
        if cancel.is_cancelled() {
            return Err(SendError::Cancelled);
        }

        tokio::select! {
            _ = self.rate_limiter.until_ready() => {}
            _ = cancel.cancelled() => {
                return Err(SendError::Cancelled);
            }
        }

        tracing::debug!("Posting request to: {}", url);

        let response = tokio::select! {
            result = self.client.post(url).json(body).send() => result?,
            _ = cancel.cancelled() => {
                tracing::warn!("🛑 HTTP request cancelled for URL: {}", url);
                return Err(SendError::Cancelled);
            }
        };

        let status = response.status();
        let text = tokio::select! {
            result = response.text() => result?,
            _ = cancel.cancelled() => {
                tracing::warn!("🛑 Response reading cancelled for URL: {}", url);
                return Err(SendError::Cancelled);
            }
        };

        tracing::debug!("Response from {}: {} ({} bytes)", url, status, text.len());
        Ok((status, text))
    }
}
