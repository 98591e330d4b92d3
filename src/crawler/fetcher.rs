//! HTTP fetcher implementation
//!
//! This module handles all network access for the crawler, including:
//! - The `Transport` seam the engine fetches through
//! - Building the shared HTTP client with the configured user agent
//! - Error classification (transient network errors vs. HTTP status errors)
//! - Bounded retries with a fixed delay for transient failures

use crate::config::HttpConfig;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Ways a single fetch can fail
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection-level failure (refused, reset, timeout); worth retrying
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// The server answered with a non-success status; never retried
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The body ended before the announced length
    #[error("content too short for {url}: expected {expected} bytes, got {received}")]
    ContentTooShort {
        url: String,
        expected: u64,
        received: u64,
    },
}

impl FetchError {
    /// Returns true if another attempt might succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Something that can fetch the bytes behind a URL
///
/// `headers` are fixed per crawler (e.g. a `Referer` some sites insist on)
/// and are sent in addition to the transport's own defaults.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<Vec<u8>, FetchError>;
}

/// How often and how patiently transient failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub attempts: u32,

    /// Pause between two attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// Fetches a URL, retrying transient network errors
///
/// | Condition | Action |
/// |-----------|--------|
/// | Network error | Retry up to `attempts` times, `delay` apart |
/// | HTTP 4xx/5xx | Fail immediately |
/// | Short content | Fail immediately |
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    url: &Url,
    headers: &HeaderMap,
    policy: RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match transport.fetch(url, headers).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_transient() && attempt < attempts => {
                tracing::warn!(
                    "Failed to connect ({}), retrying in {:?} (attempt {}/{})",
                    e,
                    policy.delay,
                    attempt,
                    attempts
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout))
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `Transport` backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with a freshly built client
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    /// Creates a transport around an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn network_error(url: &Url, error: &reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    };

    FetchError::Network {
        url: url.to_string(),
        message,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, headers: &HeaderMap) -> Result<Vec<u8>, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let expected = response.content_length();
        let mut body = Vec::new();

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                // The connection ended mid-body: the headers promised more
                Err(e) if expected.is_some() && (e.is_body() || e.is_decode()) && !e.is_timeout() => {
                    tracing::debug!("Body of {} cut short: {}", url, e);
                    break;
                }
                Err(e) => return Err(network_error(url, &e)),
            }
        }

        if let Some(expected) = expected {
            let received = body.len() as u64;
            if received < expected {
                return Err(FetchError::ContentTooShort {
                    url: url.to_string(),
                    expected,
                    received,
                });
            }
        }

        tracing::trace!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
