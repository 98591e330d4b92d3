use crate::crawler::RetryPolicy;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for comic-dl
///
/// Every section and key is optional; a missing file behaves like an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub download: DownloadConfig,
    pub http: HttpConfig,
}

/// Download behavior configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// Number of concurrent workers
    pub jobs: usize,

    /// Fetch attempts for transient network errors, including the first
    pub attempts: u32,

    /// Pause between two attempts (milliseconds)
    #[serde(rename = "retry-delay")]
    pub retry_delay: u64,
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Total request timeout (seconds)
    pub timeout: u64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout")]
    pub connect_timeout: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            jobs: 3,
            attempts: 3,
            retry_delay: 3000,
        }
    }
}

impl DownloadConfig {
    /// Retry behavior for the fetcher
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            delay: Duration::from_millis(self.retry_delay),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("comic-dl/{}", env!("CARGO_PKG_VERSION")),
            timeout: 30,
            connect_timeout: 10,
        }
    }
}
