// src/repository/client.rs

//! HTTP access to remote repositories
//!
//! The sync pipeline only sees the [`Fetcher`] trait; [`HttpFetcher`] is the
//! reqwest-backed implementation used by the command line.

use crate::error::{Error, FetchError, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for HTTP requests (30 seconds)
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts per URL
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Capability to retrieve the bytes behind a URL
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Bounded retry policy applied to every URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * delay` before retrying
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Fetch a URL, retrying timeouts, connection failures and 5xx responses
pub fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    policy: &RetryPolicy,
) -> std::result::Result<Vec<u8>, FetchError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetcher.fetch(url) {
            Ok(bytes) => {
                debug!("Fetched {} ({} bytes)", url, bytes.len());
                return Ok(bytes);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts.max(1) => {
                warn!("Fetch attempt {} of {} failed: {}, retrying...", attempt, url, e);
                std::thread::sleep(policy.delay * attempt);
            }
            Err(e) => return Err(e),
        }
    }
}

/// reqwest blocking client implementing [`Fetcher`]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reposcope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Connection {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let response = self.client.get(url).send().map_err(classify)?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().map_err(classify)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fails a fixed number of times, then succeeds
    struct Flaky {
        failures: Mutex<Vec<FetchError>>,
        calls: Mutex<u32>,
    }

    impl Fetcher for Flaky {
        fn fetch(&self, _url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            *self.calls.lock().unwrap() += 1;
            match self.failures.lock().unwrap().pop() {
                Some(e) => Err(e),
                None => Ok(b"ok".to_vec()),
            }
        }
    }

    fn flaky(failures: Vec<FetchError>) -> Flaky {
        Flaky {
            failures: Mutex::new(failures),
            calls: Mutex::new(0),
        }
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_retries_transient_failures() {
        let fetcher = flaky(vec![
            FetchError::Timeout { url: "u".to_string() },
            FetchError::Status { url: "u".to_string(), status: 503 },
        ]);
        let bytes = fetch_with_retry(&fetcher, "u", &quick(3)).unwrap();
        assert_eq!(bytes, b"ok");
        assert_eq!(*fetcher.calls.lock().unwrap(), 3);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let fetcher = flaky(vec![
            FetchError::Timeout { url: "u".to_string() },
            FetchError::Timeout { url: "u".to_string() },
        ]);
        let result = fetch_with_retry(&fetcher, "u", &quick(2));
        assert!(matches!(result, Err(FetchError::Timeout { .. })));
        assert_eq!(*fetcher.calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_client_errors_are_not_retried() {
        let fetcher = flaky(vec![FetchError::Status { url: "u".to_string(), status: 404 }]);
        let result = fetch_with_retry(&fetcher, "u", &quick(3));
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
        assert_eq!(*fetcher.calls.lock().unwrap(), 1);
    }
}
