// src/error.rs

use thiserror::Error;

/// Core error types for reposcope
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network failure while fetching a repository document
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Malformed or unexpected-schema repodata document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unreadable or corrupt cache store
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Malformed filter token, rejected before any I/O
    #[error("Invalid filter token '{token}': {reason}")]
    FilterSpecError { token: String, reason: String },

    /// Invalid or incomplete mirror configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Downloaded data does not match the checksum announced by the metadata
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),
}

/// Failure reported by a [`Fetcher`](crate::repository::Fetcher)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },
}

impl FetchError {
    /// Whether another attempt at the same URL may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connection { .. } => true,
            FetchError::Status { status, .. } => *status >= 500,
        }
    }
}

impl Error {
    pub(crate) fn filter_spec(token: &str, reason: &str) -> Self {
        Error::FilterSpecError {
            token: token.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias using reposcope's Error type
pub type Result<T> = std::result::Result<T, Error>;
