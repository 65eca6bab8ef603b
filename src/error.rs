//! Error types for the rate fetch layer
//!
//! Only the fetch clients return errors. The coordinator degrades every
//! failure to "serve the last good value" and a failure event.

use thiserror::Error;

/// Errors that can occur when fetching from a remote rate source
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid or undecodable response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Symbol not quoted by this source
    #[error("Symbol not supported: {0}")]
    UnsupportedSymbol(String),

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Timeout waiting for response
    #[error("Request timeout")]
    Timeout,
}

impl ProviderError {
    /// Creates an InvalidResponse error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}
