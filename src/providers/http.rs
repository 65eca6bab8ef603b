//! Shared JSON-over-HTTP client for the rate services

use crate::{constants::USER_AGENT, error::ProviderError};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// GET-only JSON client bound to one service base URL
pub struct JsonClient {
    client: Client,
    base_url: String,
    service: &'static str,
}

impl JsonClient {
    /// Creates a client for `base_url`
    pub fn new(
        service: &'static str,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ProviderError::NetworkError)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service,
        })
    }

    /// Builds the full URL of `path`
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends a GET request and decodes the JSON body
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = self.url(path);
        tracing::debug!(service = self.service, url = %url, "Fetching");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(map_send_error)?;

        // Check for rate limiting
        if response.status().as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded);
        }

        // Check for other errors
        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let response_text = response.text().await.map_err(map_send_error)?;

        serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse {} response: {}. Response: {}",
                self.service, e, response_text
            ))
        })
    }
}

fn map_send_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::NetworkError(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_cleanly() {
        let client = JsonClient::new("test", "https://api.example.com/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/rates/native"), "https://api.example.com/rates/native");
        assert_eq!(client.url("market"), "https://api.example.com/market");
    }
}
