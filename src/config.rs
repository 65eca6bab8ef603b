//! Runtime configuration for the rate engine
//!
//! Defaults come from [`crate::constants`]. Service URLs and the native
//! symbols can be overridden through environment variables with
//! [`EngineConfig::from_env`].

use crate::constants::{
    secs, CACHE_RATES_INTERVAL_SECS, MANUAL_REFRESH_DEBOUNCE_SECS, MARKET_API_URL,
    NATIVE_SYMBOL, ORACLE_API_URL, PLATFORM_FEE_INTERVAL_SECS, RATE_API_URL,
    REQUEST_TIMEOUT_SECS, TRACKER_API_URL, TRACKER_RATES_INTERVAL_SECS, USD_SYMBOL,
    WRAPPED_NATIVE_SYMBOL,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration of a [`crate::RateCoordinator`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Native coin symbol (`ETH`)
    pub native_symbol: String,
    /// Wrapped native coin symbol (`WETH`)
    pub wrapped_native_symbol: String,
    /// Destination symbol of USD quotes
    pub usd_symbol: String,
    /// Cadence of the internal native/USD rate and market refresh
    pub cache_rates_interval_secs: u64,
    /// Cadence of the bulk tracker rate refresh
    pub tracker_rates_interval_secs: u64,
    /// Cadence of the platform fee refresh
    pub platform_fee_interval_secs: u64,
    /// Minimum gap between two manual refreshes
    pub manual_refresh_debounce_secs: u64,
    /// HTTP request timeout
    pub request_timeout_secs: u64,
    /// Internal rate service base URL
    pub rate_api_url: String,
    /// Tracker service base URL
    pub tracker_api_url: String,
    /// Price oracle bridge base URL
    pub oracle_api_url: String,
    /// Market service base URL
    pub market_api_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            native_symbol: NATIVE_SYMBOL.to_string(),
            wrapped_native_symbol: WRAPPED_NATIVE_SYMBOL.to_string(),
            usd_symbol: USD_SYMBOL.to_string(),
            cache_rates_interval_secs: CACHE_RATES_INTERVAL_SECS,
            tracker_rates_interval_secs: TRACKER_RATES_INTERVAL_SECS,
            platform_fee_interval_secs: PLATFORM_FEE_INTERVAL_SECS,
            manual_refresh_debounce_secs: MANUAL_REFRESH_DEBOUNCE_SECS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            rate_api_url: RATE_API_URL.to_string(),
            tracker_api_url: TRACKER_API_URL.to_string(),
            oracle_api_url: ORACLE_API_URL.to_string(),
            market_api_url: MARKET_API_URL.to_string(),
        }
    }
}

impl EngineConfig {
    /// Builds the default configuration, then applies environment overrides
    ///
    /// Recognized variables: `RATE_API_URL`, `TRACKER_API_URL`,
    /// `ORACLE_API_URL`, `MARKET_API_URL`, `NATIVE_SYMBOL` and
    /// `WRAPPED_NATIVE_SYMBOL`.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies every non-blank value `lookup` returns for a recognized variable
    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let overrides: [(&str, &mut String); 6] = [
            ("RATE_API_URL", &mut self.rate_api_url),
            ("TRACKER_API_URL", &mut self.tracker_api_url),
            ("ORACLE_API_URL", &mut self.oracle_api_url),
            ("MARKET_API_URL", &mut self.market_api_url),
            ("NATIVE_SYMBOL", &mut self.native_symbol),
            ("WRAPPED_NATIVE_SYMBOL", &mut self.wrapped_native_symbol),
        ];
        for (key, slot) in overrides {
            if let Some(value) = lookup(key) {
                if !value.trim().is_empty() {
                    tracing::debug!(key, value = %value, "Applying environment override");
                    *slot = value.trim().to_string();
                }
            }
        }
        self
    }

    pub fn cache_rates_interval(&self) -> Duration {
        secs(self.cache_rates_interval_secs)
    }

    pub fn tracker_rates_interval(&self) -> Duration {
        secs(self.tracker_rates_interval_secs)
    }

    pub fn platform_fee_interval(&self) -> Duration {
        secs(self.platform_fee_interval_secs)
    }

    pub fn manual_refresh_debounce(&self) -> Duration {
        secs(self.manual_refresh_debounce_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_cadences() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_rates_interval(), Duration::from_secs(30));
        assert_eq!(config.tracker_rates_interval(), Duration::from_secs(30));
        assert_eq!(config.platform_fee_interval(), Duration::from_secs(60));
        assert_eq!(config.manual_refresh_debounce(), Duration::from_secs(15));
    }

    #[test]
    fn test_overrides_cover_both_native_symbols() {
        let env: HashMap<&str, &str> = [
            ("NATIVE_SYMBOL", "BNB"),
            ("WRAPPED_NATIVE_SYMBOL", " WBNB "),
            ("MARKET_API_URL", "  "),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::default().with_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.native_symbol, "BNB");
        assert_eq!(config.wrapped_native_symbol, "WBNB");
        assert_eq!(config.market_api_url, MARKET_API_URL);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"native_symbol":"BNB","wrapped_native_symbol":"WBNB"}"#)
                .unwrap();
        assert_eq!(config.native_symbol, "BNB");
        assert_eq!(config.usd_symbol, "USD");
        assert_eq!(config.wrapped_native_symbol, "WBNB");
        assert_eq!(config.cache_rates_interval_secs, 30);
    }
}
