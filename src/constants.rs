//! Constants for the token rate engine
//!
//! Compile-time defaults for cadences, symbols and service endpoints.
//! `EngineConfig::default()` is built from these values.

use std::time::Duration;

/// How often the internal native/USD rates and the market list are refreshed (in seconds)
pub const CACHE_RATES_INTERVAL_SECS: u64 = 30;

/// How often the bulk tracker rates are refreshed (in seconds)
pub const TRACKER_RATES_INTERVAL_SECS: u64 = 30;

/// How often the platform fee is refreshed (in seconds)
pub const PLATFORM_FEE_INTERVAL_SECS: u64 = 60;

/// Minimum wall-clock gap between two manual refreshes (in seconds)
pub const MANUAL_REFRESH_DEBOUNCE_SECS: u64 = 15;

/// HTTP request timeout when fetching rates (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Fixed-point precision of every native-coin and USD rate
pub const RATE_DECIMALS: u8 = 18;

/// Symbol of the chain's native coin
pub const NATIVE_SYMBOL: &str = "ETH";

/// Symbol of the wrapped native coin
pub const WRAPPED_NATIVE_SYMBOL: &str = "WETH";

/// Destination symbol of USD quotes
pub const USD_SYMBOL: &str = "USD";

/// Separator between the legs of a pair name (`KNC_ETH`)
pub const PAIR_SEPARATOR: char = '_';

/// Capacity of the rate event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Internal rate service base URL (native/USD rates, platform fee)
pub const RATE_API_URL: &str = "https://api.kyber.network";

/// Tracker service base URL (bulk tracked rates)
pub const TRACKER_API_URL: &str = "https://tracker.kyber.network/api";

/// Price oracle bridge base URL
pub const ORACLE_API_URL: &str = "https://production-cache.kyber.network";

/// Market service base URL
pub const MARKET_API_URL: &str = "https://api.kyber.network/market";

/// User agent for HTTP requests
pub const USER_AGENT: &str = "token-rate-sdk/0.1.0";

/// Cadence helper used by the defaults
pub(crate) const fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}
