//! Types for the token rate engine

use crate::constants::PAIR_SEPARATOR;
use chrono::{DateTime, Utc};
use ruint::aliases::U256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returns `10^decimals` as a fixed-point scale
pub fn pow10(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// Builds the `{from}_{to}` cache key of a symbol pair
///
/// Symbols are used as given; `A_B` and `B_A` are distinct keys.
pub fn pair_key(from: &str, to: &str) -> String {
    format!("{}{}{}", from, PAIR_SEPARATOR, to)
}

/// Splits a `{BASE}_{QUOTE}` pair name into its legs
pub fn split_pair(pair: &str) -> Option<(&str, &str)> {
    let (base, quote) = pair.split_once(PAIR_SEPARATOR)?;
    if base.is_empty() || quote.is_empty() {
        return None;
    }
    Some((base, quote))
}

/// A fixed-point exchange rate from `source` to `dest`
///
/// `rate_raw` is expressed in units of `10^decimals` per one unit of
/// `source`. A zero rate means "no quote", not a free token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateValue {
    /// Source symbol
    pub source: String,
    /// Destination symbol
    pub dest: String,
    /// Fixed-point magnitude
    pub rate_raw: U256,
    /// Precision of `rate_raw`
    pub decimals: u8,
}

impl RateValue {
    /// Create a new rate
    pub fn new(source: impl Into<String>, dest: impl Into<String>, rate_raw: U256, decimals: u8) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            rate_raw,
            decimals,
        }
    }

    /// Encodes a floating point feed price at the given precision
    ///
    /// Non-finite and non-positive values encode as zero; values beyond
    /// `u128` saturate.
    pub fn from_f64(source: impl Into<String>, dest: impl Into<String>, value: f64, decimals: u8) -> Self {
        Self::new(source, dest, f64_to_fixed(value, decimals), decimals)
    }

    /// Returns true if this rate carries no quote
    pub fn is_zero(&self) -> bool {
        self.rate_raw.is_zero()
    }

    /// Cache key of this rate's pair
    pub fn pair_key(&self) -> String {
        pair_key(&self.source, &self.dest)
    }

    /// Approximate floating point value of the rate
    pub fn to_f64(&self) -> f64 {
        fixed_to_f64(self.rate_raw, self.decimals)
    }
}

/// Encodes `value` as a fixed-point integer with `decimals` digits
pub fn f64_to_fixed(value: f64, decimals: u8) -> U256 {
    if !value.is_finite() || value <= 0.0 {
        return U256::ZERO;
    }
    let scaled = value * 10f64.powi(decimals as i32);
    U256::from(scaled as u128)
}

/// Decodes a fixed-point integer with `decimals` digits into a float
pub fn fixed_to_f64(raw: U256, decimals: u8) -> f64 {
    let raw_f64: f64 = raw.to_string().parse().unwrap_or(0.0);
    raw_f64 / 10f64.powi(decimals as i32)
}

/// Record kept by the long-lived tracker rate store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerRate {
    /// Token symbol
    pub symbol: String,
    /// Price of one token in native coin
    pub rate_native: f64,
    /// Price of one token in USD
    pub rate_usd: f64,
    /// 24h change of the native price, in percent
    pub change_native_24h: f64,
    /// 24h change of the USD price, in percent
    pub change_usd_24h: f64,
    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl TrackerRate {
    /// Create a tracker record with no 24h change information
    pub fn new(symbol: impl Into<String>, rate_native: f64, rate_usd: f64) -> Self {
        Self {
            symbol: symbol.into(),
            rate_native,
            rate_usd,
            change_native_24h: 0.0,
            change_usd_24h: 0.0,
            updated_at: Utc::now(),
        }
    }
}

/// Snapshot of one trading pair on the market feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEntry {
    /// Pair identifier, `{BASE}_{QUOTE}`
    pub pair: String,
    /// Best buy price
    pub buy_price: f64,
    /// Best sell price
    pub sell_price: f64,
    /// Traded volume over the last 24 hours
    pub volume_24h: f64,
}

impl MarketEntry {
    /// Create a new market entry, normalizing the pair name to uppercase
    pub fn new(pair: impl Into<String>, buy_price: f64, sell_price: f64, volume_24h: f64) -> Self {
        Self {
            pair: pair.into().to_uppercase(),
            buy_price,
            sell_price,
            volume_24h,
        }
    }

    /// Zero-valued entry served while no market snapshot exists yet
    ///
    /// Keeps the caller's spelling of `pair`.
    pub fn placeholder(pair: &str) -> Self {
        Self {
            pair: pair.to_string(),
            buy_price: 0.0,
            sell_price: 0.0,
            volume_24h: 0.0,
        }
    }

    /// Base leg of the pair
    pub fn base(&self) -> Option<&str> {
        split_pair(&self.pair).map(|(base, _)| base)
    }

    /// Quote leg of the pair
    pub fn quote(&self) -> Option<&str> {
        split_pair(&self.pair).map(|(_, quote)| quote)
    }
}

/// Platform fee payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFeeQuote {
    /// Explicit success flag reported by the service
    pub success: bool,
    /// Fee in basis points
    pub fee: i64,
}

/// The independently scheduled fetch kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    /// Internal native/USD rates, market list and production rates
    CacheRates,
    /// Bulk tracker rates
    TrackerRates,
    /// Platform fee
    PlatformFee,
}

impl FetchKind {
    /// Get the fetch kind name
    pub fn name(&self) -> &'static str {
        match self {
            FetchKind::CacheRates => "cache_rates",
            FetchKind::TrackerRates => "tracker_rates",
            FetchKind::PlatformFee => "platform_fee",
        }
    }

    /// All fetch kinds, in start order
    pub fn all() -> &'static [FetchKind] {
        &[
            FetchKind::CacheRates,
            FetchKind::TrackerRates,
            FetchKind::PlatformFee,
        ]
    }
}

/// Rate events broadcast to listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateEvent {
    /// Native/USD rates were refreshed
    RatesUpdated {
        id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The market snapshot was replaced
    MarketUpdated {
        id: Uuid,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The market fetch failed, the previous snapshot is still served
    MarketFetchFailed {
        id: Uuid,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// Production rates were written for a pair (`*` for the full list)
    ProductionRateUpdated {
        id: Uuid,
        pair: String,
        timestamp: DateTime<Utc>,
    },

    /// Production rate fetch failed for a pair (`*` for the full list)
    ProductionRateFetchFailed {
        id: Uuid,
        pair: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl RateEvent {
    pub fn rates_updated() -> Self {
        RateEvent::RatesUpdated {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }

    pub fn market_updated(count: usize) -> Self {
        RateEvent::MarketUpdated {
            id: Uuid::new_v4(),
            count,
            timestamp: Utc::now(),
        }
    }

    pub fn market_fetch_failed(error_message: impl Into<String>) -> Self {
        RateEvent::MarketFetchFailed {
            id: Uuid::new_v4(),
            error_message: error_message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn production_rate_updated(pair: impl Into<String>) -> Self {
        RateEvent::ProductionRateUpdated {
            id: Uuid::new_v4(),
            pair: pair.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn production_rate_fetch_failed(pair: impl Into<String>, error_message: impl Into<String>) -> Self {
        RateEvent::ProductionRateFetchFailed {
            id: Uuid::new_v4(),
            pair: pair.into(),
            error_message: error_message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            RateEvent::RatesUpdated { id, .. } => *id,
            RateEvent::MarketUpdated { id, .. } => *id,
            RateEvent::MarketFetchFailed { id, .. } => *id,
            RateEvent::ProductionRateUpdated { id, .. } => *id,
            RateEvent::ProductionRateFetchFailed { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            RateEvent::RatesUpdated { .. } => "RATES_UPDATED",
            RateEvent::MarketUpdated { .. } => "MARKET_UPDATED",
            RateEvent::MarketFetchFailed { .. } => "MARKET_FETCH_FAILED",
            RateEvent::ProductionRateUpdated { .. } => "PRODUCTION_RATE_UPDATED",
            RateEvent::ProductionRateFetchFailed { .. } => "PRODUCTION_RATE_FETCH_FAILED",
        }
    }
}

impl std::fmt::Display for RateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateEvent::RatesUpdated { .. } => write!(f, "Rates updated"),
            RateEvent::MarketUpdated { count, .. } => {
                write!(f, "Market updated: {} pairs", count)
            }
            RateEvent::MarketFetchFailed { error_message, .. } => {
                write!(f, "Market fetch failed: {}", error_message)
            }
            RateEvent::ProductionRateUpdated { pair, .. } => {
                write!(f, "Production rate updated: {}", pair)
            }
            RateEvent::ProductionRateFetchFailed {
                pair,
                error_message,
                ..
            } => {
                write!(f, "Production rate fetch failed for {}: {}", pair, error_message)
            }
        }
    }
}

/// Overall engine health status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Engine is running with data in every cache
    Healthy,
    /// Engine serves data but some of it is missing or stale
    Degraded,
    /// Engine has no rate data
    Unhealthy,
}

/// Component health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional status message
    pub message: Option<String>,
    /// Component-specific details
    pub details: std::collections::HashMap<String, serde_json::Value>,
    /// Last checked timestamp
    pub last_checked: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_keeps_order() {
        assert_eq!(pair_key("KNC", "ETH"), "KNC_ETH");
        assert_eq!(pair_key("ETH", "KNC"), "ETH_KNC");
        assert_eq!(split_pair("ETH_KNC"), Some(("ETH", "KNC")));
        assert_eq!(split_pair("ETHKNC"), None);
        assert_eq!(split_pair("_KNC"), None);
    }

    #[test]
    fn test_from_f64_encoding() {
        let rate = RateValue::from_f64("KNC", "ETH", 0.5, 18);
        assert_eq!(rate.rate_raw, U256::from(500_000_000_000_000_000u128));
        assert!(RateValue::from_f64("KNC", "ETH", f64::NAN, 18).is_zero());
        assert!(RateValue::from_f64("KNC", "ETH", -1.0, 18).is_zero());
        assert!((rate.to_f64() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_market_entry_normalizes_pair() {
        let entry = MarketEntry::new("eth_knc", 1.0, 2.0, 3.0);
        assert_eq!(entry.pair, "ETH_KNC");
        assert_eq!(entry.base(), Some("ETH"));
        assert_eq!(entry.quote(), Some("KNC"));
        let placeholder = MarketEntry::placeholder("eth_dai");
        assert_eq!(placeholder.pair, "eth_dai");
        assert_eq!(placeholder.volume_24h, 0.0);
    }

    #[test]
    fn test_event_type_names() {
        let event = RateEvent::market_fetch_failed("boom");
        assert_eq!(event.event_type(), "MARKET_FETCH_FAILED");
        assert_eq!(event.to_string(), "Market fetch failed: boom");
        let json = serde_json::to_value(&RateEvent::market_updated(3)).unwrap();
        assert_eq!(json["type"], "MARKET_UPDATED");
        assert_eq!(json["count"], 3);
    }
}
