//! Fetch abstractions for the three remote rate sources
//!
//! The coordinator only talks to these traits; HTTP implementations live in
//! [`crate::providers`] and tests use the mocks below.

use crate::{
    error::ProviderError,
    types::{MarketEntry, PlatformFeeQuote, RateValue, TrackerRate},
};
use async_trait::async_trait;

/// Exchange/tracker rate service
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetches internal token → native coin rates
    ///
    /// Every returned quote should have the native symbol as `dest`.
    async fn fetch_native_rates(&self) -> Result<Vec<RateValue>, ProviderError>;

    /// Fetches internal token → USD rates
    ///
    /// Every returned quote should have `USD` as `dest`.
    async fn fetch_usd_rates(&self) -> Result<Vec<RateValue>, ProviderError>;

    /// Fetches the bulk list of all tracked rates
    async fn fetch_tracker_rates(&self) -> Result<Vec<TrackerRate>, ProviderError>;

    /// Fetches the platform fee
    async fn fetch_platform_fee(&self) -> Result<PlatformFeeQuote, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// On-chain / price-oracle bridge rate service
#[async_trait]
pub trait BridgeRateSource: Send + Sync {
    /// Fetches the oracle price of one `symbol` in native coin
    ///
    /// Zero means the oracle has no price for the symbol.
    async fn fetch_bridge_rate(&self, symbol: &str) -> Result<f64, ProviderError>;

    /// Fetches the full list of production rates for every known pair
    async fn fetch_production_rates(&self) -> Result<Vec<RateValue>, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// Market / orderbook service
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Fetches the full market list
    async fn fetch_markets(&self) -> Result<Vec<MarketEntry>, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::watch;

    type Canned<T> = Mutex<Result<T, String>>;

    fn canned<T: Clone>(slot: &Canned<T>) -> Result<T, ProviderError> {
        slot.lock().unwrap().clone().map_err(ProviderError::ApiError)
    }

    /// Holds fetches in flight until released
    pub struct Gate {
        open: watch::Sender<bool>,
    }

    impl Gate {
        fn new() -> Self {
            let (open, _) = watch::channel(true);
            Self { open }
        }

        pub fn hold(&self) {
            self.open.send_replace(false);
        }

        pub fn release(&self) {
            self.open.send_replace(true);
        }

        async fn pass(&self) {
            let mut rx = self.open.subscribe();
            let _ = rx.wait_for(|open| *open).await;
        }
    }

    /// Per-method call counter
    #[derive(Default)]
    pub struct Calls(Mutex<HashMap<&'static str, usize>>);

    impl Calls {
        fn record(&self, method: &'static str) {
            *self.0.lock().unwrap().entry(method).or_insert(0) += 1;
        }

        pub fn get(&self, method: &str) -> usize {
            self.0.lock().unwrap().get(method).copied().unwrap_or(0)
        }
    }

    /// Mock rate service for testing
    pub struct MockRateSource {
        native: Canned<Vec<RateValue>>,
        usd: Canned<Vec<RateValue>>,
        tracker: Canned<Vec<TrackerRate>>,
        fee: Canned<PlatformFeeQuote>,
        pub calls: Calls,
        pub gate: Gate,
    }

    impl Default for MockRateSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockRateSource {
        pub fn new() -> Self {
            Self {
                native: Mutex::new(Ok(Vec::new())),
                usd: Mutex::new(Ok(Vec::new())),
                tracker: Mutex::new(Ok(Vec::new())),
                fee: Mutex::new(Err("no fee configured".to_string())),
                calls: Calls::default(),
                gate: Gate::new(),
            }
        }

        pub fn set_native_rates(&self, rates: Vec<RateValue>) {
            *self.native.lock().unwrap() = Ok(rates);
        }

        pub fn set_usd_rates(&self, rates: Vec<RateValue>) {
            *self.usd.lock().unwrap() = Ok(rates);
        }

        pub fn set_tracker_rates(&self, rates: Vec<TrackerRate>) {
            *self.tracker.lock().unwrap() = Ok(rates);
        }

        pub fn set_platform_fee(&self, fee: PlatformFeeQuote) {
            *self.fee.lock().unwrap() = Ok(fee);
        }

        pub fn fail_native_rates(&self, error: &str) {
            *self.native.lock().unwrap() = Err(error.to_string());
        }

        pub fn fail_usd_rates(&self, error: &str) {
            *self.usd.lock().unwrap() = Err(error.to_string());
        }
    }

    #[async_trait]
    impl RateSource for MockRateSource {
        async fn fetch_native_rates(&self) -> Result<Vec<RateValue>, ProviderError> {
            self.calls.record("native");
            self.gate.pass().await;
            canned(&self.native)
        }

        async fn fetch_usd_rates(&self) -> Result<Vec<RateValue>, ProviderError> {
            self.calls.record("usd");
            self.gate.pass().await;
            canned(&self.usd)
        }

        async fn fetch_tracker_rates(&self) -> Result<Vec<TrackerRate>, ProviderError> {
            self.calls.record("tracker");
            self.gate.pass().await;
            canned(&self.tracker)
        }

        async fn fetch_platform_fee(&self) -> Result<PlatformFeeQuote, ProviderError> {
            self.calls.record("fee");
            canned(&self.fee)
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    /// Mock oracle bridge for testing
    pub struct MockBridgeSource {
        bridge_rates: Mutex<HashMap<String, f64>>,
        production: Canned<Vec<RateValue>>,
        pub calls: Calls,
    }

    impl Default for MockBridgeSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockBridgeSource {
        pub fn new() -> Self {
            Self {
                bridge_rates: Mutex::new(HashMap::new()),
                production: Mutex::new(Ok(Vec::new())),
                calls: Calls::default(),
            }
        }

        pub fn set_bridge_rate(&self, symbol: &str, rate: f64) {
            self.bridge_rates
                .lock()
                .unwrap()
                .insert(symbol.to_string(), rate);
        }

        pub fn set_production_rates(&self, rates: Vec<RateValue>) {
            *self.production.lock().unwrap() = Ok(rates);
        }

        pub fn fail_production_rates(&self, error: &str) {
            *self.production.lock().unwrap() = Err(error.to_string());
        }
    }

    #[async_trait]
    impl BridgeRateSource for MockBridgeSource {
        async fn fetch_bridge_rate(&self, symbol: &str) -> Result<f64, ProviderError> {
            self.calls.record("bridge");
            self.bridge_rates
                .lock()
                .unwrap()
                .get(symbol)
                .copied()
                .ok_or_else(|| ProviderError::UnsupportedSymbol(symbol.to_string()))
        }

        async fn fetch_production_rates(&self) -> Result<Vec<RateValue>, ProviderError> {
            self.calls.record("production");
            canned(&self.production)
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    /// Mock market service for testing
    pub struct MockMarketSource {
        markets: Canned<Vec<MarketEntry>>,
        pub calls: Calls,
    }

    impl Default for MockMarketSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockMarketSource {
        pub fn new() -> Self {
            Self {
                markets: Mutex::new(Ok(Vec::new())),
                calls: Calls::default(),
            }
        }

        pub fn set_markets(&self, markets: Vec<MarketEntry>) {
            *self.markets.lock().unwrap() = Ok(markets);
        }

        pub fn fail(&self, error: &str) {
            *self.markets.lock().unwrap() = Err(error.to_string());
        }
    }

    #[async_trait]
    impl MarketSource for MockMarketSource {
        async fn fetch_markets(&self) -> Result<Vec<MarketEntry>, ProviderError> {
            self.calls.record("markets");
            canned(&self.markets)
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }
}
