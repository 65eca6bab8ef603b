//! Long-lived tracker rate store
//!
//! Other subsystems read "last known good" token prices from here. The
//! rate engine replaces the tracker list on every tracker fetch and pushes
//! its fresher native/USD cache rates into the same records.

use crate::types::{RateValue, TrackerRate};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Store of tracker rates shared with the rest of the wallet
pub trait TrackerStore: Send + Sync {
    /// Gets the tracker record of `symbol`
    fn tracker_rate(&self, symbol: &str) -> Option<TrackerRate>;

    /// Replaces records with a freshly fetched tracker list
    fn update_tracker_rates(&self, rates: Vec<TrackerRate>);

    /// Overwrites the native price of every symbol in `rates`
    fn apply_native_rates(&self, rates: &[RateValue]);

    /// Overwrites the USD price of every symbol in `rates`
    fn apply_usd_rates(&self, rates: &[RateValue]);
}

/// Process-local tracker store
#[derive(Debug, Default)]
pub struct InMemoryTrackerStore {
    rates: RwLock<HashMap<String, TrackerRate>>,
}

impl InMemoryTrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets every tracker record
    pub fn all(&self) -> Vec<TrackerRate> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, TrackerRate>> {
        self.rates.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, TrackerRate>> {
        self.rates.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply(&self, rates: &[RateValue], set: impl Fn(&mut TrackerRate, f64)) {
        let mut store = self.write();
        for rate in rates {
            let record = store
                .entry(rate.source.clone())
                .or_insert_with(|| TrackerRate::new(rate.source.clone(), 0.0, 0.0));
            set(record, rate.to_f64());
            record.updated_at = Utc::now();
        }
    }
}

impl TrackerStore for InMemoryTrackerStore {
    fn tracker_rate(&self, symbol: &str) -> Option<TrackerRate> {
        self.read().get(symbol).cloned()
    }

    fn update_tracker_rates(&self, rates: Vec<TrackerRate>) {
        let mut store = self.write();
        for rate in rates {
            store.insert(rate.symbol.clone(), rate);
        }
    }

    fn apply_native_rates(&self, rates: &[RateValue]) {
        self.apply(rates, |record, value| record.rate_native = value);
    }

    fn apply_usd_rates(&self, rates: &[RateValue]) {
        self.apply(rates, |record, value| record.rate_usd = value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_rates_update_existing_records() {
        let store = InMemoryTrackerStore::new();
        store.update_tracker_rates(vec![TrackerRate::new("KNC", 0.001, 2.0)]);

        store.apply_native_rates(&[RateValue::from_f64("KNC", "ETH", 0.002, 18)]);
        store.apply_usd_rates(&[RateValue::from_f64("DAI", "USD", 1.0, 18)]);

        let knc = store.tracker_rate("KNC").unwrap();
        assert!((knc.rate_native - 0.002).abs() < 1e-12);
        assert_eq!(knc.rate_usd, 2.0);

        let dai = store.tracker_rate("DAI").unwrap();
        assert_eq!(dai.rate_native, 0.0);
        assert!((dai.rate_usd - 1.0).abs() < 1e-12);
        assert_eq!(store.all().len(), 2);
    }
}
