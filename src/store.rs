//! In-memory rate and market caches
//!
//! Every write carries the sequence number of the fetch that produced it.
//! A write from an older fetch never replaces an entry written by a newer
//! one, so a slow response cannot clobber fresher data.

use crate::types::{split_pair, MarketEntry, RateValue};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A cached rate and the fetch that wrote it
#[derive(Debug, Clone)]
struct CachedRate {
    value: RateValue,
    seq: u64,
}

/// Keyed rate cache, one instance per rate class
///
/// Keys are token symbols for the native and USD caches and `{from}_{to}`
/// pair keys for the production cache.
pub struct RateCache {
    name: &'static str,
    entries: RwLock<HashMap<String, CachedRate>>,
}

impl RateCache {
    /// Creates an empty cache
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Gets the rate cached under `key`
    pub async fn get(&self, key: &str) -> Option<RateValue> {
        self.entries.read().await.get(key).map(|c| c.value.clone())
    }

    /// Writes one entry, returns false if a newer fetch already wrote it
    pub async fn insert(&self, key: impl Into<String>, value: RateValue, seq: u64) -> bool {
        self.insert_many(vec![(key.into(), value)], seq).await == 1
    }

    /// Writes several entries under a single lock
    ///
    /// Returns the number of entries written.
    pub async fn insert_many(&self, entries: Vec<(String, RateValue)>, seq: u64) -> usize {
        let mut cache = self.entries.write().await;
        let mut written = 0;

        for (key, value) in entries {
            if let Some(existing) = cache.get(&key) {
                if existing.seq > seq {
                    tracing::debug!(
                        cache = self.name,
                        key = %key,
                        stored_seq = existing.seq,
                        seq,
                        "Rejected write from an older fetch"
                    );
                    continue;
                }
            }
            cache.insert(
                key,
                CachedRate { value, seq },
            );
            written += 1;
        }

        written
    }

    /// Gets every cached rate
    pub async fn values(&self) -> Vec<RateValue> {
        self.entries
            .read()
            .await
            .values()
            .map(|c| c.value.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Immutable market snapshot, replaced wholesale on every successful fetch
#[derive(Debug, Default)]
struct MarketSnapshot {
    entries: Vec<MarketEntry>,
    by_pair: HashMap<String, usize>,
    volume_by_alias: HashMap<String, f64>,
    seq: u64,
    updated_at: Option<DateTime<Utc>>,
}

/// Last market fetch failure
#[derive(Debug, Clone, PartialEq)]
pub struct MarketFailure {
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

/// Market list cache with a volume index merging native/wrapped legs
pub struct MarketCache {
    native_symbol: String,
    wrapped_symbol: String,
    snapshot: RwLock<Arc<MarketSnapshot>>,
    last_failure: RwLock<Option<MarketFailure>>,
}

impl MarketCache {
    /// Creates an empty market cache
    ///
    /// `ETH_KNC` and `WETH_KNC` share one volume figure when the native
    /// symbol is `ETH` and the wrapped one `WETH`.
    pub fn new(native_symbol: impl Into<String>, wrapped_symbol: impl Into<String>) -> Self {
        Self {
            native_symbol: native_symbol.into(),
            wrapped_symbol: wrapped_symbol.into(),
            snapshot: RwLock::new(Arc::new(MarketSnapshot::default())),
            last_failure: RwLock::new(None),
        }
    }

    /// Replaces the whole market list
    ///
    /// Returns false if a newer fetch already replaced it.
    pub async fn replace(&self, entries: Vec<MarketEntry>, seq: u64) -> bool {
        let mut by_pair = HashMap::with_capacity(entries.len());
        let mut volume_by_alias: HashMap<String, f64> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            by_pair.insert(entry.pair.clone(), index);
            *volume_by_alias
                .entry(self.alias_key(&entry.pair))
                .or_insert(0.0) += entry.volume_24h;
        }

        let mut snapshot = self.snapshot.write().await;
        if snapshot.seq > seq {
            tracing::debug!(stored_seq = snapshot.seq, seq, "Rejected market list from an older fetch");
            return false;
        }
        *snapshot = Arc::new(MarketSnapshot {
            entries,
            by_pair,
            volume_by_alias,
            seq,
            updated_at: Some(Utc::now()),
        });
        drop(snapshot);

        *self.last_failure.write().await = None;
        true
    }

    /// Records a failed fetch, the current snapshot is kept
    pub async fn record_failure(&self, error_message: impl Into<String>) {
        *self.last_failure.write().await = Some(MarketFailure {
            error_message: error_message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Exact-name lookup that yields a zero-valued placeholder while no list has loaded
    ///
    /// Once a list exists an unknown pair is `None`.
    pub async fn get_or_placeholder(&self, pair: &str) -> Option<MarketEntry> {
        let snapshot = self.current().await;
        if snapshot.entries.is_empty() {
            return Some(MarketEntry::placeholder(pair));
        }
        snapshot
            .by_pair
            .get(pair)
            .and_then(|index| snapshot.entries.get(*index))
            .cloned()
    }

    /// Gets the 24h volume of `pair`, summed over native and wrapped spellings of its legs
    pub async fn volume(&self, pair: &str) -> f64 {
        let snapshot = self.current().await;
        snapshot
            .volume_by_alias
            .get(&self.alias_key(pair))
            .copied()
            .unwrap_or(0.0)
    }

    /// Gets the current market list
    pub async fn entries(&self) -> Vec<MarketEntry> {
        self.current().await.entries.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.current().await.entries.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.current().await.entries.len()
    }

    /// Time of the last successful replace
    pub async fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.current().await.updated_at
    }

    /// Last failure since the last successful replace
    pub async fn last_failure(&self) -> Option<MarketFailure> {
        self.last_failure.read().await.clone()
    }

    async fn current(&self) -> Arc<MarketSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Volume index key: wrapped legs are folded onto the native symbol
    fn alias_key(&self, pair: &str) -> String {
        match split_pair(pair) {
            Some((base, quote)) => format!("{}_{}", self.canonical_leg(base), self.canonical_leg(quote)),
            None => pair.to_string(),
        }
    }

    fn canonical_leg<'a>(&'a self, leg: &'a str) -> &'a str {
        if leg == self.wrapped_symbol {
            &self.native_symbol
        } else {
            leg
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruint::aliases::U256;

    fn rate(source: &str, raw: u64) -> RateValue {
        RateValue::new(source, "ETH", U256::from(raw), 18)
    }

    #[tokio::test]
    async fn test_rate_cache_last_fetch_wins() {
        let cache = RateCache::new("native");
        assert!(cache.insert("KNC", rate("KNC", 1), 1).await);
        assert!(cache.insert("KNC", rate("KNC", 2), 2).await);
        assert_eq!(cache.get("KNC").await.unwrap().rate_raw, U256::from(2u64));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_rate_cache_rejects_older_fetch() {
        let cache = RateCache::new("native");
        assert!(cache.insert("KNC", rate("KNC", 5), 7).await);
        assert!(!cache.insert("KNC", rate("KNC", 3), 6).await);
        assert_eq!(cache.get("KNC").await.unwrap().rate_raw, U256::from(5u64));

        // Older fetch may still fill keys the newer one did not write
        let written = cache
            .insert_many(
                vec![
                    ("KNC".to_string(), rate("KNC", 3)),
                    ("DAI".to_string(), rate("DAI", 4)),
                ],
                6,
            )
            .await;
        assert_eq!(written, 1);
        assert!(cache.get("DAI").await.is_some());
    }

    #[tokio::test]
    async fn test_market_cache_replaces_wholesale() {
        let cache = MarketCache::new("ETH", "WETH");
        assert!(cache.is_empty().await);

        cache
            .replace(
                vec![
                    MarketEntry::new("ETH_KNC", 1.0, 1.1, 10.0),
                    MarketEntry::new("ETH_DAI", 2.0, 2.1, 20.0),
                ],
                1,
            )
            .await;
        cache
            .replace(vec![MarketEntry::new("ETH_DAI", 3.0, 3.1, 30.0)], 2)
            .await;

        assert!(cache.get_or_placeholder("ETH_KNC").await.is_none());
        assert_eq!(cache.get_or_placeholder("ETH_DAI").await.unwrap().buy_price, 3.0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_cold_placeholder_keeps_requested_name() {
        let cache = MarketCache::new("ETH", "WETH");
        let placeholder = cache.get_or_placeholder("eth_knc").await.unwrap();
        assert_eq!(placeholder.pair, "eth_knc");
        assert_eq!(placeholder.buy_price, 0.0);

        cache
            .replace(vec![MarketEntry::new("eth_knc", 1.0, 1.1, 10.0)], 1)
            .await;
        assert!(cache.get_or_placeholder("eth_knc").await.is_none());
        assert_eq!(cache.get_or_placeholder("ETH_KNC").await.unwrap().pair, "ETH_KNC");
    }

    #[tokio::test]
    async fn test_market_failure_keeps_snapshot() {
        let cache = MarketCache::new("ETH", "WETH");
        cache
            .replace(vec![MarketEntry::new("ETH_KNC", 1.0, 1.1, 10.0)], 1)
            .await;
        cache.record_failure("timeout").await;

        assert!(cache.get_or_placeholder("ETH_KNC").await.is_some());
        assert_eq!(cache.last_failure().await.unwrap().error_message, "timeout");

        cache
            .replace(vec![MarketEntry::new("ETH_KNC", 1.0, 1.1, 10.0)], 2)
            .await;
        assert!(cache.last_failure().await.is_none());
    }

    #[tokio::test]
    async fn test_volume_merges_wrapped_legs() {
        let cache = MarketCache::new("ETH", "WETH");
        cache
            .replace(
                vec![
                    MarketEntry::new("ETH_KNC", 1.0, 1.1, 10.0),
                    MarketEntry::new("WETH_KNC", 1.0, 1.1, 2.5),
                    MarketEntry::new("KNC_DAI", 1.0, 1.1, 7.0),
                ],
                1,
            )
            .await;

        assert_eq!(cache.volume("ETH_KNC").await, 12.5);
        assert_eq!(cache.volume("WETH_KNC").await, 12.5);
        assert_eq!(cache.volume("KNC_DAI").await, 7.0);
        assert_eq!(cache.volume("KNC_MKR").await, 0.0);
    }
}
