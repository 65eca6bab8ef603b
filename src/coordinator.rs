//! Rate coordinator service
//!
//! Single owner of the rate, production and market caches. Three timers
//! drive independent refresh cadences; every fetch runs as its own task and
//! is cancelled when the coordinator is paused.
//!
//! ```text
//! resume()
//!     ↓
//! cache rates (30s) ─┬─ native + USD rates ─ join ─→ RatesUpdated
//!                    ├─ market list ───────────────→ MarketUpdated / MarketFetchFailed
//!                    └─ production rates ──────────→ ProductionRateUpdated / ...Failed
//! tracker rates (30s) ──→ TrackerStore ────────────→ RatesUpdated
//! platform fee (60s) ───→ PlatformSettings
//! ```

use crate::{
    config::EngineConfig,
    constants::{EVENT_CHANNEL_CAPACITY, RATE_DECIMALS},
    error::ProviderError,
    metrics::{MetricsCollector, ProviderMetrics},
    provider::{BridgeRateSource, MarketSource, RateSource},
    providers::{MarketApiProvider, OracleProvider, RateApiProvider},
    registry::TokenRegistry,
    settings::{InMemoryPlatformSettings, PlatformSettings},
    store::{MarketCache, RateCache},
    tracker_store::{InMemoryTrackerStore, TrackerStore},
    types::{
        pair_key, pow10, ComponentHealth, FetchKind, HealthStatus, MarketEntry, RateEvent,
        RateValue,
    },
};
use ruint::aliases::U256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Collaborators injected into a [`RateCoordinator`]
pub struct EngineDeps {
    pub registry: Arc<dyn TokenRegistry>,
    pub rates: Arc<dyn RateSource>,
    pub bridge: Arc<dyn BridgeRateSource>,
    pub markets: Arc<dyn MarketSource>,
    pub tracker_store: Arc<dyn TrackerStore>,
    pub settings: Arc<dyn PlatformSettings>,
}

/// Which rate class a tracker store sync pushes
#[derive(Debug, Clone, Copy)]
enum RateClass {
    Native,
    Usd,
}

/// In-flight flags of one run
#[derive(Debug, Default)]
struct InFlight {
    cache_rates: AtomicBool,
    tracker_rates: AtomicBool,
    platform_fee: AtomicBool,
}

impl InFlight {
    fn flag(&self, kind: FetchKind) -> &AtomicBool {
        match kind {
            FetchKind::CacheRates => &self.cache_rates,
            FetchKind::TrackerRates => &self.tracker_rates,
            FetchKind::PlatformFee => &self.platform_fee,
        }
    }
}

/// One `resume` → `pause` run: its cancellation token and in-flight flags
#[derive(Debug, Clone)]
struct Run {
    cancel: CancellationToken,
    in_flight: Arc<InFlight>,
}

impl Run {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Claims the in-flight flag of `kind`, `None` if a fetch of that kind is running
    fn try_claim(&self, kind: FetchKind) -> Option<InFlightGuard> {
        self.in_flight
            .flag(kind)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            kind,
        })
    }
}

/// Releases an in-flight flag when the fetch task ends or is cancelled
struct InFlightGuard {
    in_flight: Arc<InFlight>,
    kind: FetchKind,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.flag(self.kind).store(false, Ordering::Release);
    }
}

struct Lifecycle {
    run: Run,
    timers: Vec<JoinHandle<()>>,
}

impl Lifecycle {
    fn stop(self) {
        self.run.cancel.cancel();
        for timer in self.timers {
            timer.abort();
        }
    }
}

struct RateCaches {
    native: RateCache,
    usd: RateCache,
    production: RateCache,
}

/// One metrics collector per remote source
struct SourceMetrics {
    rates: MetricsCollector,
    bridge: MetricsCollector,
    markets: MetricsCollector,
}

impl SourceMetrics {
    fn new() -> Self {
        Self {
            rates: MetricsCollector::new("rates"),
            bridge: MetricsCollector::new("bridge"),
            markets: MetricsCollector::new("markets"),
        }
    }

    fn collectors(&self) -> [&MetricsCollector; 3] {
        [&self.rates, &self.bridge, &self.markets]
    }
}

/// State shared between the coordinator handle and its tasks
struct Engine {
    config: EngineConfig,
    registry: Arc<dyn TokenRegistry>,
    rates: Arc<dyn RateSource>,
    bridge: Arc<dyn BridgeRateSource>,
    markets: Arc<dyn MarketSource>,
    tracker_store: Arc<dyn TrackerStore>,
    settings: Arc<dyn PlatformSettings>,
    caches: RateCaches,
    market: MarketCache,
    metrics: SourceMetrics,
    sequence: AtomicU64,
    focused_pair: RwLock<Option<(String, String)>>,
    events: broadcast::Sender<RateEvent>,
}

/// Rate aggregation and caching engine
///
/// Construct once at startup and share by reference. Nothing is fetched
/// until [`RateCoordinator::resume`] is called.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use token_rate_sdk::{EngineConfig, RateCoordinator, StaticTokenRegistry, TokenInfo};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = Arc::new(StaticTokenRegistry::new(vec![
///     TokenInfo::native("ETH", 18),
///     TokenInfo::new("KNC", 18),
/// ]));
/// let coordinator = RateCoordinator::from_config(EngineConfig::from_env(), registry)?;
/// let mut events = coordinator.subscribe();
/// coordinator.resume();
///
/// events.recv().await?;
/// if let Some(rate) = coordinator.get_rate("KNC", "ETH").await {
///     println!("KNC/ETH: {}", token_rate_sdk::display_rate(rate.rate_raw, rate.decimals));
/// }
/// # Ok(())
/// # }
/// ```
pub struct RateCoordinator {
    engine: Arc<Engine>,
    lifecycle: Mutex<Option<Lifecycle>>,
    last_manual_refresh: Mutex<Option<Instant>>,
}

impl RateCoordinator {
    /// Creates a coordinator over injected collaborators
    pub fn new(config: EngineConfig, deps: EngineDeps) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let market = MarketCache::new(
            config.native_symbol.clone(),
            config.wrapped_native_symbol.clone(),
        );

        let engine = Engine {
            config,
            registry: deps.registry,
            rates: deps.rates,
            bridge: deps.bridge,
            markets: deps.markets,
            tracker_store: deps.tracker_store,
            settings: deps.settings,
            caches: RateCaches {
                native: RateCache::new("native"),
                usd: RateCache::new("usd"),
                production: RateCache::new("production"),
            },
            market,
            metrics: SourceMetrics::new(),
            sequence: AtomicU64::new(0),
            focused_pair: RwLock::new(None),
            events,
        };

        Self {
            engine: Arc::new(engine),
            lifecycle: Mutex::new(None),
            last_manual_refresh: Mutex::new(None),
        }
    }

    /// Creates a coordinator backed by the HTTP services in `config`
    ///
    /// Tracker rates and the platform fee are kept in process memory.
    pub fn from_config(
        config: EngineConfig,
        registry: Arc<dyn TokenRegistry>,
    ) -> Result<Self, ProviderError> {
        let deps = EngineDeps {
            registry,
            rates: Arc::new(RateApiProvider::new(&config)?),
            bridge: Arc::new(OracleProvider::new(&config)?),
            markets: Arc::new(MarketApiProvider::new(&config)?),
            tracker_store: Arc::new(InMemoryTrackerStore::new()),
            settings: Arc::new(InMemoryPlatformSettings::new()),
        };
        Ok(Self::new(config, deps))
    }

    /// Starts the three refresh cadences
    ///
    /// Every fetch kind fires immediately, then repeats on its interval.
    /// Calling `resume` on a running coordinator restarts it without
    /// duplicating timers. Must be called from within a tokio runtime.
    pub fn resume(&self) {
        let mut lifecycle = self.lock_lifecycle();
        if let Some(previous) = lifecycle.take() {
            debug!("Restarting running rate coordinator");
            previous.stop();
        }

        let run = Run::new();
        let timers = FetchKind::all()
            .iter()
            .map(|kind| Engine::spawn_timer(&self.engine, run.clone(), *kind))
            .collect();
        *lifecycle = Some(Lifecycle { run, timers });

        info!(
            cache_rates_secs = self.engine.config.cache_rates_interval_secs,
            tracker_rates_secs = self.engine.config.tracker_rates_interval_secs,
            platform_fee_secs = self.engine.config.platform_fee_interval_secs,
            "Rate coordinator resumed"
        );
    }

    /// Stops all timers and cancels in-flight fetches
    ///
    /// Cached data stays servable.
    pub fn pause(&self) {
        if let Some(lifecycle) = self.lock_lifecycle().take() {
            lifecycle.stop();
            info!("Rate coordinator paused");
        }
    }

    /// Returns true between `resume` and `pause`
    pub fn is_running(&self) -> bool {
        self.lock_lifecycle().is_some()
    }

    /// Triggers the cache and tracker rate fetches out of band
    ///
    /// No-op when paused or when the previous manual refresh is younger than
    /// the debounce window. Returns true if the refresh was triggered.
    pub fn refresh_now(&self) -> bool {
        let Some(run) = self.current_run() else {
            trace!("Ignoring manual refresh while paused");
            return false;
        };

        let now = Instant::now();
        {
            let mut last = self
                .last_manual_refresh
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(previous) = *last {
                if now.duration_since(previous) < self.engine.config.manual_refresh_debounce() {
                    trace!("Debounced manual refresh");
                    return false;
                }
            }
            *last = Some(now);
        }

        Engine::spawn_fetch(&self.engine, &run, FetchKind::CacheRates);
        Engine::spawn_fetch(&self.engine, &run, FetchKind::TrackerRates);
        true
    }

    /// Subscribes to rate, market and production rate events
    pub fn subscribe(&self) -> broadcast::Receiver<RateEvent> {
        self.engine.events.subscribe()
    }

    /// Gets the rate from `from` to `to`, at 18 decimals
    ///
    /// Precedence: inverted native rate when `from` is the native coin, the
    /// native rate when `to` is, otherwise the ratio of both USD rates.
    /// `None` means no quote is available.
    pub async fn get_rate(&self, from: &str, to: &str) -> Option<RateValue> {
        self.engine.get_rate(from, to).await
    }

    /// Gets the production rate from `from` to `to`
    ///
    /// Falls back from the direct pair to a composition through the native
    /// coin, then to [`RateCoordinator::get_rate`].
    pub async fn get_cached_production_rate(&self, from: &str, to: &str) -> Option<U256> {
        self.engine.get_cached_production_rate(from, to).await
    }

    /// Gets the token → USD rate, falling back to the tracker store
    pub async fn usd_rate(&self, symbol: &str) -> Option<RateValue> {
        self.engine.usd_rate(symbol).await
    }

    /// Gets the token → native coin rate, falling back to the tracker store
    pub async fn native_rate(&self, symbol: &str) -> Option<RateValue> {
        self.engine.native_rate(symbol).await
    }

    /// Gets the market entry of `pair`
    ///
    /// While no market snapshot exists a zero-valued placeholder is returned,
    /// so callers always have something to render during cold start.
    pub async fn get_market(&self, pair: &str) -> Option<MarketEntry> {
        self.engine.market.get_or_placeholder(pair).await
    }

    /// Gets the 24h volume of `pair`, merging native and wrapped native legs
    pub async fn get_market_volume(&self, pair: &str) -> f64 {
        self.engine.market.volume(pair).await
    }

    /// Gets the current market list
    pub async fn markets(&self) -> Vec<MarketEntry> {
        self.engine.market.entries().await
    }

    /// Sets the pair whose reference rate is refreshed with the cache rates
    pub async fn set_focused_pair(&self, from: &str, to: &str) {
        *self.engine.focused_pair.write().await = Some((from.to_string(), to.to_string()));
    }

    /// Gets the focused trading pair
    pub async fn focused_pair(&self) -> Option<(String, String)> {
        self.engine.focused_pair.read().await.clone()
    }

    /// Refreshes the bridged reference rate of a pair now
    ///
    /// Returns true if production rates were written.
    pub async fn refresh_reference_rate(&self, from: &str, to: &str) -> bool {
        let seq = self.engine.next_seq();
        self.engine.refresh_reference_rate(from, to, seq).await
    }

    /// Gets the injected tracker store
    pub fn tracker_store(&self) -> Arc<dyn TrackerStore> {
        Arc::clone(&self.engine.tracker_store)
    }

    /// Gets the injected platform settings
    pub fn settings(&self) -> Arc<dyn PlatformSettings> {
        Arc::clone(&self.engine.settings)
    }

    /// Gets fetch latency and success metrics of the rates, bridge and market sources
    pub async fn provider_metrics(&self) -> Vec<ProviderMetrics> {
        let mut metrics = Vec::with_capacity(3);
        for collector in self.engine.metrics.collectors() {
            metrics.push(collector.get_metrics().await);
        }
        metrics
    }

    /// Perform a health check on the rate engine
    pub async fn health_check(&self) -> ComponentHealth {
        let engine = &self.engine;
        let mut details = HashMap::new();

        let native_count = engine.caches.native.len().await;
        let usd_count = engine.caches.usd.len().await;
        let production_count = engine.caches.production.len().await;
        let market_count = engine.market.len().await;
        let market_failure = engine.market.last_failure().await;
        let running = self.is_running();

        details.insert("native_rates".to_string(), serde_json::json!(native_count));
        details.insert("usd_rates".to_string(), serde_json::json!(usd_count));
        details.insert("production_rates".to_string(), serde_json::json!(production_count));
        details.insert("markets".to_string(), serde_json::json!(market_count));
        details.insert("running".to_string(), serde_json::json!(running));
        if let Some(updated_at) = engine.market.updated_at().await {
            details.insert(
                "markets_updated_at".to_string(),
                serde_json::json!(updated_at.to_rfc3339()),
            );
        }
        if let Some(failure) = &market_failure {
            details.insert(
                "market_failure".to_string(),
                serde_json::json!(failure.error_message),
            );
        }

        // Per-source fetch metrics
        for metrics in self.provider_metrics().await {
            details.insert(
                format!("{}_source", metrics.provider_name),
                serde_json::json!({
                    "success_rate": metrics.success_rate,
                    "latency_p50_ms": metrics.latency_p50_ms,
                    "latency_p99_ms": metrics.latency_p99_ms,
                    "total_requests": metrics.total_requests,
                    "failed_requests": metrics.failed_requests,
                }),
            );
        }

        let status = if native_count == 0 && usd_count == 0 {
            HealthStatus::Unhealthy
        } else if !running || market_count == 0 || market_failure.is_some() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        let message = match status {
            HealthStatus::Healthy => "Rate engine is running with fresh data".to_string(),
            HealthStatus::Degraded if !running => "Rate engine is paused".to_string(),
            HealthStatus::Degraded => "Rate engine is serving stale market data".to_string(),
            HealthStatus::Unhealthy => "Rate engine has no rate data".to_string(),
        };

        ComponentHealth {
            name: "rate_engine".to_string(),
            status,
            message: Some(message),
            details,
            last_checked: chrono::Utc::now(),
        }
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Option<Lifecycle>> {
        self.lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_run(&self) -> Option<Run> {
        self.lock_lifecycle().as_ref().map(|l| l.run.clone())
    }
}

impl Drop for RateCoordinator {
    fn drop(&mut self) {
        if let Some(lifecycle) = self.lock_lifecycle().take() {
            lifecycle.stop();
        }
    }
}

impl Engine {
    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn interval(&self, kind: FetchKind) -> Duration {
        match kind {
            FetchKind::CacheRates => self.config.cache_rates_interval(),
            FetchKind::TrackerRates => self.config.tracker_rates_interval(),
            FetchKind::PlatformFee => self.config.platform_fee_interval(),
        }
    }

    fn notify(&self, event: RateEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    fn is_native(&self, symbol: &str) -> bool {
        symbol == self.config.native_symbol
            || self
                .registry
                .token_by_symbol(symbol)
                .is_some_and(|token| token.is_native_coin)
    }

    fn decimals_of(&self, symbol: &str) -> u8 {
        self.registry
            .token_by_symbol(symbol)
            .map(|token| token.decimals)
            .unwrap_or(RATE_DECIMALS)
    }

    /// Spawns the timer loop of `kind`; the first tick fires immediately
    fn spawn_timer(engine: &Arc<Self>, run: Run, kind: FetchKind) -> JoinHandle<()> {
        let engine = Arc::clone(engine);
        let period = engine.interval(kind);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = run.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        Self::spawn_fetch(&engine, &run, kind);
                    }
                }
            }
        })
    }

    /// Spawns one fetch of `kind` unless a fetch of that kind is in flight
    fn spawn_fetch(engine: &Arc<Self>, run: &Run, kind: FetchKind) -> bool {
        let Some(guard) = run.try_claim(kind) else {
            trace!(kind = kind.name(), "Fetch already in flight, skipping");
            return false;
        };

        let engine = Arc::clone(engine);
        let cancel = run.cancel.clone();
        tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(kind = kind.name(), "Fetch cancelled");
                }
                _ = engine.run_fetch(kind) => {}
            }
        });
        true
    }

    async fn run_fetch(&self, kind: FetchKind) {
        match kind {
            FetchKind::CacheRates => self.refresh_cache_rates().await,
            FetchKind::TrackerRates => self.refresh_tracker_rates().await,
            FetchKind::PlatformFee => self.refresh_platform_fee().await,
        }
    }

    /// Internal rates, market list and production rates, fetched concurrently
    async fn refresh_cache_rates(&self) {
        let seq = self.next_seq();
        tokio::join!(
            self.refresh_internal_rates(seq),
            self.refresh_markets(seq),
            self.refresh_production(seq),
        );
    }

    async fn refresh_internal_rates(&self, seq: u64) {
        let (native, usd) = tokio::join!(
            self.metrics.rates.track(self.rates.fetch_native_rates()),
            self.metrics.rates.track(self.rates.fetch_usd_rates())
        );

        match native {
            Ok(rates) => {
                self.apply_rates(&self.caches.native, rates, &self.config.native_symbol, seq)
                    .await;
            }
            Err(e) => warn!(error = %e, "Failed to fetch native rates"),
        }
        match usd {
            Ok(rates) => {
                self.apply_rates(&self.caches.usd, rates, &self.config.usd_symbol, seq)
                    .await;
            }
            Err(e) => warn!(error = %e, "Failed to fetch USD rates"),
        }

        // Both legs have reported, one notification for the pair
        self.sync_tracker_store(RateClass::Native, false).await;
        self.sync_tracker_store(RateClass::Usd, false).await;
        self.notify(RateEvent::rates_updated());
    }

    /// Writes quotes keyed by source symbol, dropping quotes for another destination
    async fn apply_rates(&self, cache: &RateCache, rates: Vec<RateValue>, expected_dest: &str, seq: u64) {
        let total = rates.len();
        let entries: Vec<(String, RateValue)> = rates
            .into_iter()
            .filter(|rate| rate.dest == expected_dest)
            .map(|rate| (rate.source.clone(), rate))
            .collect();

        if entries.len() < total {
            debug!(
                cache = cache.name(),
                discarded = total - entries.len(),
                expected_dest,
                "Discarded quotes with unexpected destination"
            );
        }

        let written = cache.insert_many(entries, seq).await;
        debug!(cache = cache.name(), count = written, "Updated rate cache");
    }

    /// Pushes cached native or USD rates into the tracker store
    async fn sync_tracker_store(&self, class: RateClass, notify: bool) {
        match class {
            RateClass::Native => {
                let rates = self.caches.native.values().await;
                self.tracker_store.apply_native_rates(&rates);
            }
            RateClass::Usd => {
                let rates = self.caches.usd.values().await;
                self.tracker_store.apply_usd_rates(&rates);
            }
        }
        if notify {
            self.notify(RateEvent::rates_updated());
        }
    }

    async fn refresh_markets(&self, seq: u64) {
        match self.metrics.markets.track(self.markets.fetch_markets()).await {
            Ok(markets) => {
                let count = markets.len();
                if self.market.replace(markets, seq).await {
                    debug!(count, provider = self.markets.provider_name(), "Updated market list");
                    self.notify(RateEvent::market_updated(count));
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch markets, keeping previous snapshot");
                let message = e.to_string();
                self.market.record_failure(message.clone()).await;
                self.notify(RateEvent::market_fetch_failed(message));
            }
        }
    }

    /// Focused pair reference rate and the full production list
    async fn refresh_production(&self, seq: u64) {
        let focused = self.focused_pair.read().await.clone();
        let reference = async {
            if let Some((from, to)) = focused {
                self.refresh_reference_rate(&from, &to, seq).await;
            }
        };
        tokio::join!(reference, self.refresh_production_list(seq));
    }

    async fn refresh_production_list(&self, seq: u64) -> bool {
        match self
            .metrics
            .bridge
            .track(self.bridge.fetch_production_rates())
            .await
        {
            Ok(rates) => {
                let entries = rates
                    .into_iter()
                    .map(|rate| (rate.pair_key(), rate))
                    .collect();
                let written = self.caches.production.insert_many(entries, seq).await;
                debug!(count = written, "Updated production rates");
                self.notify(RateEvent::production_rate_updated("*"));
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch production rates");
                self.notify(RateEvent::production_rate_fetch_failed("*", e.to_string()));
                false
            }
        }
    }

    /// Bridges the reference rate of a pair through oracle prices in native coin
    ///
    /// Both directions are written under the caller's literal symbols.
    async fn refresh_reference_rate(&self, from: &str, to: &str, seq: u64) -> bool {
        let pair = pair_key(from, to);
        let from_native = self.is_native(from);
        let to_native = self.is_native(to);

        if from_native && to_native {
            debug!(pair = %pair, "Both legs are the native coin, nothing to bridge");
            return false;
        }

        if from_native || to_native {
            let (token, native) = if from_native { (to, from) } else { (from, to) };
            let price = match self.metrics.bridge.track(self.bridge.fetch_bridge_rate(token)).await {
                Ok(price) => usable_price(price),
                Err(e) => {
                    warn!(pair = %pair, error = %e, "Failed to fetch bridge rate");
                    self.notify(RateEvent::production_rate_fetch_failed(pair, e.to_string()));
                    return false;
                }
            };
            let Some(price) = price else {
                self.notify(RateEvent::production_rate_fetch_failed(pair, "no bridge rate"));
                return false;
            };

            let entries = vec![
                (
                    pair_key(token, native),
                    RateValue::from_f64(token, native, price, self.decimals_of(native)),
                ),
                (
                    pair_key(native, token),
                    RateValue::from_f64(native, token, 1.0 / price, self.decimals_of(token)),
                ),
            ];
            self.caches.production.insert_many(entries, seq).await;
            self.notify(RateEvent::production_rate_updated(pair));
            return true;
        }

        let (from_price, to_price) = tokio::join!(
            self.metrics.bridge.track(self.bridge.fetch_bridge_rate(from)),
            self.metrics.bridge.track(self.bridge.fetch_bridge_rate(to))
        );
        let from_price = from_price.ok().and_then(usable_price);
        let to_price = to_price.ok().and_then(usable_price);

        let (Some(from_price), Some(to_price)) = (from_price, to_price) else {
            debug!(pair = %pair, "Missing bridge leg, falling back to the production rate list");
            return self.refresh_production_list(seq).await;
        };

        let entries = vec![
            (
                pair_key(from, to),
                RateValue::from_f64(from, to, from_price / to_price, self.decimals_of(to)),
            ),
            (
                pair_key(to, from),
                RateValue::from_f64(to, from, to_price / from_price, self.decimals_of(from)),
            ),
        ];
        self.caches.production.insert_many(entries, seq).await;
        self.notify(RateEvent::production_rate_updated(pair));
        true
    }

    async fn refresh_tracker_rates(&self) {
        match self.metrics.rates.track(self.rates.fetch_tracker_rates()).await {
            Ok(rates) => {
                debug!(count = rates.len(), provider = self.rates.provider_name(), "Fetched tracker rates");
                self.tracker_store.update_tracker_rates(rates);
                // The cache rates are fresher; only the USD pass notifies
                self.sync_tracker_store(RateClass::Native, false).await;
                self.sync_tracker_store(RateClass::Usd, true).await;
            }
            Err(e) => warn!(error = %e, "Failed to fetch tracker rates"),
        }
    }

    async fn refresh_platform_fee(&self) {
        match self.metrics.rates.track(self.rates.fetch_platform_fee()).await {
            Ok(quote) if quote.success => {
                debug!(fee = quote.fee, "Updated platform fee");
                self.settings.set_platform_fee(quote.fee);
            }
            Ok(_) => trace!("Platform fee response without success flag"),
            Err(e) => trace!(error = %e, "Failed to fetch platform fee"),
        }
    }

    async fn native_rate(&self, symbol: &str) -> Option<RateValue> {
        if let Some(rate) = self.caches.native.get(symbol).await {
            return Some(rate);
        }
        // Tracker records hold 0 for a leg that was never quoted
        let tracked = self
            .tracker_store
            .tracker_rate(symbol)
            .filter(|tracked| tracked.rate_native > 0.0)?;
        Some(RateValue::from_f64(
            symbol,
            self.config.native_symbol.as_str(),
            tracked.rate_native,
            RATE_DECIMALS,
        ))
    }

    async fn usd_rate(&self, symbol: &str) -> Option<RateValue> {
        if let Some(rate) = self.caches.usd.get(symbol).await {
            return Some(rate);
        }
        let tracked = self
            .tracker_store
            .tracker_rate(symbol)
            .filter(|tracked| tracked.rate_usd > 0.0)?;
        Some(RateValue::from_f64(
            symbol,
            self.config.usd_symbol.as_str(),
            tracked.rate_usd,
            RATE_DECIMALS,
        ))
    }

    async fn get_rate(&self, from: &str, to: &str) -> Option<RateValue> {
        if self.is_native(from) {
            if let Some(rate) = self.native_rate(to).await {
                return Some(RateValue::new(from, to, invert(&rate), RATE_DECIMALS));
            }
        }

        if self.is_native(to) {
            if let Some(rate) = self.native_rate(from).await {
                return Some(RateValue::new(from, to, rescale(&rate)?, RATE_DECIMALS));
            }
        }

        let from_usd = self.usd_rate(from).await?;
        let to_usd = self.usd_rate(to).await?;
        if to_usd.is_zero() {
            return None;
        }
        Some(RateValue::new(from, to, ratio(&from_usd, &to_usd)?, RATE_DECIMALS))
    }

    async fn get_cached_production_rate(&self, from: &str, to: &str) -> Option<U256> {
        let production = &self.caches.production;
        if let Some(direct) = production.get(&pair_key(from, to)).await {
            return Some(direct.rate_raw);
        }

        let native = self.config.native_symbol.as_str();
        let to_native = production.get(&pair_key(from, native)).await;
        let from_native = production.get(&pair_key(native, to)).await;
        if let (Some(first), Some(second)) = (to_native, from_native) {
            if let Some(product) = first.rate_raw.checked_mul(second.rate_raw) {
                return Some(product / pow10(RATE_DECIMALS));
            }
        }

        self.get_rate(from, to).await.map(|rate| rate.rate_raw)
    }
}

/// Oracle prices must be positive and finite to bridge through
fn usable_price(price: f64) -> Option<f64> {
    (price.is_finite() && price > 0.0).then_some(price)
}

/// `1 / rate` at 18 decimals, zero when the rate is zero
fn invert(rate: &RateValue) -> U256 {
    if rate.is_zero() {
        return U256::ZERO;
    }
    let scale = pow10(rate.decimals) * pow10(RATE_DECIMALS);
    scale / rate.rate_raw
}

/// `rate` re-encoded at 18 decimals
fn rescale(rate: &RateValue) -> Option<U256> {
    rate.rate_raw
        .checked_mul(pow10(RATE_DECIMALS))
        .map(|scaled| scaled / pow10(rate.decimals))
}

/// `numerator / denominator` at 18 decimals
fn ratio(numerator: &RateValue, denominator: &RateValue) -> Option<U256> {
    let scaled = numerator
        .rate_raw
        .checked_mul(pow10(denominator.decimals))?
        .checked_mul(pow10(RATE_DECIMALS))?;
    let divisor = denominator
        .rate_raw
        .checked_mul(pow10(numerator.decimals))?;
    scaled.checked_div(divisor)
}
