//! # Token Rate SDK
//!
//! Aggregates exchange rates for a wallet from several remote sources and
//! serves them from in-memory caches:
//!
//! - internal token → native coin and token → USD rates
//! - bulk tracker rates, mirrored into a long-lived [`TrackerStore`]
//! - on-chain / oracle "production" rates, including bridged pairs
//! - the market list with merged native/wrapped volumes
//! - the platform fee
//!
//! Rates are 256-bit fixed-point integers; [`display_rate`] renders them for
//! people.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use token_rate_sdk::{EngineConfig, RateCoordinator, StaticTokenRegistry, TokenInfo};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(StaticTokenRegistry::new(vec![
//!     TokenInfo::native("ETH", 18),
//!     TokenInfo::new("WETH", 18),
//!     TokenInfo::new("KNC", 18),
//! ]));
//! let coordinator = RateCoordinator::from_config(EngineConfig::from_env(), registry)?;
//! coordinator.resume();
//!
//! if let Some(raw) = coordinator.get_cached_production_rate("KNC", "ETH").await {
//!     println!("KNC/ETH: {}", token_rate_sdk::display_rate(raw, 18));
//! }
//! coordinator.pause();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod formatter;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod settings;
pub mod store;
pub mod tracker_store;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use coordinator::{EngineDeps, RateCoordinator};
pub use error::ProviderError;
pub use formatter::{display_rate, display_rate_str};
pub use metrics::ProviderMetrics;
pub use provider::{BridgeRateSource, MarketSource, RateSource};
pub use registry::{StaticTokenRegistry, TokenInfo, TokenRegistry};
pub use settings::{InMemoryPlatformSettings, PlatformSettings};
pub use tracker_store::{InMemoryTrackerStore, TrackerStore};
pub use types::{
    ComponentHealth, FetchKind, HealthStatus, MarketEntry, PlatformFeeQuote, RateEvent, RateValue,
    TrackerRate,
};
