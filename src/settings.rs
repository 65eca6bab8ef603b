//! Process-wide settings written by the rate engine

use std::sync::atomic::{AtomicI64, Ordering};

/// Sink for the platform fee refreshed by the engine
pub trait PlatformSettings: Send + Sync {
    /// Persists the platform fee, in basis points
    fn set_platform_fee(&self, fee: i64);

    /// Gets the last persisted platform fee
    fn platform_fee(&self) -> Option<i64>;
}

/// Settings kept in process memory
#[derive(Debug)]
pub struct InMemoryPlatformSettings {
    fee: AtomicI64,
}

impl InMemoryPlatformSettings {
    const UNSET: i64 = i64::MIN;

    pub fn new() -> Self {
        Self {
            fee: AtomicI64::new(Self::UNSET),
        }
    }
}

impl Default for InMemoryPlatformSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformSettings for InMemoryPlatformSettings {
    fn set_platform_fee(&self, fee: i64) {
        self.fee.store(fee, Ordering::Relaxed);
    }

    fn platform_fee(&self) -> Option<i64> {
        match self.fee.load(Ordering::Relaxed) {
            Self::UNSET => None,
            fee => Some(fee),
        }
    }
}
