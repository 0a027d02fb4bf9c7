//! Store Configuration
//!
//! Sizing and timing knobs for a [`StorageEngine`](crate::storage::StorageEngine).
//! Defaults suit an interactive shell; hosts override them with the
//! `with_*` builder methods.

use std::time::Duration;

/// Number of pre-sized value slots kept by the allocation pool.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Interval between background expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for a store instance.
///
/// # Example
///
/// ```
/// use keystash::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_pool_capacity(4096)
///     .with_sweep_interval(Duration::from_millis(100));
/// assert_eq!(config.pool_capacity, 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Slots reserved up front for values (default: 1024).
    /// Values beyond this are heap allocated individually.
    pub pool_capacity: usize,

    /// Interval between background expiry sweeps (default: 250ms)
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of pooled value slots.
    ///
    /// A capacity of zero disables pooling; every value is then allocated
    /// on the heap.
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Sets the interval between background expiry sweeps.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
