//! Configuration for the session cache.

use std::time::Duration;

use portal_types::HasSessionConfig;

/// Configuration for the session cache.
///
/// Every value is required; the cache has no built-in defaults.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Interval between eviction sweeps.
    pub sweep_interval: Duration,

    /// Sessions unused for this long are evicted by the next sweep.
    pub idle_timeout: Duration,

    /// Bound on each login handshake.
    pub request_timeout: Duration,
}

impl CacheConfig {
    /// Create a configuration from explicit values.
    pub fn new(sweep_interval: Duration, idle_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            sweep_interval,
            idle_timeout,
            request_timeout,
        }
    }

    /// Create a configuration from any session config provider.
    pub fn from_provider<C: HasSessionConfig>(config: &C) -> Self {
        Self::new(
            config.sweep_interval(),
            config.idle_timeout(),
            config.request_timeout(),
        )
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the idle threshold.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the login timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
