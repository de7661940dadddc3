//! Configuration traits for decoupled config passing between crates.
//!
//! The session and invocation crates only need a handful of durations and a
//! capacity. These traits let them accept any config type that can provide
//! those values, without knowing about the TOML schema.

use std::time::Duration;

/// Base trait for all configuration types.
pub trait ConfigProvider: Clone + Send + Sync + 'static {}

/// Session cache configuration.
///
/// All three values are required inputs of the cache; the core never falls
/// back to a built-in default.
pub trait HasSessionConfig: ConfigProvider {
    /// Interval between eviction sweeps.
    fn sweep_interval(&self) -> Duration;

    /// Maximum time a session may go unused before a sweep evicts it.
    fn idle_timeout(&self) -> Duration;

    /// Bound on each login handshake and domain call.
    fn request_timeout(&self) -> Duration;
}

/// Remote invocation configuration.
pub trait HasInvokeConfig: ConfigProvider {
    /// Maximum number of live connections to the invocation target.
    fn pool_capacity(&self) -> usize;

    /// Bound on each remote invocation.
    fn invoke_timeout(&self) -> Duration;
}

// ─────────────────────────────────────────────────────────────────────────────
// Defaults (used by the configuration layer only)
// ─────────────────────────────────────────────────────────────────────────────

pub mod defaults {
    use std::time::Duration;

    pub const SWEEP_INTERVAL_SECS: u64 = 60;
    pub const IDLE_TIMEOUT_SECS: u64 = 600;
    pub const REQUEST_TIMEOUT_SECS: u64 = 20;
    pub const POOL_CAPACITY: usize = 8;
    pub const INVOKE_TIMEOUT_SECS: u64 = 20;
    pub const DEFAULT_PORT: u16 = 53211;
    pub const DEFAULT_BIND: &str = "127.0.0.1";

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }

    pub fn idle_timeout() -> Duration {
        Duration::from_secs(IDLE_TIMEOUT_SECS)
    }

    pub fn request_timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    pub fn invoke_timeout() -> Duration {
        Duration::from_secs(INVOKE_TIMEOUT_SECS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simple wrapper types for standalone config passing
// ─────────────────────────────────────────────────────────────────────────────

/// Standalone session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfigProvider {
    pub sweep_interval: Duration,
    pub idle_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for SessionConfigProvider {
    fn default() -> Self {
        Self {
            sweep_interval: defaults::sweep_interval(),
            idle_timeout: defaults::idle_timeout(),
            request_timeout: defaults::request_timeout(),
        }
    }
}

impl ConfigProvider for SessionConfigProvider {}

impl HasSessionConfig for SessionConfigProvider {
    fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Standalone invocation configuration.
#[derive(Debug, Clone)]
pub struct InvokeConfigProvider {
    pub pool_capacity: usize,
    pub invoke_timeout: Duration,
}

impl Default for InvokeConfigProvider {
    fn default() -> Self {
        Self {
            pool_capacity: defaults::POOL_CAPACITY,
            invoke_timeout: defaults::invoke_timeout(),
        }
    }
}

impl ConfigProvider for InvokeConfigProvider {}

impl HasInvokeConfig for InvokeConfigProvider {
    fn pool_capacity(&self) -> usize {
        self.pool_capacity
    }

    fn invoke_timeout(&self) -> Duration {
        self.invoke_timeout
    }
}
