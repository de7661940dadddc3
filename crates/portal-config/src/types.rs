//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [server]                 # listen address
//! [session]                # session cache timing
//! [invoke]                 # remote invocation target and pool
//! [portal]                 # portal auth server
//! [logging]                # log directory and level
//! ```

use std::path::PathBuf;
use std::time::Duration;

use portal_types::config::defaults;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Server configuration.
    pub server: Option<ServerConfig>,

    /// Session cache configuration.
    pub session: Option<SessionConfig>,

    /// Remote invocation configuration.
    pub invoke: Option<InvokeConfig>,

    /// Portal auth server configuration.
    pub portal: Option<PortalSection>,

    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
}

impl PortalConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: PortalConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.session.is_some() {
            self.session = other.session;
        }

        if other.invoke.is_some() {
            self.invoke = other.invoke;
        }

        if other.portal.is_some() {
            self.portal = other.portal;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// A copy with every section filled in.
    pub fn resolved(&self) -> PortalConfig {
        PortalConfig {
            server: Some(self.server()),
            session: Some(self.session()),
            invoke: Some(self.invoke()),
            portal: Some(self.portal()),
            logging: Some(self.logging()),
        }
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    pub fn invoke(&self) -> InvokeConfig {
        self.invoke.clone().unwrap_or_default()
    }

    pub fn portal(&self) -> PortalSection {
        self.portal.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        let session = self.session();
        if session.sweep_interval_secs == 0 {
            return Err(invalid("session.sweep_interval_secs", "must be at least 1"));
        }
        if session.request_timeout_secs == 0 {
            return Err(invalid("session.request_timeout_secs", "must be at least 1"));
        }
        // A call may hold its session for up to the request timeout; the
        // sweep must not close it underneath.
        if session.idle_timeout_secs < session.request_timeout_secs {
            return Err(invalid(
                "session.idle_timeout_secs",
                "must be at least session.request_timeout_secs",
            ));
        }

        let invoke = self.invoke();
        if invoke.pool_capacity == 0 {
            return Err(invalid("invoke.pool_capacity", "must be at least 1"));
        }
        if invoke.timeout_secs == 0 {
            return Err(invalid("invoke.timeout_secs", "must be at least 1"));
        }
        if invoke.endpoint.is_empty() {
            return Err(invalid("invoke.endpoint", "must not be empty"));
        }
        if self.portal().base_url.is_empty() {
            return Err(invalid("portal.base_url", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::DEFAULT_PORT,
            bind: defaults::DEFAULT_BIND.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Session cache configuration.
///
/// ```toml
/// [session]
/// sweep_interval_secs = 60
/// idle_timeout_secs = 600
/// request_timeout_secs = 20
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds between eviction sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds a session may stay unused before it is evicted.
    pub idle_timeout_secs: u64,
    /// Timeout in seconds for logins and portal calls.
    pub request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: defaults::SWEEP_INTERVAL_SECS,
            idle_timeout_secs: defaults::IDLE_TIMEOUT_SECS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl portal_types::ConfigProvider for SessionConfig {}

impl portal_types::HasSessionConfig for SessionConfig {
    fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Invocation Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default invocation endpoint.
pub const DEFAULT_INVOKE_ENDPOINT: &str = "http://127.0.0.1:9000/functions";

/// Default function handling portal operations.
pub const DEFAULT_INVOKE_FUNCTION: &str = "mycqu";

/// Remote invocation configuration.
///
/// ```toml
/// [invoke]
/// endpoint = "http://127.0.0.1:9000/functions"
/// function = "mycqu"
/// pool_capacity = 8
/// timeout_secs = 20
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokeConfig {
    /// Base URL; functions are reached at `{endpoint}/{function}`.
    pub endpoint: String,
    /// Function that serves `[surface, operation]` targets.
    pub function: String,
    /// Maximum live connections to the endpoint.
    pub pool_capacity: usize,
    /// Timeout in seconds for one invocation.
    pub timeout_secs: u64,
}

impl Default for InvokeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_INVOKE_ENDPOINT.to_string(),
            function: DEFAULT_INVOKE_FUNCTION.to_string(),
            pool_capacity: defaults::POOL_CAPACITY,
            timeout_secs: defaults::INVOKE_TIMEOUT_SECS,
        }
    }
}

impl portal_types::ConfigProvider for InvokeConfig {}

impl portal_types::HasInvokeConfig for InvokeConfig {
    fn pool_capacity(&self) -> usize {
        self.pool_capacity
    }

    fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Portal Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default portal auth server.
pub const DEFAULT_PORTAL_BASE_URL: &str = "https://sso.cqu.edu.cn";

/// Portal auth server section (`[portal]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSection {
    /// Base URL of the auth server; logins go to `{base_url}/login`.
    pub base_url: String,
}

impl Default for PortalSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PORTAL_BASE_URL.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for rotated JSON log files. Defaults to the platform data dir.
    pub dir: Option<PathBuf>,
    /// Default filter directive for the console.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// The configured log dir, else `<data dir>/portal/logs`.
    pub fn effective_dir(&self) -> Option<PathBuf> {
        self.dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("portal").join("logs")))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
