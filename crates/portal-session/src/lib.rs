//! Authenticated session cache with idle eviction.
//!
//! This crate keeps one logged-in portal session per `(surface, identity)`
//! pair and shares it between concurrent requests:
//! - Cache misses open a fresh transport and run the caller's login on it
//! - Concurrent misses for the same key share a single login
//! - A background sweep closes and drops sessions idle past a threshold
//!
//! # Example
//!
//! ```rust,ignore
//! use portal_session::{CacheConfig, SessionCache};
//!
//! let config = CacheConfig::new(
//!     Duration::from_secs(60),  // sweep interval
//!     Duration::from_secs(600), // idle threshold
//!     Duration::from_secs(20),  // login timeout
//! );
//! let cache = SessionCache::new(connector, config);
//! let _eviction = cache.spawn_eviction();
//!
//! let session = cache
//!     .acquire("card", "20210001", |transport| login_card(transport, password))
//!     .await?;
//! ```

mod cache;
mod config;
mod error;
mod eviction;
mod session;

pub use cache::SessionCache;
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use eviction::{EvictionHandle, SweepReport};
pub use session::{Connector, Session, SessionHandle, SessionKey};
