//! Session keys, cached sessions and the transport seams.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// An authenticated handle that can be shut down.
#[async_trait]
pub trait SessionHandle: Send + Sync + 'static {
    /// Release the handle's underlying resources.
    async fn close(&self) -> Result<()>;
}

/// Opens fresh, unauthenticated transports for logins.
pub trait Connector: Send + Sync + 'static {
    /// The handle type produced by a successful login.
    type Handle: SessionHandle;

    /// Open a fresh transport.
    fn connect(&self) -> Result<Self::Handle>;
}

/// Cache key: a backend surface plus the caller's identity on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    surface: String,
    identity: String,
}

impl SessionKey {
    /// Build a key, rejecting empty components.
    pub fn new(surface: impl Into<String>, identity: impl Into<String>) -> Result<Self> {
        let surface = surface.into();
        let identity = identity.into();
        if surface.is_empty() {
            return Err(Error::InvalidKey("surface is empty".into()));
        }
        if identity.is_empty() {
            return Err(Error::InvalidKey("identity is empty".into()));
        }
        Ok(Self { surface, identity })
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.surface, self.identity)
    }
}

/// A cached, logged-in session.
///
/// Cloning is cheap and every clone refers to the same handle. Callers may
/// keep using a clone after the cache has evicted it; the handle will have
/// been closed by then.
pub struct Session<H> {
    inner: Arc<SessionInner<H>>,
}

struct SessionInner<H> {
    key: SessionKey,
    handle: H,
    created_at: Instant,
    last_used: Mutex<Instant>,
}

impl<H> Session<H> {
    pub(crate) fn new(key: SessionKey, handle: H) -> Self {
        let now = Instant::now();
        Self {
            inner: Arc::new(SessionInner {
                key,
                handle,
                created_at: now,
                last_used: Mutex::new(now),
            }),
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.inner.key
    }

    pub fn surface(&self) -> &str {
        self.inner.key.surface()
    }

    pub fn identity(&self) -> &str {
        self.inner.key.identity()
    }

    /// The authenticated handle.
    pub fn handle(&self) -> &H {
        &self.inner.handle
    }

    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    /// When the cache last handed this session out.
    pub fn last_used(&self) -> Instant {
        *self.inner.last_used.lock()
    }

    /// How long the session has gone unused as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used())
    }

    /// Whether both values refer to the same cached session.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn touch(&self) {
        *self.inner.last_used.lock() = Instant::now();
    }
}

impl<H> Clone for Session<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H> fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("key", &self.inner.key)
            .field("created_at", &self.inner.created_at)
            .field("last_used", &self.last_used())
            .finish()
    }
}
