//! Session cache with single-flight login and idle eviction.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::CacheConfig;
use crate::error::Error;
use crate::eviction::SweepReport;
use crate::session::{Connector, Session, SessionHandle, SessionKey};

type LoginGate = Arc<AsyncMutex<()>>;

/// Shared state behind every clone of a [`SessionCache`].
struct CacheInner<C: Connector> {
    /// Logged-in sessions by key.
    sessions: RwLock<HashMap<SessionKey, Session<C::Handle>>>,

    /// Per-key gates held while a login for that key is running.
    logins: parking_lot::Mutex<HashMap<SessionKey, LoginGate>>,

    /// Opens fresh transports for logins.
    connector: C,

    config: CacheConfig,
}

/// Cache of authenticated sessions keyed by `(surface, identity)`.
///
/// This cache provides:
/// - At most one live session per key
/// - One login per key even under concurrent misses
/// - Idle eviction that closes handles outside the lock
///
/// Cloning is cheap; every clone shares the same sessions.
pub struct SessionCache<C: Connector> {
    inner: Arc<CacheInner<C>>,
}

impl<C: Connector> Clone for SessionCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> SessionCache<C> {
    /// Create an empty cache.
    pub fn new(connector: C, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                sessions: RwLock::new(HashMap::new()),
                logins: parking_lot::Mutex::new(HashMap::new()),
                connector,
                config,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Return the session for `(surface, identity)`, logging in on a miss.
    ///
    /// A hit refreshes the session's last-used time and never calls `login`.
    /// On a miss, `login` receives a fresh transport and returns the
    /// authenticated handle; it is bounded by the configured request timeout.
    /// A failed login is returned unchanged and leaves the cache untouched.
    pub async fn acquire<F, Fut, E>(
        &self,
        surface: &str,
        identity: &str,
        login: F,
    ) -> std::result::Result<Session<C::Handle>, E>
    where
        F: FnOnce(C::Handle) -> Fut + Send,
        Fut: Future<Output = std::result::Result<C::Handle, E>> + Send,
        E: From<Error> + Send,
    {
        let key = SessionKey::new(surface, identity)?;

        if let Some(session) = self.lookup(&key).await {
            return Ok(session);
        }

        let _gate = self.enter_login(&key).await;

        // Another caller may have finished the login while we waited.
        if let Some(session) = self.lookup(&key).await {
            trace!(key = %key, "Session created by concurrent login");
            return Ok(session);
        }

        self.login(key, login).await
    }

    /// Look up a session without refreshing it.
    pub async fn peek(&self, surface: &str, identity: &str) -> Option<Session<C::Handle>> {
        let key = SessionKey::new(surface, identity).ok()?;
        self.inner.sessions.read().await.get(&key).cloned()
    }

    pub async fn contains(&self, surface: &str, identity: &str) -> bool {
        self.peek(surface, identity).await.is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.sessions.read().await.is_empty()
    }

    /// Evict every session idle for at least the idle timeout.
    ///
    /// Evicted entries are removed before their handles are closed, so no
    /// caller can be handed a session that is being torn down. Close
    /// failures are logged and do not stop the sweep.
    pub async fn sweep(&self) -> SweepReport {
        let idle_timeout = self.inner.config.idle_timeout;

        let evicted: Vec<Session<C::Handle>> = {
            let mut sessions = self.inner.sessions.write().await;
            let now = Instant::now();
            let expired: Vec<SessionKey> = sessions
                .iter()
                .filter(|(_, session)| session.idle_for(now) >= idle_timeout)
                .map(|(key, _)| key.clone())
                .collect();
            expired
                .iter()
                .filter_map(|key| sessions.remove(key))
                .collect()
        };

        if evicted.is_empty() {
            trace!("Sweep found no idle sessions");
            return SweepReport::default();
        }

        let report = close_all(&evicted).await;
        info!(
            evicted = report.evicted,
            close_failures = report.close_failures,
            "Evicted idle sessions"
        );
        report
    }

    /// Remove and close every session.
    pub async fn shutdown(&self) -> SweepReport {
        let drained: Vec<Session<C::Handle>> = {
            let mut sessions = self.inner.sessions.write().await;
            sessions.drain().map(|(_, session)| session).collect()
        };
        let report = close_all(&drained).await;
        debug!(closed = report.evicted, "Session cache shut down");
        report
    }

    async fn lookup(&self, key: &SessionKey) -> Option<Session<C::Handle>> {
        let sessions = self.inner.sessions.read().await;
        let session = sessions.get(key)?.clone();
        // Touched under the read lock so a sweep cannot interleave.
        session.touch();
        trace!(key = %key, "Session cache hit");
        Some(session)
    }

    async fn login<F, Fut, E>(
        &self,
        key: SessionKey,
        login: F,
    ) -> std::result::Result<Session<C::Handle>, E>
    where
        F: FnOnce(C::Handle) -> Fut + Send,
        Fut: Future<Output = std::result::Result<C::Handle, E>> + Send,
        E: From<Error> + Send,
    {
        debug!(key = %key, "Session cache miss, logging in");

        let transport = self.inner.connector.connect()?;
        let timeout = self.inner.config.request_timeout;
        let handle = match tokio::time::timeout(timeout, login(transport)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(key = %key, timeout = ?timeout, "Login timed out");
                return Err(Error::Timeout(timeout).into());
            }
        };

        let session = Session::new(key.clone(), handle);
        let (replaced, size) = {
            let mut sessions = self.inner.sessions.write().await;
            let replaced = sessions.insert(key.clone(), session.clone());
            (replaced, sessions.len())
        };

        if let Some(stale) = replaced {
            warn!(key = %key, "Replaced an existing session");
            if let Err(e) = stale.handle().close().await {
                warn!(key = %key, error = %e, "Failed to close replaced session");
            }
        }

        info!(key = %key, cached = size, "Session logged in");
        Ok(session)
    }

    async fn enter_login(&self, key: &SessionKey) -> LoginPermit<'_, C> {
        let gate = {
            let mut logins = self.inner.logins.lock();
            Arc::clone(logins.entry(key.clone()).or_default())
        };
        LoginPermit {
            inner: &self.inner,
            key: key.clone(),
            guard: Some(gate.lock_owned().await),
        }
    }
}

async fn close_all<H: SessionHandle>(sessions: &[Session<H>]) -> SweepReport {
    let results = join_all(sessions.iter().map(|session| session.handle().close())).await;

    let mut report = SweepReport {
        evicted: sessions.len(),
        close_failures: 0,
    };
    for (session, result) in sessions.iter().zip(results) {
        if let Err(e) = result {
            report.close_failures += 1;
            warn!(key = %session.key(), error = %e, "Failed to close session");
        }
    }
    report
}

/// Held for the duration of one login; removes the key's gate once unused.
struct LoginPermit<'a, C: Connector> {
    inner: &'a CacheInner<C>,
    key: SessionKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<C: Connector> Drop for LoginPermit<'_, C> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut logins = self.inner.logins.lock();
        let unused = logins
            .get(&self.key)
            .is_some_and(|gate| Arc::strong_count(gate) == 1);
        if unused {
            logins.remove(&self.key);
        }
    }
}
