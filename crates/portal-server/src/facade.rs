//! Per-surface service facades.
//!
//! A facade owns one surface's session cache and its authenticator. Domain
//! calls borrow a cached session through [`SurfaceFacade::call`]; only the
//! cache's eviction ever closes a session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use portal_session::{Connector, EvictionHandle, Session, SessionCache};
use portal_types::PortalError;
use portal_types::error::MISSING_LOGIN_INFO_MESSAGE;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::surface::Surface;

/// Surface login capability: `login(transport, identity, credential)`.
#[async_trait]
pub trait Authenticator<H>: Send + Sync + 'static {
    async fn login(&self, transport: H, identity: &str, credential: &str) -> Result<H, PortalError>;
}

/// Snapshot of a cached session returned to RPC callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub surface: String,
    pub identity: String,
    /// Unix milliseconds of the last acquire.
    pub last_used_ms: i64,
    /// Unix milliseconds of the login.
    pub created_ms: i64,
}

impl SessionInfo {
    pub fn from_session<H>(session: &Session<H>) -> Self {
        let now = Instant::now();
        Self {
            surface: session.surface().to_string(),
            identity: session.identity().to_string(),
            last_used_ms: unix_millis_before(now.saturating_duration_since(session.last_used())),
            created_ms: unix_millis_before(now.saturating_duration_since(session.created_at())),
        }
    }
}

fn unix_millis_before(elapsed: Duration) -> i64 {
    let elapsed = TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::zero());
    (Utc::now() - elapsed).timestamp_millis()
}

/// Object-safe view of a facade, used by the router.
#[async_trait]
pub trait SurfaceService: Send + Sync {
    fn surface(&self) -> Surface;

    /// Log in or reuse the cached session and describe it.
    async fn open_session(&self, identity: &str, credential: &str) -> Result<SessionInfo, PortalError>;

    /// Start this surface's eviction loop.
    fn start_eviction(&self) -> EvictionHandle;

    /// Close every cached session.
    async fn shutdown(&self);
}

/// Session-backed access to one surface.
pub struct SurfaceFacade<C: Connector> {
    surface: Surface,
    cache: SessionCache<C>,
    authenticator: Arc<dyn Authenticator<C::Handle>>,
}

impl<C: Connector> SurfaceFacade<C> {
    pub fn new(
        surface: Surface,
        cache: SessionCache<C>,
        authenticator: impl Authenticator<C::Handle>,
    ) -> Self {
        Self {
            surface,
            cache,
            authenticator: Arc::new(authenticator),
        }
    }

    pub fn cache(&self) -> &SessionCache<C> {
        &self.cache
    }

    /// The cached session for `identity`, logging in on a miss.
    pub async fn session(
        &self,
        identity: &str,
        credential: &str,
    ) -> Result<Session<C::Handle>, PortalError> {
        if identity.is_empty() || credential.is_empty() {
            return Err(PortalError::InvalidParameter(
                MISSING_LOGIN_INFO_MESSAGE.to_string(),
            ));
        }

        let authenticator = Arc::clone(&self.authenticator);
        let login_identity = identity.to_string();
        let credential = credential.to_string();
        self.cache
            .acquire(self.surface.as_str(), identity, move |transport| async move {
                authenticator
                    .login(transport, &login_identity, &credential)
                    .await
            })
            .await
    }

    /// Run `op` against the cached session, bounded by the request timeout.
    pub async fn call<T, F, Fut>(
        &self,
        identity: &str,
        credential: &str,
        op: F,
    ) -> Result<T, PortalError>
    where
        F: FnOnce(Session<C::Handle>) -> Fut + Send,
        Fut: Future<Output = Result<T, PortalError>> + Send,
        T: Send,
    {
        let session = self.session(identity, credential).await?;
        let timeout = self.cache.config().request_timeout;
        match tokio::time::timeout(timeout, op(session)).await {
            Ok(result) => result,
            Err(_) => Err(PortalError::Timeout(timeout)),
        }
    }
}

#[async_trait]
impl<C: Connector> SurfaceService for SurfaceFacade<C> {
    fn surface(&self) -> Surface {
        self.surface
    }

    async fn open_session(&self, identity: &str, credential: &str) -> Result<SessionInfo, PortalError> {
        self.call(identity, credential, |session| async move {
            Ok(SessionInfo::from_session(&session))
        })
        .await
    }

    fn start_eviction(&self) -> EvictionHandle {
        self.cache.spawn_eviction()
    }

    async fn shutdown(&self) {
        self.cache.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use portal_session::{CacheConfig, SessionHandle};
    use portal_types::ErrorKind;

    struct NullHandle;

    #[async_trait]
    impl SessionHandle for NullHandle {
        async fn close(&self) -> portal_session::Result<()> {
            Ok(())
        }
    }

    struct NullConnector;

    impl Connector for NullConnector {
        type Handle = NullHandle;

        fn connect(&self) -> portal_session::Result<NullHandle> {
            Ok(NullHandle)
        }
    }

    struct PasswordCheck {
        logins: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Authenticator<NullHandle> for PasswordCheck {
        async fn login(
            &self,
            transport: NullHandle,
            _identity: &str,
            credential: &str,
        ) -> Result<NullHandle, PortalError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if credential == "secret" {
                Ok(transport)
            } else {
                Err(PortalError::IncorrectLoginCredentials)
            }
        }
    }

    fn facade() -> (SurfaceFacade<NullConnector>, Arc<AtomicUsize>) {
        let logins = Arc::new(AtomicUsize::new(0));
        let cache = SessionCache::new(
            NullConnector,
            CacheConfig::new(
                Duration::from_secs(60),
                Duration::from_secs(600),
                Duration::from_secs(20),
            ),
        );
        let authenticator = PasswordCheck {
            logins: Arc::clone(&logins),
        };
        (SurfaceFacade::new(Surface::Card, cache, authenticator), logins)
    }

    #[tokio::test]
    async fn test_call_reuses_session() {
        let (facade, logins) = facade();

        let first = facade.open_session("u1", "secret").await.unwrap();
        let second = facade.open_session("u1", "secret").await.unwrap();

        assert_eq!(logins.load(Ordering::SeqCst), 1);
        assert_eq!(first.surface, "card");
        assert_eq!(second.identity, "u1");
        assert!((first.created_ms - second.created_ms).abs() <= 5);
        assert!(second.last_used_ms >= first.last_used_ms - 5);
    }

    #[tokio::test]
    async fn test_missing_login_info() {
        let (facade, logins) = facade();
        let err = facade.open_session("u1", "").await.unwrap_err();
        let classified = err.classify().unwrap();
        assert_eq!(classified.kind(), ErrorKind::InvalidParameter);
        assert_eq!(classified.user_message(), MISSING_LOGIN_INFO_MESSAGE);
        assert_eq!(logins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_failure_not_cached() {
        let (facade, _) = facade();
        assert_eq!(
            facade.open_session("u1", "wrong").await.unwrap_err(),
            PortalError::IncorrectLoginCredentials
        );
        assert!(facade.cache().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_operation_times_out() {
        let (facade, _) = facade();
        let err = facade
            .call("u1", "secret", |_session| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, PortalError::Timeout(Duration::from_secs(20)));
        // The session stays cached; request handling never closes it.
        assert!(facade.cache().contains("card", "u1").await);
    }
}
