//! Bounded pool of reusable outbound connections.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::outcome::InvocationOutcome;

/// A connection to the remote invocation target.
#[async_trait]
pub trait RemoteConnection: Send + Sync + 'static {
    /// Send `payload` to `function` and decode the structured reply.
    async fn call(&self, function: &str, payload: &Value) -> Result<InvocationOutcome>;

    /// Release the connection's resources.
    async fn close(&self) -> Result<()>;
}

/// Creates connections for a pool on demand.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: RemoteConnection;

    async fn create(&self) -> Result<Self::Connection>;
}

struct Idle<C> {
    connection: C,
    created_at: Instant,
}

struct PoolState<C> {
    /// Returned connections, oldest first.
    idle: VecDeque<Idle<C>>,
    /// Live connections, idle plus checked out.
    created: usize,
    closed: bool,
}

struct PoolInner<F: ConnectionFactory> {
    factory: F,
    capacity: usize,
    /// One permit per connection that may be checked out. Fair, so waiters
    /// are served in arrival order.
    permits: Arc<Semaphore>,
    state: Mutex<PoolState<F::Connection>>,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub created: usize,
    pub idle: usize,
}

/// Bounded pool of connections to a single remote target.
///
/// Connections are created lazily up to `capacity`. When every connection
/// is checked out, [`ConnectionPool::get`] waits until one is returned.
pub struct ConnectionPool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ConnectionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Create an empty pool. A capacity of zero is raised to one.
    pub fn new(factory: F, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                factory,
                capacity,
                permits: Arc::new(Semaphore::new(capacity)),
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    created: 0,
                    closed: false,
                }),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            capacity: self.inner.capacity,
            created: state.created,
            idle: state.idle.len(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Check out a connection, creating or waiting for one as needed.
    pub async fn get(&self) -> Result<PooledConnection<F>> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::Closed)?;

        let reused = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(Error::Closed);
            }
            // Holding a permit with nothing idle means there is room.
            state.idle.pop_front()
        };

        if let Some(idle) = reused {
            trace!("Reusing pooled connection");
            return Ok(self.checked_out(idle.connection, idle.created_at, permit));
        }

        match self.inner.factory.create().await {
            Ok(connection) => {
                let created = {
                    let mut state = self.inner.state.lock();
                    state.created += 1;
                    state.created
                };
                debug!(created, capacity = self.inner.capacity, "Opened pooled connection");
                Ok(self.checked_out(connection, Instant::now(), permit))
            }
            Err(e) => {
                warn!(error = %e, "Failed to open pooled connection");
                Err(e)
            }
        }
    }

    /// Return a connection. Always accepted; after [`ConnectionPool::close`]
    /// the connection is closed instead of queued.
    pub async fn put(&self, mut pooled: PooledConnection<F>) {
        let Some(connection) = pooled.connection.take() else {
            return;
        };

        let rejected = {
            let mut state = self.inner.state.lock();
            if state.closed {
                state.created -= 1;
                Some(connection)
            } else {
                state.idle.push_back(Idle {
                    connection,
                    created_at: pooled.created_at,
                });
                None
            }
        };
        // The permit goes back only after the connection is queued.
        drop(pooled);

        if let Some(connection) = rejected
            && let Err(e) = connection.close().await
        {
            warn!(error = %e, "Failed to close connection returned after shutdown");
        }
    }

    /// Close every idle connection and refuse further checkouts.
    ///
    /// Pending and later [`ConnectionPool::get`] calls fail with
    /// [`Error::Closed`]. Close failures are logged and suppressed.
    pub async fn close(&self) {
        self.inner.permits.close();
        let drained: Vec<Idle<F::Connection>> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.created -= drained.len();
            drained
        };

        let results = join_all(drained.iter().map(|idle| idle.connection.close())).await;
        let failures = results.iter().filter(|r| r.is_err()).count();
        for e in results.into_iter().filter_map(|r| r.err()) {
            warn!(error = %e, "Failed to close pooled connection");
        }
        debug!(closed = drained.len(), failures, "Connection pool closed");
    }

    fn checked_out(
        &self,
        connection: F::Connection,
        created_at: Instant,
        permit: OwnedSemaphorePermit,
    ) -> PooledConnection<F> {
        PooledConnection {
            connection: Some(connection),
            created_at,
            pool: Arc::clone(&self.inner),
            _permit: permit,
        }
    }
}

/// A checked-out connection.
///
/// Give it back with [`ConnectionPool::put`]. Dropping it instead discards
/// the connection and frees its capacity slot.
pub struct PooledConnection<F: ConnectionFactory> {
    connection: Option<F::Connection>,
    created_at: Instant,
    pool: Arc<PoolInner<F>>,
    _permit: OwnedSemaphorePermit,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

impl<F: ConnectionFactory> Deref for PooledConnection<F> {
    type Target = F::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(connection) => connection,
            // Only `put` takes the connection, and it consumes the wrapper.
            None => unreachable!("pooled connection used after return"),
        }
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        if self.connection.take().is_some() {
            self.pool.state.lock().created -= 1;
            debug!("Pooled connection discarded without return");
        }
    }
}
