//! Periodic idle eviction.

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::SessionCache;
use crate::session::Connector;

/// Outcome of one eviction sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions removed from the cache.
    pub evicted: usize,
    /// Removed sessions whose handle failed to close.
    pub close_failures: usize,
}

/// Handle to a running eviction loop. The loop stops when this is dropped.
#[derive(Debug)]
pub struct EvictionHandle {
    task: JoinHandle<()>,
}

impl EvictionHandle {
    /// Stop the loop. An in-flight sweep is abandoned at its next await point.
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for EvictionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<C: Connector> SessionCache<C> {
    /// Start the eviction loop for this cache.
    ///
    /// Each iteration waits one sweep interval, then runs [`SessionCache::sweep`].
    /// Failures inside a sweep are logged there and never end the loop.
    pub fn spawn_eviction(&self) -> EvictionHandle {
        let cache = self.clone();
        let interval = self.config().sweep_interval;
        debug!(interval = ?interval, "Starting session eviction");

        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                cache.sweep().await;
            }
        });
        EvictionHandle { task }
    }
}
