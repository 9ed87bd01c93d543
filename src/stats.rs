//! Live pool-state accessors sampled by gauges

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Read-only view of a pool's current connection counts.
///
/// The telemetry tracker registers gauges whose callbacks read these values
/// at sample time, so implementations must be cheap, non-blocking, and safe
/// to call from any thread at any frequency. Callbacks run on the metrics
/// backend's sampling thread; they must not panic.
pub trait PoolStats: Send + Sync {
    /// Total connections currently owned by the pool (idle + active).
    fn total_connections(&self) -> usize;

    /// Connections sitting idle in the pool.
    fn idle_connections(&self) -> usize;

    /// Connections currently checked out.
    fn active_connections(&self) -> usize;

    /// Callers waiting for a connection to become available.
    fn pending_requests(&self) -> usize;
}

/// Atomic-counter implementation of [`PoolStats`].
///
/// Pools that track their counts with plain atomics can hand one of these to
/// the tracker and bump the counters from their borrow/return paths. Clones
/// share the same underlying counters.
///
/// # Examples
///
/// ```
/// use pool_telemetry::{PoolStats, SharedPoolStats};
///
/// let stats = SharedPoolStats::new();
/// stats.set_total(10);
/// stats.set_idle(7);
/// stats.set_active(3);
///
/// assert_eq!(stats.total_connections(), 10);
/// assert_eq!(stats.active_connections(), 3);
/// ```
#[derive(Clone, Default)]
pub struct SharedPoolStats {
    inner: Arc<Counts>,
}

#[derive(Default)]
struct Counts {
    total: AtomicUsize,
    idle: AtomicUsize,
    active: AtomicUsize,
    pending: AtomicUsize,
}

impl SharedPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, count: usize) {
        self.inner.total.store(count, Ordering::Relaxed);
    }

    pub fn set_idle(&self, count: usize) {
        self.inner.idle.store(count, Ordering::Relaxed);
    }

    pub fn set_active(&self, count: usize) {
        self.inner.active.store(count, Ordering::Relaxed);
    }

    pub fn set_pending(&self, count: usize) {
        self.inner.pending.store(count, Ordering::Relaxed);
    }

    /// Record a waiter arriving.
    pub fn incr_pending(&self) {
        self.inner.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a waiter being served or giving up.
    pub fn decr_pending(&self) {
        let _ = self
            .inner
            .pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |p| {
                p.checked_sub(1)
            });
    }
}

impl PoolStats for SharedPoolStats {
    fn total_connections(&self) -> usize {
        self.inner.total.load(Ordering::Relaxed)
    }

    fn idle_connections(&self) -> usize {
        self.inner.idle.load(Ordering::Relaxed)
    }

    fn active_connections(&self) -> usize {
        self.inner.active.load(Ordering::Relaxed)
    }

    fn pending_requests(&self) -> usize {
        self.inner.pending.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let stats = SharedPoolStats::new();
        let view = stats.clone();

        stats.set_active(5);
        assert_eq!(view.active_connections(), 5);
    }

    #[test]
    fn test_pending_never_underflows() {
        let stats = SharedPoolStats::new();
        stats.decr_pending();
        assert_eq!(stats.pending_requests(), 0);

        stats.incr_pending();
        stats.incr_pending();
        stats.decr_pending();
        assert_eq!(stats.pending_requests(), 1);
    }
}
