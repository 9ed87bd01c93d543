//! Telemetry tracker forwarding pool lifecycle events into a registry

use crate::errors::{TelemetryError, TelemetryResult};
use crate::registry::{Histogram, Meter, MetricsRegistry, Registration, Timer};
use crate::stats::PoolStats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const METRIC_CATEGORY: &str = "pool";
const METRIC_NAME_WAIT: &str = "Wait";
const METRIC_NAME_USAGE: &str = "Usage";
const METRIC_NAME_CONNECT: &str = "ConnectionCreation";
const METRIC_NAME_TIMEOUT_RATE: &str = "ConnectionTimeoutRate";
const METRIC_NAME_TOTAL_CONNECTIONS: &str = "TotalConnections";
const METRIC_NAME_IDLE_CONNECTIONS: &str = "IdleConnections";
const METRIC_NAME_ACTIVE_CONNECTIONS: &str = "ActiveConnections";
const METRIC_NAME_PENDING_CONNECTIONS: &str = "PendingConnections";

const ALL_METRIC_NAMES: [&str; 8] = [
    METRIC_NAME_WAIT,
    METRIC_NAME_USAGE,
    METRIC_NAME_CONNECT,
    METRIC_NAME_TIMEOUT_RATE,
    METRIC_NAME_TOTAL_CONNECTIONS,
    METRIC_NAME_IDLE_CONNECTIONS,
    METRIC_NAME_ACTIVE_CONNECTIONS,
    METRIC_NAME_PENDING_CONNECTIONS,
];

fn metric_name(pool_name: &str, metric: &str) -> String {
    format!("{pool_name}.{METRIC_CATEGORY}.{metric}")
}

fn register_gauge<F>(registry: &MetricsRegistry, name: String, read: F)
where
    F: Fn() -> usize + Send + Sync + 'static,
{
    if registry.register_gauge(&name, read) == Registration::AlreadyExists {
        warn!(metric = %name, "metric already registered; keeping the existing instrument");
    }
}

/// Bridges one pool instance's lifecycle events to a shared [`MetricsRegistry`].
///
/// Construction registers eight instruments under deterministic names of the
/// form `<pool_name>.pool.<Metric>`: an acquisition-latency timer, usage and
/// creation histograms, a timeout meter, and four gauges (total, idle,
/// active, pending) that read live counts from the supplied [`PoolStats`] at
/// every sample. The tracker never caches gauge values.
///
/// The registry is shared and externally owned; the tracker only ever touches
/// its own eight names. Call [`close`](PoolMetricsTracker::close) from the
/// pool's shutdown path so a later pool under the same name can re-register
/// cleanly — teardown is deliberately explicit, as dropping a stale tracker
/// must not yank instruments out from under a replacement.
///
/// # Examples
///
/// ```
/// use pool_telemetry::{MetricsRegistry, PoolMetricsTracker, SharedPoolStats};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let registry = Arc::new(MetricsRegistry::new());
/// let stats = SharedPoolStats::new();
///
/// let tracker =
///     PoolMetricsTracker::new("mypool", Arc::new(stats.clone()), Arc::clone(&registry)).unwrap();
///
/// stats.set_active(3);
/// tracker.record_acquisition(Duration::from_micros(120));
///
/// assert_eq!(registry.read_gauge("mypool.pool.ActiveConnections"), Some(3));
/// assert_eq!(tracker.acquisition_timer().count(), 1);
///
/// tracker.close();
/// assert!(registry.is_empty());
/// ```
pub struct PoolMetricsTracker {
    pool_name: String,
    registry: Arc<MetricsRegistry>,
    acquisition_timer: Timer,
    usage_histogram: Histogram,
    creation_histogram: Histogram,
    timeout_meter: Meter,
    closed: AtomicBool,
}

impl PoolMetricsTracker {
    /// Create a tracker for `pool_name` and register its eight instruments.
    ///
    /// Fails only on an empty pool name. A name collision with a prior
    /// tracker that was never closed is logged and tolerated: the existing
    /// instruments are kept and this tracker proceeds.
    pub fn new(
        pool_name: &str,
        pool_stats: Arc<dyn PoolStats>,
        registry: Arc<MetricsRegistry>,
    ) -> TelemetryResult<Self> {
        if pool_name.is_empty() {
            return Err(TelemetryError::EmptyPoolName);
        }

        let acquisition_timer = registry.timer(&metric_name(pool_name, METRIC_NAME_WAIT))?;
        let usage_histogram = registry.histogram(&metric_name(pool_name, METRIC_NAME_USAGE))?;
        let creation_histogram =
            registry.histogram(&metric_name(pool_name, METRIC_NAME_CONNECT))?;
        let timeout_meter = registry.meter(&metric_name(pool_name, METRIC_NAME_TIMEOUT_RATE))?;

        let stats = Arc::clone(&pool_stats);
        register_gauge(
            &registry,
            metric_name(pool_name, METRIC_NAME_TOTAL_CONNECTIONS),
            move || stats.total_connections(),
        );

        let stats = Arc::clone(&pool_stats);
        register_gauge(
            &registry,
            metric_name(pool_name, METRIC_NAME_IDLE_CONNECTIONS),
            move || stats.idle_connections(),
        );

        let stats = Arc::clone(&pool_stats);
        register_gauge(
            &registry,
            metric_name(pool_name, METRIC_NAME_ACTIVE_CONNECTIONS),
            move || stats.active_connections(),
        );

        let stats = Arc::clone(&pool_stats);
        register_gauge(
            &registry,
            metric_name(pool_name, METRIC_NAME_PENDING_CONNECTIONS),
            move || stats.pending_requests(),
        );

        Ok(Self {
            pool_name: pool_name.to_string(),
            registry,
            acquisition_timer,
            usage_histogram,
            creation_histogram,
            timeout_meter,
            closed: AtomicBool::new(false),
        })
    }

    /// Record how long a caller waited to acquire a connection.
    ///
    /// Nanosecond resolution is preserved.
    pub fn record_acquisition(&self, elapsed: Duration) {
        self.acquisition_timer.record(elapsed);
    }

    /// Record how long a connection was checked out, at millisecond
    /// resolution.
    pub fn record_usage(&self, elapsed: Duration) {
        self.usage_histogram.record(elapsed);
    }

    /// Record how long establishing a new connection took, at millisecond
    /// resolution.
    pub fn record_creation(&self, elapsed: Duration) {
        self.creation_histogram.record(elapsed);
    }

    /// Record one acquisition timeout.
    pub fn record_timeout(&self) {
        self.timeout_meter.mark();
    }

    /// The pool name this tracker namespaces its metrics under.
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    /// Direct handle to the acquisition-latency timer.
    pub fn acquisition_timer(&self) -> &Timer {
        &self.acquisition_timer
    }

    /// Direct handle to the usage-duration histogram.
    pub fn usage_histogram(&self) -> &Histogram {
        &self.usage_histogram
    }

    /// Direct handle to the creation-latency histogram.
    pub fn creation_histogram(&self) -> &Histogram {
        &self.creation_histogram
    }

    /// Remove this tracker's eight instruments from the registry.
    ///
    /// Idempotent: the first call deregisters, later calls are no-ops.
    /// Names that were never registered are skipped without error. Other
    /// trackers' entries are never touched.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for metric in ALL_METRIC_NAMES {
            let _ = self.registry.remove(&metric_name(&self.pool_name, metric));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
