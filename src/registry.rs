//! Name-keyed instrument registry shared across pool instances

use crate::errors::{TelemetryError, TelemetryResult};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use prometheus::{Histogram as PromHistogram, HistogramOpts, IntCounter, Opts};

/// Millisecond buckets for usage/creation latency histograms.
const MILLIS_BUCKETS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
];

/// Translate a dotted registry name into a Prometheus-safe instrument name.
///
/// Registry names use dots as separators (`mypool.pool.Wait`); the underlying
/// Prometheus primitives only accept `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub(crate) fn sanitize_metric_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        let valid =
            c.is_ascii_alphabetic() || c == '_' || c == ':' || (i > 0 && c.is_ascii_digit());
        out.push(if valid { c } else { '_' });
    }
    out
}

/// Latency timer recording durations at nanosecond resolution.
///
/// Samples are stored in seconds. Clones share the same underlying series.
#[derive(Clone)]
pub struct Timer {
    inner: PromHistogram,
}

impl Timer {
    fn create(name: &str) -> TelemetryResult<Self> {
        let opts = HistogramOpts::new(sanitize_metric_name(name), "Latency in seconds");
        let inner = PromHistogram::with_opts(opts)
            .map_err(|_| TelemetryError::InvalidMetricName(name.to_string()))?;
        Ok(Self { inner })
    }

    /// Record one elapsed duration.
    pub fn record(&self, elapsed: Duration) {
        self.inner.observe(elapsed.as_secs_f64());
    }

    /// Number of samples recorded so far.
    pub fn count(&self) -> u64 {
        self.inner.get_sample_count()
    }

    /// Sum of all recorded samples, in seconds.
    pub fn sum_seconds(&self) -> f64 {
        self.inner.get_sample_sum()
    }
}

/// Latency histogram recording durations at millisecond resolution.
///
/// Clones share the same underlying series.
#[derive(Clone)]
pub struct Histogram {
    inner: PromHistogram,
}

impl Histogram {
    fn create(name: &str) -> TelemetryResult<Self> {
        let opts = HistogramOpts::new(sanitize_metric_name(name), "Latency in milliseconds")
            .buckets(MILLIS_BUCKETS.to_vec());
        let inner = PromHistogram::with_opts(opts)
            .map_err(|_| TelemetryError::InvalidMetricName(name.to_string()))?;
        Ok(Self { inner })
    }

    /// Record one elapsed duration.
    pub fn record(&self, elapsed: Duration) {
        self.inner.observe(elapsed.as_secs_f64() * 1_000.0);
    }

    /// Record a value already measured in milliseconds.
    pub fn record_millis(&self, millis: u64) {
        self.inner.observe(millis as f64);
    }

    /// Number of samples recorded so far.
    pub fn count(&self) -> u64 {
        self.inner.get_sample_count()
    }

    /// Sum of all recorded samples, in milliseconds.
    pub fn sum_millis(&self) -> f64 {
        self.inner.get_sample_sum()
    }
}

/// Monotonic event meter. Clones share the same underlying counter.
#[derive(Clone)]
pub struct Meter {
    inner: IntCounter,
}

impl Meter {
    fn create(name: &str) -> TelemetryResult<Self> {
        let opts = Opts::new(sanitize_metric_name(name), "Event occurrences");
        let inner = IntCounter::with_opts(opts)
            .map_err(|_| TelemetryError::InvalidMetricName(name.to_string()))?;
        Ok(Self { inner })
    }

    /// Record one occurrence.
    pub fn mark(&self) {
        self.inner.inc();
    }

    /// Total occurrences recorded so far.
    pub fn count(&self) -> u64 {
        self.inner.get()
    }
}

type GaugeFn = Arc<dyn Fn() -> usize + Send + Sync>;

enum Instrument {
    Timer(Timer),
    Histogram(Histogram),
    Meter(Meter),
    Gauge(GaugeFn),
}

impl Instrument {
    fn kind(&self) -> InstrumentKind {
        match self {
            Instrument::Timer(_) => InstrumentKind::Timer,
            Instrument::Histogram(_) => InstrumentKind::Histogram,
            Instrument::Meter(_) => InstrumentKind::Meter,
            Instrument::Gauge(_) => InstrumentKind::Gauge,
        }
    }
}

/// The kind of instrument registered under a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum InstrumentKind {
    Timer,
    Histogram,
    Meter,
    Gauge,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentKind::Timer => "timer",
            InstrumentKind::Histogram => "histogram",
            InstrumentKind::Meter => "meter",
            InstrumentKind::Gauge => "gauge",
        }
    }
}

/// Outcome of a gauge registration attempt.
///
/// A name collision is an expected condition (a prior tracker for the same
/// pool name that was never closed), not an error: the previously registered
/// instrument is kept and the caller decides whether to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Registration {
    Registered,
    AlreadyExists,
}

/// Point-in-time reading of one registered instrument.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InstrumentSnapshot {
    /// Dotted registry name, e.g. `mypool.pool.Wait`.
    pub name: String,
    pub kind: InstrumentKind,
    /// Sample count for timers/histograms, occurrence count for meters.
    pub count: Option<u64>,
    /// Sample sum (seconds for timers, milliseconds for histograms).
    pub sum: Option<f64>,
    /// Live gauge reading; `None` when the gauge callback failed.
    pub value: Option<usize>,
}

/// Shared, name-keyed table of metric instruments.
///
/// One registry is typically shared process-wide across many pool instances;
/// each pool's tracker only ever touches entries under its own namespaced
/// names. The registry is always passed in explicitly by the host, never held
/// as a hidden global, so tests can supply an isolated instance per case.
///
/// All operations are safe to call concurrently from any thread; instrument
/// updates are lock-free atomics underneath.
///
/// # Examples
///
/// ```
/// use pool_telemetry::MetricsRegistry;
/// use std::time::Duration;
///
/// let registry = MetricsRegistry::new();
/// let timer = registry.timer("mypool.pool.Wait").unwrap();
/// timer.record(Duration::from_micros(250));
///
/// assert_eq!(timer.count(), 1);
/// assert!(registry.contains("mypool.pool.Wait"));
/// ```
#[derive(Default)]
pub struct MetricsRegistry {
    instruments: DashMap<String, Instrument>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or get the timer registered under `name`.
    ///
    /// If the name is taken by an instrument of a different kind, a warning
    /// is logged and a detached timer is returned so the caller's updates
    /// never fail; the existing registration is left untouched.
    pub fn timer(&self, name: &str) -> TelemetryResult<Timer> {
        if name.is_empty() {
            return Err(TelemetryError::InvalidMetricName(name.to_string()));
        }
        match self.instruments.entry(name.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Instrument::Timer(timer) => Ok(timer.clone()),
                other => {
                    warn!(
                        name,
                        existing = other.kind().as_str(),
                        "metric name already registered with a different kind"
                    );
                    Timer::create(name)
                }
            },
            Entry::Vacant(slot) => {
                let timer = Timer::create(name)?;
                slot.insert(Instrument::Timer(timer.clone()));
                Ok(timer)
            }
        }
    }

    /// Create or get the histogram registered under `name`.
    ///
    /// Kind conflicts behave as in [`MetricsRegistry::timer`].
    pub fn histogram(&self, name: &str) -> TelemetryResult<Histogram> {
        if name.is_empty() {
            return Err(TelemetryError::InvalidMetricName(name.to_string()));
        }
        match self.instruments.entry(name.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Instrument::Histogram(histogram) => Ok(histogram.clone()),
                other => {
                    warn!(
                        name,
                        existing = other.kind().as_str(),
                        "metric name already registered with a different kind"
                    );
                    Histogram::create(name)
                }
            },
            Entry::Vacant(slot) => {
                let histogram = Histogram::create(name)?;
                slot.insert(Instrument::Histogram(histogram.clone()));
                Ok(histogram)
            }
        }
    }

    /// Create or get the meter registered under `name`.
    ///
    /// Kind conflicts behave as in [`MetricsRegistry::timer`].
    pub fn meter(&self, name: &str) -> TelemetryResult<Meter> {
        if name.is_empty() {
            return Err(TelemetryError::InvalidMetricName(name.to_string()));
        }
        match self.instruments.entry(name.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Instrument::Meter(meter) => Ok(meter.clone()),
                other => {
                    warn!(
                        name,
                        existing = other.kind().as_str(),
                        "metric name already registered with a different kind"
                    );
                    Meter::create(name)
                }
            },
            Entry::Vacant(slot) => {
                let meter = Meter::create(name)?;
                slot.insert(Instrument::Meter(meter.clone()));
                Ok(meter)
            }
        }
    }

    /// Register a gauge whose value is produced by `read` at every sample.
    ///
    /// The callback must be side-effect-free and non-blocking; it runs on
    /// whatever thread samples the gauge. If the name is already taken the
    /// existing registration is kept and `AlreadyExists` is returned.
    pub fn register_gauge<F>(&self, name: &str, read: F) -> Registration
    where
        F: Fn() -> usize + Send + Sync + 'static,
    {
        match self.instruments.entry(name.to_string()) {
            Entry::Occupied(_) => Registration::AlreadyExists,
            Entry::Vacant(slot) => {
                slot.insert(Instrument::Gauge(Arc::new(read)));
                Registration::Registered
            }
        }
    }

    /// Sample the gauge registered under `name`.
    ///
    /// Returns `None` when no gauge is registered under the name or when the
    /// callback panics; a panic is contained and logged rather than allowed
    /// to take down the sampling thread.
    pub fn read_gauge(&self, name: &str) -> Option<usize> {
        let read = {
            let entry = self.instruments.get(name)?;
            match entry.value() {
                Instrument::Gauge(read) => Arc::clone(read),
                _ => return None,
            }
        };
        // The callback runs outside the map ref so a slow or panicking
        // gauge never holds a shard lock.
        match catch_unwind(AssertUnwindSafe(|| read())) {
            Ok(value) => Some(value),
            Err(_) => {
                error!(name, "gauge callback panicked; sample omitted");
                None
            }
        }
    }

    /// Remove the instrument registered under `name`.
    ///
    /// Returns `true` if an entry was removed. Removing an absent name is a
    /// no-op.
    pub fn remove(&self, name: &str) -> bool {
        self.instruments.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instruments.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Take a point-in-time reading of every registered instrument.
    ///
    /// Gauges are sampled live after the instrument table is walked, so no
    /// map locks are held while callbacks run. Snapshot order follows the
    /// registry name.
    pub fn snapshot(&self) -> Vec<InstrumentSnapshot> {
        let mut snapshots = Vec::with_capacity(self.instruments.len());
        let mut gauges = Vec::new();
        for entry in self.instruments.iter() {
            let name = entry.key().clone();
            let kind = entry.value().kind();
            let (count, sum) = match entry.value() {
                Instrument::Timer(t) => (Some(t.count()), Some(t.sum_seconds())),
                Instrument::Histogram(h) => (Some(h.count()), Some(h.sum_millis())),
                Instrument::Meter(m) => (Some(m.count()), None),
                Instrument::Gauge(_) => {
                    gauges.push(name);
                    continue;
                }
            };
            snapshots.push(InstrumentSnapshot {
                name,
                kind,
                count,
                sum,
                value: None,
            });
        }
        for name in gauges {
            let value = self.read_gauge(&name);
            snapshots.push(InstrumentSnapshot {
                name,
                kind: InstrumentKind::Gauge,
                count: None,
                sum: None,
                value,
            });
        }
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_or_get_shares_series() {
        let registry = MetricsRegistry::new();
        let first = registry.timer("p.pool.Wait").unwrap();
        let second = registry.timer("p.pool.Wait").unwrap();

        first.record(Duration::from_millis(3));
        assert_eq!(second.count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_kind_conflict_returns_detached_instrument() {
        let registry = MetricsRegistry::new();
        let meter = registry.meter("p.pool.Wait").unwrap();

        let timer = registry.timer("p.pool.Wait").unwrap();
        timer.record(Duration::from_millis(1));

        // Existing registration untouched; detached timer absorbed the update.
        assert_eq!(meter.count(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_gauge_registration_is_register_or_reuse() {
        let registry = MetricsRegistry::new();
        assert_eq!(
            registry.register_gauge("p.pool.Idle", || 4),
            Registration::Registered
        );
        assert_eq!(
            registry.register_gauge("p.pool.Idle", || 99),
            Registration::AlreadyExists
        );

        // First registration kept.
        assert_eq!(registry.read_gauge("p.pool.Idle"), Some(4));
    }

    #[test]
    fn test_panicking_gauge_is_contained() {
        let registry = MetricsRegistry::new();
        let _ = registry.register_gauge("p.pool.Bad", || panic!("stats gone"));

        assert_eq!(registry.read_gauge("p.pool.Bad"), None);
        // Registry still usable afterwards.
        assert!(registry.contains("p.pool.Bad"));
    }

    #[test]
    fn test_read_gauge_on_non_gauge_name() {
        let registry = MetricsRegistry::new();
        let _ = registry.meter("p.pool.Timeouts").unwrap();
        assert_eq!(registry.read_gauge("p.pool.Timeouts"), None);
        assert_eq!(registry.read_gauge("p.pool.Missing"), None);
    }

    #[test]
    fn test_remove_touches_only_named_entry() {
        let registry = MetricsRegistry::new();
        let _ = registry.meter("a.pool.Timeouts").unwrap();
        let _ = registry.meter("b.pool.Timeouts").unwrap();

        assert!(registry.remove("a.pool.Timeouts"));
        assert!(!registry.remove("a.pool.Timeouts"));
        assert!(registry.contains("b.pool.Timeouts"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = MetricsRegistry::new();
        assert!(matches!(
            registry.timer(""),
            Err(TelemetryError::InvalidMetricName(_))
        ));
    }

    #[test]
    fn test_sanitize_metric_name() {
        assert_eq!(sanitize_metric_name("db.pool.Wait"), "db_pool_Wait");
        assert_eq!(sanitize_metric_name("9lives.pool.Usage"), "_lives_pool_Usage");
    }

    #[test]
    fn test_snapshot_reads_live_values() {
        let registry = MetricsRegistry::new();
        let meter = registry.meter("p.pool.Timeouts").unwrap();
        let _ = registry.register_gauge("p.pool.Active", || 7);
        meter.mark();
        meter.mark();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);

        let active = snapshot.iter().find(|s| s.name == "p.pool.Active").unwrap();
        assert_eq!(active.kind, InstrumentKind::Gauge);
        assert_eq!(active.value, Some(7));

        let timeouts = snapshot.iter().find(|s| s.name == "p.pool.Timeouts").unwrap();
        assert_eq!(timeouts.count, Some(2));
    }

    #[test]
    fn test_concurrent_updates() {
        let registry = Arc::new(MetricsRegistry::new());
        let meter = registry.meter("p.pool.Timeouts").unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let meter = meter.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    meter.mark();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(meter.count(), 8000);
    }
}
