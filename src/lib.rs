//! # pool-telemetry
//!
//! Thread-safe telemetry adapter that bridges a connection pool's lifecycle
//! events to a shared, name-keyed metrics registry.
//!
//! ## Features
//!
//! - Deterministic per-pool metric naming (`<pool>.pool.<Metric>`)
//! - Acquisition-latency timer, usage/creation histograms, timeout meter
//! - Live gauges sampling pool state at read time, never cached
//! - Register-or-reuse semantics so pool restarts never crash on collisions
//! - Clean, idempotent teardown that frees a pool's names on shutdown
//! - Panic-contained gauge sampling
//! - Prometheus exposition export
//!
//! ## Quick Start
//!
//! ```rust
//! use pool_telemetry::{MetricsRegistry, PoolMetricsTracker, SharedPoolStats};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let registry = Arc::new(MetricsRegistry::new());
//! let stats = SharedPoolStats::new();
//!
//! let tracker =
//!     PoolMetricsTracker::new("mypool", Arc::new(stats.clone()), Arc::clone(&registry)).unwrap();
//!
//! // From the pool's borrow path:
//! tracker.record_acquisition(Duration::from_micros(85));
//!
//! // At pool shutdown:
//! tracker.close();
//! ```

mod errors;
mod export;
mod registry;
mod stats;
mod tracker;

pub use errors::{TelemetryError, TelemetryResult};
pub use export::MetricsExporter;
pub use registry::{
    Histogram, InstrumentKind, InstrumentSnapshot, Meter, MetricsRegistry, Registration, Timer,
};
pub use stats::{PoolStats, SharedPoolStats};
pub use tracker::PoolMetricsTracker;
