//! Basic usage: wire a tracker to a pool's stats and event hooks.

use pool_telemetry::{MetricsExporter, MetricsRegistry, PoolMetricsTracker, SharedPoolStats};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    // One registry shared by every pool in the process.
    let registry = Arc::new(MetricsRegistry::new());

    // The pool keeps its live counts here and bumps them on borrow/return.
    let stats = SharedPoolStats::new();
    stats.set_total(10);
    stats.set_idle(10);

    let tracker = PoolMetricsTracker::new("orders-db", Arc::new(stats.clone()), Arc::clone(&registry))
        .expect("pool name is non-empty");

    // Simulate a borrow: one waiter, then a connection handed out.
    stats.incr_pending();
    tracker.record_acquisition(Duration::from_micros(340));
    stats.decr_pending();
    stats.set_idle(9);
    stats.set_active(1);

    // The connection comes back after 42ms of use.
    tracker.record_usage(Duration::from_millis(42));
    stats.set_idle(10);
    stats.set_active(0);

    // One caller gave up waiting.
    tracker.record_timeout();

    let mut tags = HashMap::new();
    tags.insert("service".to_string(), "orders".to_string());
    println!("{}", MetricsExporter::export_prometheus(&registry, Some(&tags)));

    // Pool shutdown frees the names for a future pool called "orders-db".
    tracker.close();
    assert!(registry.is_empty());
}
