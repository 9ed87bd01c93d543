// pool-telemetry
// Bridges pool lifecycle events to a shared metrics registry

// This is just a binary wrapper - the actual library is in lib.rs
// Run the demo with: cargo run --example basic

use pool_telemetry::{MetricsExporter, MetricsRegistry, PoolMetricsTracker, SharedPoolStats};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("=== pool-telemetry ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    // Quick demo
    println!("Quick Demo:");
    let registry = Arc::new(MetricsRegistry::new());
    let stats = SharedPoolStats::new();
    stats.set_total(5);
    stats.set_idle(4);
    stats.set_active(1);

    let tracker = PoolMetricsTracker::new("demo", Arc::new(stats), Arc::clone(&registry))
        .expect("pool name is non-empty");
    tracker.record_acquisition(Duration::from_micros(120));
    tracker.record_usage(Duration::from_millis(35));

    println!("{}", MetricsExporter::export_prometheus(&registry, None));
    tracker.close();
}
