use criterion::{criterion_group, criterion_main, Criterion};
use pool_telemetry::{MetricsRegistry, PoolMetricsTracker, SharedPoolStats};
use std::sync::Arc;
use std::time::Duration;

fn bench_record(c: &mut Criterion) {
    let registry = Arc::new(MetricsRegistry::new());
    let stats = SharedPoolStats::new();
    let tracker =
        PoolMetricsTracker::new("bench", Arc::new(stats), Arc::clone(&registry)).unwrap();

    c.bench_function("record_acquisition", |b| {
        b.iter(|| tracker.record_acquisition(Duration::from_micros(100)))
    });

    c.bench_function("record_timeout", |b| b.iter(|| tracker.record_timeout()));

    c.bench_function("read_gauge", |b| {
        b.iter(|| registry.read_gauge("bench.pool.ActiveConnections"))
    });
}

criterion_group!(benches, bench_record);
criterion_main!(benches);
