//! Prometheus exposition rendering for a metrics registry

use crate::registry::{sanitize_metric_name, InstrumentKind, MetricsRegistry};

use std::collections::HashMap;
use std::fmt::Write as _;

/// Renders registry contents in Prometheus exposition format.
pub struct MetricsExporter;

impl MetricsExporter {
    /// Render every live instrument in Prometheus exposition format.
    ///
    /// Dotted registry names are translated to underscore form. Timers and
    /// histograms are rendered as `_sum`/`_count` summaries, meters as
    /// counters, gauges as live-sampled gauge lines; a gauge whose callback
    /// failed is omitted from the output rather than rendered with a bogus
    /// value. Optional `tags` become labels on every sample line.
    ///
    /// # Examples
    ///
    /// ```
    /// use pool_telemetry::{MetricsExporter, MetricsRegistry};
    ///
    /// let registry = MetricsRegistry::new();
    /// registry.meter("db.pool.ConnectionTimeoutRate").unwrap().mark();
    ///
    /// let output = MetricsExporter::export_prometheus(&registry, None);
    /// assert!(output.contains("db_pool_ConnectionTimeoutRate 1"));
    /// ```
    pub fn export_prometheus(
        registry: &MetricsRegistry,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let labels = Self::format_labels(tags);
        let mut output = String::new();

        for sample in registry.snapshot() {
            let name = sanitize_metric_name(&sample.name);
            match sample.kind {
                InstrumentKind::Timer => {
                    let _ = writeln!(output, "# HELP {name} Latency in seconds");
                    let _ = writeln!(output, "# TYPE {name} summary");
                    let _ = writeln!(output, "{name}_sum{labels} {}", sample.sum.unwrap_or(0.0));
                    let _ = writeln!(output, "{name}_count{labels} {}", sample.count.unwrap_or(0));
                }
                InstrumentKind::Histogram => {
                    let _ = writeln!(output, "# HELP {name} Latency in milliseconds");
                    let _ = writeln!(output, "# TYPE {name} summary");
                    let _ = writeln!(output, "{name}_sum{labels} {}", sample.sum.unwrap_or(0.0));
                    let _ = writeln!(output, "{name}_count{labels} {}", sample.count.unwrap_or(0));
                }
                InstrumentKind::Meter => {
                    let _ = writeln!(output, "# HELP {name} Event occurrences");
                    let _ = writeln!(output, "# TYPE {name} counter");
                    let _ = writeln!(output, "{name}{labels} {}", sample.count.unwrap_or(0));
                }
                InstrumentKind::Gauge => {
                    let Some(value) = sample.value else { continue };
                    let _ = writeln!(output, "# HELP {name} Live pool state");
                    let _ = writeln!(output, "# TYPE {name} gauge");
                    let _ = writeln!(output, "{name}{labels} {value}");
                }
            }
        }

        output
    }

    fn format_labels(tags: Option<&HashMap<String, String>>) -> String {
        let Some(tags) = tags.filter(|t| !t.is_empty()) else {
            return String::new();
        };
        let mut pairs: Vec<String> = tags
            .iter()
            .map(|(key, value)| format!("{key}=\"{value}\""))
            .collect();
        pairs.sort();
        format!("{{{}}}", pairs.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_export_renders_all_kinds() {
        let registry = MetricsRegistry::new();
        registry
            .timer("db.pool.Wait")
            .unwrap()
            .record(Duration::from_millis(2));
        registry
            .meter("db.pool.ConnectionTimeoutRate")
            .unwrap()
            .mark();
        let _ = registry.register_gauge("db.pool.ActiveConnections", || 4);

        let output = MetricsExporter::export_prometheus(&registry, None);

        assert!(output.contains("# TYPE db_pool_Wait summary"));
        assert!(output.contains("db_pool_Wait_count 1"));
        assert!(output.contains("# TYPE db_pool_ConnectionTimeoutRate counter"));
        assert!(output.contains("db_pool_ConnectionTimeoutRate 1"));
        assert!(output.contains("db_pool_ActiveConnections 4"));
    }

    #[test]
    fn test_export_applies_tags_as_labels() {
        let registry = MetricsRegistry::new();
        registry.meter("db.pool.ConnectionTimeoutRate").unwrap().mark();

        let mut tags = HashMap::new();
        tags.insert("service".to_string(), "api".to_string());

        let output = MetricsExporter::export_prometheus(&registry, Some(&tags));
        assert!(output.contains("db_pool_ConnectionTimeoutRate{service=\"api\"} 1"));
    }

    #[test]
    fn test_failed_gauge_sample_is_omitted() {
        let registry = MetricsRegistry::new();
        let _ = registry.register_gauge("db.pool.ActiveConnections", || panic!("stats gone"));
        let _ = registry.register_gauge("db.pool.IdleConnections", || 2);

        let output = MetricsExporter::export_prometheus(&registry, None);
        assert!(!output.contains("ActiveConnections"));
        assert!(output.contains("db_pool_IdleConnections 2"));
    }
}
