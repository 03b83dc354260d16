//! Metrics collector - thread-safe collection with latency tracking

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::Instant;

use super::types::{BuiltinMetric, MetricKind, RunMetrics};
use crate::threshold::Aggregation;

/// Shared sink for every VU of a run. Cloning is cheap and all clones
/// record into the same counters and histograms.
#[derive(Clone)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<RunMetrics>>,
    request_durations: Arc<RwLock<Histogram<u64>>>,
    iteration_durations: Arc<RwLock<Histogram<u64>>>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        // Durations are recorded in microseconds with 3 significant digits
        let request_hist = Histogram::new(3).expect("Failed to create request histogram");
        let iteration_hist = Histogram::new(3).expect("Failed to create iteration histogram");

        Self {
            metrics: Arc::new(RwLock::new(RunMetrics::default())),
            request_durations: Arc::new(RwLock::new(request_hist)),
            iteration_durations: Arc::new(RwLock::new(iteration_hist)),
            start_time: Instant::now(),
        }
    }

    /// A response arrived. Statuses outside 200-399 count as failed requests.
    pub fn request_completed(&self, status: u16, duration: Duration) {
        let mut metrics = self.metrics.write();
        metrics.http.requests += 1;
        metrics.http.failed.record(!(200..400).contains(&status));
        drop(metrics);

        let _ = self
            .request_durations
            .write()
            .record(duration.as_micros() as u64);
    }

    /// The request never produced a response (connect error, timeout, ...).
    pub fn request_errored(&self) {
        let mut metrics = self.metrics.write();
        metrics.http.transport_errors += 1;
        metrics.http.failed.record(true);
    }

    pub fn check(&self, name: &str, passed: bool) {
        let mut metrics = self.metrics.write();
        metrics.checks.total.record(passed);
        metrics
            .checks
            .by_name
            .entry(name.to_string())
            .or_default()
            .record(passed);
    }

    pub fn iteration_completed(&self, duration: Duration) {
        self.metrics.write().iterations.completed += 1;

        let _ = self
            .iteration_durations
            .write()
            .record(duration.as_micros() as u64);
    }

    pub fn set_vus(&self, active: usize, max: usize) {
        let mut metrics = self.metrics.write();
        metrics.vus.set(active as u64);
        metrics.vus_max.set(max as u64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            elapsed: self.elapsed(),
            metrics: self.metrics.read().clone(),
            request_durations: self.request_durations.read().clone(),
            iteration_durations: self.iteration_durations.read().clone(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of everything collected so far.
#[derive(Clone)]
pub struct MetricsSnapshot {
    pub elapsed: Duration,
    pub metrics: RunMetrics,
    request_durations: Histogram<u64>,
    iteration_durations: Histogram<u64>,
}

impl fmt::Debug for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsSnapshot")
            .field("elapsed", &self.elapsed)
            .field("metrics", &self.metrics)
            .field("request_durations", &self.request_durations.len())
            .field("iteration_durations", &self.iteration_durations.len())
            .finish()
    }
}

impl MetricsSnapshot {
    fn histogram(&self, metric: BuiltinMetric) -> Option<&Histogram<u64>> {
        match metric {
            BuiltinMetric::HttpReqDuration => Some(&self.request_durations),
            BuiltinMetric::IterationDuration => Some(&self.iteration_durations),
            _ => None,
        }
    }

    pub fn trend_stats(&self, metric: BuiltinMetric) -> Option<TrendStats> {
        self.histogram(metric).map(TrendStats::from_histogram)
    }

    /// Evaluate one aggregation of a metric. Returns `None` when the
    /// aggregation does not apply to the metric's kind.
    pub fn aggregate(&self, metric: BuiltinMetric, aggregation: &Aggregation) -> Option<f64> {
        let m = &self.metrics;
        match metric.kind() {
            MetricKind::Counter => {
                let count = match metric {
                    BuiltinMetric::HttpReqs => m.http.requests,
                    BuiltinMetric::Iterations => m.iterations.completed,
                    _ => return None,
                };
                match aggregation {
                    Aggregation::Count => Some(count as f64),
                    Aggregation::Rate => Some(per_second(count, self.elapsed)),
                    _ => None,
                }
            }
            MetricKind::Rate => {
                let counts = match metric {
                    BuiltinMetric::HttpReqFailed => m.http.failed,
                    BuiltinMetric::Checks => m.checks.total,
                    _ => return None,
                };
                match aggregation {
                    Aggregation::Rate => Some(counts.rate()),
                    _ => None,
                }
            }
            MetricKind::Gauge => {
                let gauge = match metric {
                    BuiltinMetric::Vus => m.vus,
                    BuiltinMetric::VusMax => m.vus_max,
                    _ => return None,
                };
                match aggregation {
                    Aggregation::Value => Some(gauge.value as f64),
                    Aggregation::Min => Some(gauge.min as f64),
                    Aggregation::Max => Some(gauge.max as f64),
                    _ => None,
                }
            }
            MetricKind::Trend => {
                let hist = self.histogram(metric)?;
                if hist.is_empty() {
                    return match aggregation {
                        Aggregation::Avg
                        | Aggregation::Min
                        | Aggregation::Med
                        | Aggregation::Max
                        | Aggregation::Percentile(_) => Some(0.0),
                        _ => None,
                    };
                }
                match aggregation {
                    Aggregation::Avg => Some(hist.mean() / 1000.0),
                    Aggregation::Min => Some(micros_to_ms(hist.min())),
                    Aggregation::Med => Some(micros_to_ms(hist.value_at_quantile(0.5))),
                    Aggregation::Max => Some(micros_to_ms(hist.max())),
                    Aggregation::Percentile(p) => {
                        Some(micros_to_ms(hist.value_at_quantile(p / 100.0)))
                    }
                    _ => None,
                }
            }
        }
    }
}

fn micros_to_ms(micros: u64) -> f64 {
    micros as f64 / 1000.0
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Summary of a trend metric in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrendStats {
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    #[serde(rename = "p(90)")]
    pub p90: f64,
    #[serde(rename = "p(95)")]
    pub p95: f64,
    pub count: u64,
}

impl TrendStats {
    fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.is_empty() {
            return Self::default();
        }
        Self {
            avg: hist.mean() / 1000.0,
            min: micros_to_ms(hist.min()),
            med: micros_to_ms(hist.value_at_quantile(0.50)),
            max: micros_to_ms(hist.max()),
            p90: micros_to_ms(hist.value_at_quantile(0.90)),
            p95: micros_to_ms(hist.value_at_quantile(0.95)),
            count: hist.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_requests_follow_status_class() {
        let collector = MetricsCollector::new();
        collector.request_completed(200, Duration::from_millis(5));
        collector.request_completed(302, Duration::from_millis(5));
        collector.request_completed(404, Duration::from_millis(5));
        collector.request_completed(500, Duration::from_millis(5));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.metrics.http.requests, 4);
        let failed = snapshot
            .aggregate(BuiltinMetric::HttpReqFailed, &Aggregation::Rate)
            .unwrap();
        assert!((failed - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_transport_error_counts_as_failed_without_duration() {
        let collector = MetricsCollector::new();
        collector.request_errored();

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.metrics.http.requests, 0);
        assert_eq!(snapshot.metrics.http.transport_errors, 1);
        assert_eq!(
            snapshot.aggregate(BuiltinMetric::HttpReqFailed, &Aggregation::Rate),
            Some(1.0)
        );
        let stats = snapshot.trend_stats(BuiltinMetric::HttpReqDuration).unwrap();
        assert_eq!(stats.count, 0);
    }

    #[test]
    fn test_checks_are_tracked_per_name() {
        let collector = MetricsCollector::new();
        collector.check("status was 200", true);
        collector.check("status was 200", false);
        collector.check("body not empty", true);

        let snapshot = collector.snapshot();
        let checks = &snapshot.metrics.checks;
        assert_eq!(checks.total.passes, 2);
        assert_eq!(checks.total.fails, 1);
        assert_eq!(checks.by_name["status was 200"].fails, 1);
        assert_eq!(checks.by_name["body not empty"].passes, 1);
    }

    #[test]
    fn test_trend_aggregations_are_in_milliseconds() {
        let collector = MetricsCollector::new();
        for ms in 1..=100 {
            collector.request_completed(200, Duration::from_millis(ms));
        }

        let snapshot = collector.snapshot();
        let p95 = snapshot
            .aggregate(BuiltinMetric::HttpReqDuration, &Aggregation::Percentile(95.0))
            .unwrap();
        assert!((94.0..=96.0).contains(&p95), "p95 was {p95}");

        let max = snapshot
            .aggregate(BuiltinMetric::HttpReqDuration, &Aggregation::Max)
            .unwrap();
        assert!((99.0..=101.0).contains(&max), "max was {max}");
    }

    #[test]
    fn test_empty_trend_aggregates_to_zero() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(
            snapshot.aggregate(BuiltinMetric::HttpReqDuration, &Aggregation::Percentile(95.0)),
            Some(0.0)
        );
    }

    #[test]
    fn test_aggregation_must_match_kind() {
        let snapshot = MetricsCollector::new().snapshot();
        assert_eq!(
            snapshot.aggregate(BuiltinMetric::HttpReqFailed, &Aggregation::Percentile(95.0)),
            None
        );
        assert_eq!(
            snapshot.aggregate(BuiltinMetric::HttpReqDuration, &Aggregation::Rate),
            None
        );
    }

    #[test]
    fn test_vus_gauge() {
        let collector = MetricsCollector::new();
        collector.set_vus(3, 3);
        collector.set_vus(10, 10);
        collector.set_vus(4, 10);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.aggregate(BuiltinMetric::Vus, &Aggregation::Value), Some(4.0));
        assert_eq!(snapshot.aggregate(BuiltinMetric::Vus, &Aggregation::Max), Some(10.0));
        assert_eq!(snapshot.aggregate(BuiltinMetric::VusMax, &Aggregation::Value), Some(10.0));
    }
}
