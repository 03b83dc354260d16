//! Metric types

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::LoadTestError;

/// How a metric aggregates its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic count, exposes `count` and `rate` (per second).
    Counter,
    /// Last observed value, exposes `value`, `min` and `max`.
    Gauge,
    /// Share of true samples, exposes `rate`.
    Rate,
    /// Distribution, exposes `avg`, `min`, `med`, `max` and `p(N)`.
    Trend,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Rate => "rate",
            MetricKind::Trend => "trend",
        };
        f.write_str(name)
    }
}

/// Metrics recorded by the executor. Thresholds may only reference these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuiltinMetric {
    HttpReqs,
    HttpReqDuration,
    HttpReqFailed,
    Checks,
    Iterations,
    IterationDuration,
    Vus,
    VusMax,
}

impl BuiltinMetric {
    pub const ALL: [BuiltinMetric; 8] = [
        BuiltinMetric::Checks,
        BuiltinMetric::HttpReqDuration,
        BuiltinMetric::HttpReqFailed,
        BuiltinMetric::HttpReqs,
        BuiltinMetric::IterationDuration,
        BuiltinMetric::Iterations,
        BuiltinMetric::Vus,
        BuiltinMetric::VusMax,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinMetric::HttpReqs => "http_reqs",
            BuiltinMetric::HttpReqDuration => "http_req_duration",
            BuiltinMetric::HttpReqFailed => "http_req_failed",
            BuiltinMetric::Checks => "checks",
            BuiltinMetric::Iterations => "iterations",
            BuiltinMetric::IterationDuration => "iteration_duration",
            BuiltinMetric::Vus => "vus",
            BuiltinMetric::VusMax => "vus_max",
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            BuiltinMetric::HttpReqs | BuiltinMetric::Iterations => MetricKind::Counter,
            BuiltinMetric::HttpReqDuration | BuiltinMetric::IterationDuration => {
                MetricKind::Trend
            }
            BuiltinMetric::HttpReqFailed | BuiltinMetric::Checks => MetricKind::Rate,
            BuiltinMetric::Vus | BuiltinMetric::VusMax => MetricKind::Gauge,
        }
    }
}

impl fmt::Display for BuiltinMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinMetric {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinMetric::ALL
            .into_iter()
            .find(|metric| metric.name() == s.trim())
            .ok_or_else(|| LoadTestError::UnknownMetric(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RateCounts {
    pub passes: u64,
    pub fails: u64,
}

impl RateCounts {
    pub fn record(&mut self, passed: bool) {
        if passed {
            self.passes += 1;
        } else {
            self.fails += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Share of passing samples; 0 when nothing was recorded.
    pub fn rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.passes as f64 / total as f64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpMetrics {
    /// Requests that produced a response.
    pub requests: u64,
    /// `passes` are failed requests, matching how the rate is reported.
    pub failed: RateCounts,
    pub transport_errors: u64,
}

#[derive(Debug, Clone, Default)]
pub struct CheckMetrics {
    pub total: RateCounts,
    pub by_name: BTreeMap<String, RateCounts>,
}

#[derive(Debug, Clone, Default)]
pub struct IterationMetrics {
    pub completed: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GaugeValue {
    pub value: u64,
    pub min: u64,
    pub max: u64,
    observed: bool,
}

impl GaugeValue {
    pub fn set(&mut self, value: u64) {
        if self.observed {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        } else {
            self.min = value;
            self.max = value;
            self.observed = true;
        }
        self.value = value;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub http: HttpMetrics,
    pub checks: CheckMetrics,
    pub iterations: IterationMetrics,
    pub vus: GaugeValue,
    pub vus_max: GaugeValue,
}
