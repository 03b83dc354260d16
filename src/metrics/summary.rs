//! Machine-readable end-of-run summary (`--summary-export`).

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::types::{BuiltinMetric, MetricKind, RateCounts};
use super::TrendStats;
use crate::error::LoadTestError;
use crate::report::{Interruption, RunReport};
use crate::threshold::{Aggregation, ThresholdResult};

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MetricSummary {
    Counter { count: f64, rate: f64 },
    Gauge { value: f64, min: f64, max: f64 },
    Rate { rate: f64, passes: u64, fails: u64 },
    Trend(TrendStats),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub scenario: String,
    pub generated_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub metrics: BTreeMap<&'static str, MetricSummary>,
    pub checks: BTreeMap<String, RateCounts>,
    pub thresholds: Vec<ThresholdResult>,
    pub thresholds_passed: bool,
    pub interruption: Option<Interruption>,
    pub exit_code: u8,
}

impl RunSummary {
    pub fn from_report(report: &RunReport) -> Self {
        let snapshot = &report.snapshot;
        let value = |metric: BuiltinMetric, aggregation: Aggregation| {
            snapshot.aggregate(metric, &aggregation).unwrap_or_default()
        };

        let metrics = BuiltinMetric::ALL
            .into_iter()
            .map(|metric| {
                let summary = match metric.kind() {
                    MetricKind::Counter => MetricSummary::Counter {
                        count: value(metric, Aggregation::Count),
                        rate: value(metric, Aggregation::Rate),
                    },
                    MetricKind::Gauge => MetricSummary::Gauge {
                        value: value(metric, Aggregation::Value),
                        min: value(metric, Aggregation::Min),
                        max: value(metric, Aggregation::Max),
                    },
                    MetricKind::Rate => {
                        let counts = match metric {
                            BuiltinMetric::HttpReqFailed => snapshot.metrics.http.failed,
                            _ => snapshot.metrics.checks.total,
                        };
                        MetricSummary::Rate {
                            rate: counts.rate(),
                            passes: counts.passes,
                            fails: counts.fails,
                        }
                    }
                    MetricKind::Trend => {
                        MetricSummary::Trend(snapshot.trend_stats(metric).unwrap_or_default())
                    }
                };
                (metric.name(), summary)
            })
            .collect();

        Self {
            run_id: report.run_id,
            scenario: report.scenario.clone(),
            generated_at: Utc::now(),
            duration_secs: snapshot.elapsed.as_secs_f64(),
            metrics,
            checks: snapshot.metrics.checks.by_name.clone(),
            thresholds: report.thresholds.clone(),
            thresholds_passed: report.thresholds_passed(),
            interruption: report.interruption,
            exit_code: report.exit_code(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<(), LoadTestError> {
        let body = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, body).map_err(|source| LoadTestError::SummaryExport {
            path: path.to_path_buf(),
            source,
        })
    }
}
