//! Outcome of a finished run and the process exit code it maps to.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::metrics::MetricsSnapshot;
use crate::threshold::ThresholdResult;

/// Exit code when every threshold held.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code when at least one threshold was violated.
pub const EXIT_THRESHOLDS_FAILED: u8 = 99;
/// Exit code when the run was interrupted from outside (Ctrl+C) and no
/// threshold failed on the data gathered up to that point.
pub const EXIT_INTERRUPTED: u8 = 105;

/// Why a run ended before its last stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interruption {
    /// Ctrl+C or another external shutdown signal.
    Signal,
    /// A threshold failed while `--abort-on-fail` was set.
    ThresholdsBreached,
}

impl fmt::Display for Interruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interruption::Signal => f.write_str("interrupted by signal"),
            Interruption::ThresholdsBreached => f.write_str("aborted on threshold failure"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub scenario: String,
    pub snapshot: MetricsSnapshot,
    pub thresholds: Vec<ThresholdResult>,
    pub interruption: Option<Interruption>,
}

impl RunReport {
    pub fn thresholds_passed(&self) -> bool {
        self.thresholds.iter().all(|result| result.passed)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.thresholds.iter().filter(|result| !result.passed)
    }

    /// A run aborted on a live threshold failure exits as failed even when
    /// the final evaluation passes.
    pub fn exit_code(&self) -> u8 {
        if !self.thresholds_passed()
            || self.interruption == Some(Interruption::ThresholdsBreached)
        {
            EXIT_THRESHOLDS_FAILED
        } else if self.interruption == Some(Interruption::Signal) {
            EXIT_INTERRUPTED
        } else {
            EXIT_SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsCollector;
    use crate::threshold::ThresholdSet;
    use std::time::Duration;

    fn report(status: u16, interruption: Option<Interruption>) -> RunReport {
        let collector = MetricsCollector::new();
        collector.request_completed(status, Duration::from_millis(3));
        let snapshot = collector.snapshot();
        let set = ThresholdSet::parse("http_req_failed", ["rate<0.01"]).unwrap();

        RunReport {
            run_id: Uuid::new_v4(),
            scenario: "test".to_string(),
            thresholds: set.evaluate(&snapshot),
            snapshot,
            interruption,
        }
    }

    #[test]
    fn test_exit_code_success() {
        assert_eq!(report(200, None).exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn test_exit_code_thresholds_failed() {
        let report = report(500, None);
        assert!(!report.thresholds_passed());
        assert_eq!(report.failed_thresholds().count(), 1);
        assert_eq!(report.exit_code(), EXIT_THRESHOLDS_FAILED);
    }

    #[test]
    fn test_threshold_failure_wins_over_interruption() {
        assert_eq!(
            report(500, Some(Interruption::Signal)).exit_code(),
            EXIT_THRESHOLDS_FAILED
        );
        assert_eq!(
            report(200, Some(Interruption::Signal)).exit_code(),
            EXIT_INTERRUPTED
        );
        assert_eq!(
            report(200, Some(Interruption::ThresholdsBreached)).exit_code(),
            EXIT_THRESHOLDS_FAILED
        );
    }
}
