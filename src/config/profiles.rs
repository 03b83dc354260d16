use std::time::Duration;

use clap::ValueEnum;

use crate::scenario::{AssignmentsScenario, ScenarioOptions, Stage};

/// Built-in ramp profiles selectable with `--profile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// Full run against the assignment statistics endpoint
    Assignments,
    /// Single VU sanity check with the same thresholds
    Smoke,
}

impl Profile {
    pub fn options(self) -> ScenarioOptions {
        match self {
            Profile::Assignments => assignments_profile(),
            Profile::Smoke => smoke_profile(),
        }
    }
}

/// Assignments profile
///
/// - 0 -> 500 VUs over 30s
/// - hold 500 VUs for 1m
/// - 500 -> 0 VUs over 30s
/// - p(95) of http_req_duration under 50ms
/// - under 1% failed requests
pub fn assignments_profile() -> ScenarioOptions {
    AssignmentsScenario::default_options()
}

/// Smoke profile for checking a deployment before a full run
///
/// - 1 VU from the start for 10s
/// - same thresholds as the assignments profile
/// - 5s graceful stop
pub fn smoke_profile() -> ScenarioOptions {
    let stages = vec![
        Stage::new(Duration::ZERO, 1),
        Stage::new(Duration::from_secs(10), 1),
    ];
    ScenarioOptions::new(stages, AssignmentsScenario::default_thresholds())
        .expect("built-in stages are not empty")
        .with_graceful_stop(Duration::from_secs(5))
}
