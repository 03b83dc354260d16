//! Ramp profile and pass/fail configuration of a scenario.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LoadTestError;
use crate::threshold::ThresholdSet;

/// Time allowed for in-flight iterations once the last stage has ended.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);
/// Time a retiring VU may keep running its current iteration during ramp-down.
pub const DEFAULT_GRACEFUL_RAMP_DOWN: Duration = Duration::from_secs(30);

/// One segment of the ramp profile: move linearly to `target` VUs over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOptions {
    stages: Vec<Stage>,
    thresholds: Vec<ThresholdSet>,
    pub graceful_stop: Duration,
    pub graceful_ramp_down: Duration,
}

impl ScenarioOptions {
    pub fn new(stages: Vec<Stage>, thresholds: Vec<ThresholdSet>) -> Result<Self, LoadTestError> {
        if stages.is_empty() {
            return Err(LoadTestError::NoStages);
        }
        stages
            .iter()
            .try_fold(Duration::ZERO, |total, stage| total.checked_add(stage.duration))
            .ok_or(LoadTestError::DurationOverflow)?;
        Ok(Self {
            stages,
            thresholds,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            graceful_ramp_down: DEFAULT_GRACEFUL_RAMP_DOWN,
        })
    }

    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    pub fn with_graceful_ramp_down(mut self, graceful_ramp_down: Duration) -> Self {
        self.graceful_ramp_down = graceful_ramp_down;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn thresholds(&self) -> &[ThresholdSet] {
        &self.thresholds
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|stage| stage.duration).sum()
    }

    pub fn max_vus(&self) -> u32 {
        self.stages.iter().map(|stage| stage.target).max().unwrap_or(0)
    }

    /// Target VU count at `elapsed` since the start of the run.
    ///
    /// The profile starts at 0 VUs and interpolates linearly inside each
    /// stage, truncating toward zero. A zero-length stage jumps straight to
    /// its target. Past the last stage the target is 0.
    pub fn target_vus_at(&self, elapsed: Duration) -> u32 {
        let mut stage_start = Duration::ZERO;
        let mut previous = 0u32;

        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            if elapsed < stage_end {
                let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let delta = f64::from(stage.target) - f64::from(previous);
                return (f64::from(previous) + delta * progress) as u32;
            }
            stage_start = stage_end;
            previous = stage.target;
        }

        0
    }

    /// Absolute start/end of every stage with the VU counts it moves between.
    pub fn timeline(&self) -> Vec<RampSegment> {
        let mut start = Duration::ZERO;
        let mut from = 0u32;

        self.stages
            .iter()
            .map(|stage| {
                let segment = RampSegment {
                    start,
                    end: start + stage.duration,
                    from,
                    to: stage.target,
                };
                start = segment.end;
                from = stage.target;
                segment
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampSegment {
    pub start: Duration,
    pub end: Duration,
    pub from: u32,
    pub to: u32,
}

impl fmt::Display for RampSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.from.cmp(&self.to) {
            std::cmp::Ordering::Less => "ramp up",
            std::cmp::Ordering::Equal => "hold",
            std::cmp::Ordering::Greater => "ramp down",
        };
        write!(
            f,
            "{:>6} -> {:<6} {:<9} {} -> {} VUs",
            humantime::format_duration(self.start).to_string(),
            humantime::format_duration(self.end).to_string(),
            action,
            self.from,
            self.to
        )
    }
}
