//! YAML scenario files.
//!
//! ```yaml
//! url: http://localhost:8080/stats/assignments
//! stages:
//!   - { duration: 30s, target: 500 }
//!   - { duration: 1m, target: 500 }
//!   - { duration: 30s, target: 0 }
//! thresholds:
//!   http_req_duration: ["p(95)<50"]
//!   http_req_failed: "rate<0.01"
//! gracefulStop: 30s
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::LoadTestError;
use crate::scenario::{ScenarioOptions, Stage};
use crate::threshold::ThresholdSet;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ThresholdExprs {
    One(String),
    Many(Vec<String>),
}

impl ThresholdExprs {
    fn into_vec(self) -> Vec<String> {
        match self {
            ThresholdExprs::One(expr) => vec![expr],
            ThresholdExprs::Many(exprs) => exprs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScenarioFile {
    /// Overrides the scenario's built-in target.
    #[serde(default)]
    pub url: Option<String>,

    pub stages: Vec<Stage>,

    #[serde(default)]
    thresholds: BTreeMap<String, ThresholdExprs>,

    #[serde(default, with = "humantime_serde")]
    pub graceful_stop: Option<Duration>,

    #[serde(default, with = "humantime_serde")]
    pub graceful_ramp_down: Option<Duration>,
}

impl ScenarioFile {
    pub fn load(path: &Path) -> Result<Self, LoadTestError> {
        let raw = std::fs::read_to_string(path).map_err(|source| LoadTestError::ScenarioFileIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| LoadTestError::ScenarioFileParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate stages and parse every threshold expression.
    pub fn to_options(&self) -> Result<ScenarioOptions, LoadTestError> {
        let thresholds = self
            .thresholds
            .iter()
            .map(|(metric, exprs)| ThresholdSet::parse(metric, exprs.clone().into_vec()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut options = ScenarioOptions::new(self.stages.clone(), thresholds)?;
        if let Some(graceful_stop) = self.graceful_stop {
            options = options.with_graceful_stop(graceful_stop);
        }
        if let Some(graceful_ramp_down) = self.graceful_ramp_down {
            options = options.with_graceful_ramp_down(graceful_ramp_down);
        }
        Ok(options)
    }
}
