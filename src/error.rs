//! Error types for the load test library.
//!
//! Failed checks and failed requests are metric events, not errors. The
//! variants here cover configuration problems and I/O around a run.

use std::path::PathBuf;

use thiserror::Error;

use crate::metrics::MetricKind;

#[derive(Debug, Error)]
pub enum LoadTestError {
    #[error("scenario defines no stages")]
    NoStages,

    #[error("total duration of the stages is too large")]
    DurationOverflow,

    #[error("invalid threshold expression `{expression}`: {reason}")]
    InvalidThreshold { expression: String, reason: String },

    #[error("unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("aggregation `{aggregation}` is not valid for {kind} metric `{metric}`")]
    AggregationMismatch {
        metric: String,
        kind: MetricKind,
        aggregation: String,
    },

    #[error("metric `{0}` has an empty threshold list")]
    EmptyThresholds(String),

    #[error("invalid target url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to read scenario file {}: {source}", path.display())]
    ScenarioFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scenario file {}: {source}", path.display())]
    ScenarioFileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to write summary to {}: {source}", path.display())]
    SummaryExport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode summary: {0}")]
    SummaryEncode(#[from] serde_json::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub type Result<T, E = LoadTestError> = std::result::Result<T, E>;
