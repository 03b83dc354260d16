//! Load test for the assignment statistics endpoint.
//!
//! The scenario ramps virtual users up to 500, holds, ramps back down and
//! fails the run when p95 latency or the request failure rate cross their
//! thresholds. [`executor::run`] drives any [`scenario::Scenario`]; the
//! `load-test` binary wires it to the command line.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod metrics;
pub mod report;
pub mod scenario;
pub mod threshold;

#[cfg(test)]
mod testing;

pub use error::LoadTestError;
pub use executor::{run, ExecutorConfig};
pub use report::RunReport;
pub use scenario::{AssignmentsScenario, Scenario, ScenarioOptions, Stage, VuContext};
