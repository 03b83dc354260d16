use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Profile, ScenarioFile};
use crate::error::LoadTestError;
use crate::scenario::AssignmentsScenario;

/// Assignments Load Testing Tool
#[derive(Parser, Debug)]
#[command(name = "load-test")]
#[command(about = "Ramp virtual users against the assignment statistics endpoint and check thresholds")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Execute the scenario and exit non-zero when a threshold fails
    Run(RunArgs),

    /// Print the resolved options and ramp timeline without sending requests
    Inspect(InspectArgs),
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Run(args) => args.verbose,
            Command::Inspect(_) => false,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScenarioSource {
    /// Built-in ramp profile
    #[arg(long, value_enum, default_value = "assignments")]
    pub profile: Profile,

    /// YAML file with stages and thresholds, replaces --profile
    #[arg(long, conflicts_with = "profile")]
    pub scenario_file: Option<PathBuf>,

    /// Target URL override
    #[arg(long)]
    pub url: Option<String>,
}

impl ScenarioSource {
    pub fn resolve(&self) -> Result<AssignmentsScenario, LoadTestError> {
        let mut scenario = AssignmentsScenario::new();

        match &self.scenario_file {
            Some(path) => {
                let file = ScenarioFile::load(path)?;
                scenario = scenario.with_options(file.to_options()?);
                if let Some(url) = &file.url {
                    scenario = scenario.with_url(url)?;
                }
            }
            None => {
                scenario = scenario.with_options(self.profile.options());
            }
        }

        if let Some(url) = &self.url {
            scenario = scenario.with_url(url)?;
        }

        Ok(scenario)
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: ScenarioSource,

    /// Seconds between progress lines, 0 disables them
    #[arg(long, default_value = "5")]
    pub report_interval: u64,

    /// Write the end-of-run summary as JSON to this path
    #[arg(long)]
    pub summary_export: Option<PathBuf>,

    /// Stop the run as soon as a threshold fails
    #[arg(long)]
    pub abort_on_fail: bool,

    /// Seconds to wait before thresholds may abort the run
    #[arg(long, default_value = "10", requires = "abort_on_fail")]
    pub abort_delay: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "60")]
    pub request_timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[command(flatten)]
    pub source: ScenarioSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_run_defaults() {
        let cli = parse(&["load-test", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source.profile, Profile::Assignments);
        assert_eq!(args.report_interval, 5);
        assert_eq!(args.request_timeout, 60);
        assert!(!args.abort_on_fail);

        let scenario = args.source.resolve().unwrap();
        assert_eq!(scenario.url(), "http://app:8080/stats/assignments");
        assert_eq!(scenario.options().total_duration(), Duration::from_secs(120));
    }

    #[test]
    fn test_profile_and_url_override() {
        let cli = parse(&[
            "load-test",
            "inspect",
            "--profile",
            "smoke",
            "--url",
            "http://localhost:8080/stats/assignments",
        ]);
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        let scenario = args.source.resolve().unwrap();
        assert_eq!(scenario.url(), "http://localhost:8080/stats/assignments");
        assert_eq!(scenario.options().total_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_profile_conflicts_with_scenario_file() {
        let result = Cli::try_parse_from([
            "load-test",
            "run",
            "--profile",
            "smoke",
            "--scenario-file",
            "scenario.yaml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_abort_delay_requires_abort_on_fail() {
        assert!(Cli::try_parse_from(["load-test", "run", "--abort-delay", "5"]).is_err());
        assert!(
            Cli::try_parse_from(["load-test", "run", "--abort-on-fail", "--abort-delay", "5"])
                .is_ok()
        );
    }

    #[test]
    fn test_bad_url_rejected_on_resolve() {
        let cli = parse(&["load-test", "run", "--url", "app:8080"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(matches!(
            args.source.resolve(),
            Err(LoadTestError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
