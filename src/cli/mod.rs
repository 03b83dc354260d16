// CLI module
// Argument parsing and the run / inspect commands

pub mod args;
pub mod commands;

pub use args::{Cli, Command, InspectArgs, RunArgs, ScenarioSource};
