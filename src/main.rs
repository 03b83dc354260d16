use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use assignments_load_test::cli::{commands, Cli, Command};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize tracing, RUST_LOG takes precedence over --verbose
    let level = if cli.command.verbose() { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let code = match cli.command {
        Command::Run(args) => {
            tracing::info!("Assignments Load Test Starting...");
            commands::run(args).await?
        }
        Command::Inspect(args) => commands::inspect(args)?,
    };

    Ok(ExitCode::from(code))
}
