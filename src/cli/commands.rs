use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use super::args::{InspectArgs, RunArgs};
use crate::executor::{self, ExecutorConfig};
use crate::http::ReqwestTransport;
use crate::metrics::reporter;
use crate::metrics::summary::RunSummary;
use crate::scenario::Scenario;

/// Execute the scenario and return the process exit code.
pub async fn run(args: RunArgs) -> Result<u8> {
    let scenario = args
        .source
        .resolve()
        .context("Failed to resolve scenario")?;

    tracing::info!("Target: {}", scenario.url());
    for segment in scenario.options().timeline() {
        tracing::info!("  {}", segment);
    }

    let transport = ReqwestTransport::new(Duration::from_secs(args.request_timeout))?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    let config = ExecutorConfig {
        report_interval: (args.report_interval > 0).then_some(args.report_interval),
        abort_on_fail: args.abort_on_fail,
        abort_delay: Duration::from_secs(args.abort_delay),
        ..ExecutorConfig::default()
    };

    let report = executor::run(Arc::new(scenario), Arc::new(transport), config, shutdown).await;

    reporter::print_final_report(&report);

    if let Some(path) = &args.summary_export {
        RunSummary::from_report(&report)
            .write_json(path)
            .context("Failed to export summary")?;
        tracing::info!("Summary written to {}", path.display());
    }

    for failed in report.failed_thresholds() {
        tracing::error!(
            "Threshold failed: {} {} (actual {:.4})",
            failed.metric,
            failed.expression.source(),
            failed.actual
        );
    }

    Ok(report.exit_code())
}

/// Print the resolved options as JSON followed by the ramp timeline.
pub fn inspect(args: InspectArgs) -> Result<u8> {
    let scenario = args
        .source
        .resolve()
        .context("Failed to resolve scenario")?;
    let options = scenario.options();

    let thresholds: serde_json::Map<String, serde_json::Value> = options
        .thresholds()
        .iter()
        .map(|set| {
            (
                set.metric.name().to_string(),
                serde_json::json!(set.expressions),
            )
        })
        .collect();

    let resolved = serde_json::json!({
        "scenario": scenario.name(),
        "url": scenario.url(),
        "stages": options.stages(),
        "thresholds": thresholds,
        "gracefulStop": humantime::format_duration(options.graceful_stop).to_string(),
        "gracefulRampDown": humantime::format_duration(options.graceful_ramp_down).to_string(),
        "totalDuration": humantime::format_duration(options.total_duration()).to_string(),
        "maxVUs": options.max_vus(),
    });

    println!("{}", serde_json::to_string_pretty(&resolved)?);
    println!();
    for segment in options.timeline() {
        println!("{segment}");
    }

    Ok(0)
}
