//! Console reporter for metrics with periodic progress lines

use std::io::{self, Write};

use tokio::time::{interval, Duration, MissedTickBehavior};

use super::collector::MetricsCollector;
use super::types::BuiltinMetric;
use crate::report::RunReport;
use crate::threshold::Aggregation;

/// Log a progress line every `interval_secs` until the task is dropped.
pub async fn start_periodic_reporter(collector: MetricsCollector, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and there is nothing to show yet
    ticker.tick().await;

    loop {
        ticker.tick().await;
        log_live_metrics(&collector);
    }
}

pub fn log_live_metrics(collector: &MetricsCollector) {
    let snapshot = collector.snapshot();
    let metrics = &snapshot.metrics;
    let p95 = snapshot
        .aggregate(BuiltinMetric::HttpReqDuration, &Aggregation::Percentile(95.0))
        .unwrap_or_default();

    tracing::info!(
        elapsed = %format_elapsed(snapshot.elapsed.as_secs()),
        vus = metrics.vus.value,
        reqs = metrics.http.requests,
        failed_pct = %format!("{:.2}", metrics.http.failed.rate() * 100.0),
        p95_ms = %format!("{p95:.2}"),
        iterations = metrics.iterations.completed,
        "progress"
    );
}

fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn format_ms(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{ms:.2}ms")
    }
}

/// Print final summary report
pub fn print_final_report(report: &RunReport) {
    let snapshot = &report.snapshot;
    let metrics = &snapshot.metrics;
    let elapsed = snapshot.elapsed.as_secs_f64();

    println!("\n╔════════════════════════════════════════════════════════════════╗");
    println!("║                    FINAL TEST REPORT                           ║");
    println!("╚════════════════════════════════════════════════════════════════╝");
    println!("\n   Scenario:             {:>10}", report.scenario);
    println!("   Run ID:               {}", report.run_id);
    if let Some(interruption) = report.interruption {
        println!("   Ended early:          {interruption}");
    }

    if !metrics.checks.by_name.is_empty() {
        println!("\n✅ CHECKS");
        for (name, counts) in &metrics.checks.by_name {
            let mark = if counts.fails == 0 { "✓" } else { "✗" };
            println!(
                "   {mark} {name:<30} {:>6.2}%  ✓ {:<8} ✗ {}",
                counts.rate() * 100.0,
                counts.passes,
                counts.fails
            );
        }
    }

    println!("\n📊 HTTP");
    println!("   Requests:             {:>10}", metrics.http.requests);
    if elapsed > 0.0 {
        println!(
            "   Throughput:           {:>10.2} req/sec",
            metrics.http.requests as f64 / elapsed
        );
    }
    println!(
        "   Failed:               {:>9.2}%  ({} of {})",
        metrics.http.failed.rate() * 100.0,
        metrics.http.failed.passes,
        metrics.http.failed.total()
    );
    if metrics.http.transport_errors > 0 {
        println!("   Transport Errors:     {:>10}", metrics.http.transport_errors);
    }

    for metric in [BuiltinMetric::HttpReqDuration, BuiltinMetric::IterationDuration] {
        let Some(stats) = snapshot.trend_stats(metric) else {
            continue;
        };
        if stats.count == 0 {
            continue;
        }
        println!("\n📈 {}", metric.name().to_uppercase());
        println!("   Avg:                  {:>10}", format_ms(stats.avg));
        println!("   Min:                  {:>10}", format_ms(stats.min));
        println!("   Med:                  {:>10}", format_ms(stats.med));
        println!("   Max:                  {:>10}", format_ms(stats.max));
        println!("   P90:                  {:>10}", format_ms(stats.p90));
        println!("   P95:                  {:>10}", format_ms(stats.p95));
    }

    println!("\n⚙️  EXECUTION");
    println!("   Iterations:           {:>10}", metrics.iterations.completed);
    println!("   VUs (max):            {:>10}", metrics.vus_max.max);

    if !report.thresholds.is_empty() {
        println!("\n🎯 THRESHOLDS");
        for result in &report.thresholds {
            let mark = if result.passed { "✓" } else { "✗" };
            println!(
                "   {mark} {:<20} {:<14} actual={:.4}",
                result.metric.name(),
                result.expression.source(),
                result.actual
            );
        }
    }

    println!("\n⏱️  Test Duration: {elapsed:.2} seconds");
    println!("════════════════════════════════════════════════════════════════\n");

    let _ = io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(125), "00:02:05");
        assert_eq!(format_elapsed(3725), "01:02:05");
    }

    #[test]
    fn test_format_ms_switches_to_seconds() {
        assert_eq!(format_ms(12.5), "12.50ms");
        assert_eq!(format_ms(1500.0), "1.50s");
    }
}
