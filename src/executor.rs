//! Ramping-VU executor - start and retire virtual users to follow the stages

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::http::Transport;
use crate::metrics::collector::MetricsCollector;
use crate::metrics::reporter;
use crate::report::{Interruption, RunReport};
use crate::scenario::{Scenario, VuContext};
use crate::threshold;

/// How often the scheduler re-reads the ramp profile.
pub const SCHEDULER_TICK: Duration = Duration::from_millis(100);

const ABORT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

// Stand-in for "never" when a grace period does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub tick: Duration,
    /// Seconds between progress lines, `None` to stay quiet.
    pub report_interval: Option<u64>,
    /// Stop as soon as a threshold fails on the live metrics.
    pub abort_on_fail: bool,
    /// Do not evaluate thresholds for `abort_on_fail` before this much time.
    pub abort_delay: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tick: SCHEDULER_TICK,
            report_interval: Some(5),
            abort_on_fail: false,
            abort_delay: Duration::from_secs(10),
        }
    }
}

struct VuHandle {
    id: usize,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

struct RetiringVu {
    vu: VuHandle,
    deadline: Instant,
}

fn deadline_after(now: Instant, grace: Duration) -> Instant {
    now.checked_add(grace).unwrap_or_else(|| now + FAR_FUTURE)
}

fn spawn_vu(
    id: usize,
    scenario: Arc<dyn Scenario>,
    transport: Arc<dyn Transport>,
    collector: MetricsCollector,
) -> VuHandle {
    let stop = CancellationToken::new();
    let token = stop.clone();

    let task = tokio::spawn(async move {
        let mut ctx = VuContext::new(id, transport, collector.clone());
        // Stop requests are honoured between iterations only
        while !token.is_cancelled() {
            let started = Instant::now();
            scenario.iteration(&ctx).await;
            collector.iteration_completed(started.elapsed());
            ctx.advance();
        }
        tracing::trace!(vu = id, iterations = ctx.iteration(), "VU stopped");
    });

    VuHandle { id, stop, task }
}

/// Run `scenario` through all of its stages and evaluate its thresholds.
///
/// Cancelling `shutdown` ends the run early; thresholds are still evaluated
/// on whatever was collected.
pub async fn run(
    scenario: Arc<dyn Scenario>,
    transport: Arc<dyn Transport>,
    config: ExecutorConfig,
    shutdown: CancellationToken,
) -> RunReport {
    let run_id = Uuid::new_v4();
    let options = scenario.options().clone();
    let total = options.total_duration();
    let timeline = options.timeline();

    tracing::info!(
        %run_id,
        scenario = scenario.name(),
        stages = timeline.len(),
        max_vus = options.max_vus(),
        duration = %humantime::format_duration(total),
        "Starting load test"
    );

    let collector = MetricsCollector::new();
    let reporter_task = config.report_interval.map(|secs| {
        let collector = collector.clone();
        tokio::spawn(async move {
            reporter::start_periodic_reporter(collector, secs).await;
        })
    });

    let start = Instant::now();
    let mut ticker = interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut active: Vec<VuHandle> = Vec::new();
    let mut retiring: Vec<RetiringVu> = Vec::new();
    let mut vu_counter = 0usize;
    let mut vus_max = 0usize;
    let mut current_stage = None;
    let mut last_abort_check = start;

    let interruption = loop {
        let cancelled = tokio::select! {
            _ = shutdown.cancelled() => true,
            _ = ticker.tick() => false,
        };
        if cancelled {
            tracing::warn!("Shutdown requested, stopping early");
            break Some(Interruption::Signal);
        }

        let now = Instant::now();
        let elapsed = now - start;
        if elapsed >= total {
            break None;
        }

        let stage = timeline.iter().position(|segment| elapsed < segment.end);
        if stage != current_stage {
            if let Some(idx) = stage {
                let segment = &timeline[idx];
                tracing::info!(
                    stage = idx + 1,
                    from = segment.from,
                    to = segment.to,
                    "Entering stage"
                );
            }
            current_stage = stage;
        }

        // Spawn VUs to reach the target, retire the newest ones above it
        let target = options.target_vus_at(elapsed) as usize;
        while active.len() < target {
            vu_counter += 1;
            active.push(spawn_vu(
                vu_counter,
                scenario.clone(),
                transport.clone(),
                collector.clone(),
            ));
        }
        while active.len() > target {
            let Some(vu) = active.pop() else { break };
            vu.stop.cancel();
            retiring.push(RetiringVu {
                vu,
                deadline: deadline_after(now, options.graceful_ramp_down),
            });
        }

        retiring.retain(|retiring_vu| {
            if retiring_vu.vu.task.is_finished() {
                false
            } else if now >= retiring_vu.deadline {
                tracing::debug!(
                    vu = retiring_vu.vu.id,
                    "Graceful ramp-down expired, aborting VU"
                );
                retiring_vu.vu.task.abort();
                false
            } else {
                true
            }
        });

        let running = active.len() + retiring.len();
        vus_max = vus_max.max(running);
        collector.set_vus(running, vus_max);

        if config.abort_on_fail
            && elapsed >= config.abort_delay
            && now - last_abort_check >= ABORT_CHECK_INTERVAL
        {
            last_abort_check = now;
            let snapshot = collector.snapshot();
            let failed: Vec<_> = threshold::evaluate_all(options.thresholds(), &snapshot)
                .into_iter()
                .filter(|result| !result.passed)
                .collect();
            if let Some(first) = failed.first() {
                tracing::warn!(
                    metric = first.metric.name(),
                    expression = first.expression.source(),
                    actual = first.actual,
                    "Threshold failed, aborting run"
                );
                break Some(Interruption::ThresholdsBreached);
            }
        }
    };

    if let Some(task) = reporter_task {
        task.abort();
    }

    let vus: Vec<VuHandle> = active
        .into_iter()
        .chain(retiring.into_iter().map(|retiring_vu| retiring_vu.vu))
        .collect();
    let interruption =
        interruption.or(stop_vus(vus, interruption, options.graceful_stop, &shutdown).await);
    collector.set_vus(0, vus_max);

    let snapshot = collector.snapshot();
    let thresholds = threshold::evaluate_all(options.thresholds(), &snapshot);

    tracing::info!(
        %run_id,
        iterations = snapshot.metrics.iterations.completed,
        requests = snapshot.metrics.http.requests,
        thresholds_failed = thresholds.iter().filter(|result| !result.passed).count(),
        "Load test finished"
    );

    RunReport {
        run_id,
        scenario: scenario.name().to_string(),
        snapshot,
        thresholds,
        interruption,
    }
}

/// Ask every VU to stop. After a normal end in-flight iterations get
/// `graceful_stop` to finish; an interrupted run aborts them at once.
/// Returns `Some(Interruption::Signal)` when `shutdown` fired while waiting.
async fn stop_vus(
    vus: Vec<VuHandle>,
    interruption: Option<Interruption>,
    graceful_stop: Duration,
    shutdown: &CancellationToken,
) -> Option<Interruption> {
    for vu in &vus {
        vu.stop.cancel();
    }

    if interruption.is_some() {
        for vu in &vus {
            vu.task.abort();
        }
    }

    tracing::info!("Waiting for {} VUs to finish their iterations...", vus.len());

    let deadline = deadline_after(Instant::now(), graceful_stop);
    let mut aborted = 0usize;
    let mut signalled = false;
    for mut vu in vus {
        if signalled {
            vu.task.abort();
            aborted += 1;
            continue;
        }

        let outcome = tokio::select! {
            result = tokio::time::timeout_at(deadline, &mut vu.task) => Some(result),
            _ = shutdown.cancelled() => None,
        };
        match outcome {
            Some(Ok(Ok(()))) => {}
            Some(Ok(Err(e))) if e.is_panic() => {
                tracing::error!("VU {} panicked: {}", vu.id, e);
            }
            Some(Ok(Err(_))) => {}
            Some(Err(_)) => {
                vu.task.abort();
                aborted += 1;
            }
            None => {
                tracing::warn!("Shutdown requested during graceful stop");
                signalled = true;
                vu.task.abort();
                aborted += 1;
            }
        }
    }

    if aborted > 0 {
        tracing::warn!(aborted, "Aborted in-flight iterations");
    }

    signalled.then_some(Interruption::Signal)
}
