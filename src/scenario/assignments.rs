//! Load scenario for the assignment statistics endpoint.
//!
//! Ramp to 500 VUs over 30s, hold for a minute, ramp back down over 30s.
//! Each iteration fetches the statistics once, checks for a 200 and pauses
//! for 100ms. The run passes when p95 latency stays under 50ms and fewer
//! than 1% of requests fail.

use std::time::Duration;

use async_trait::async_trait;

use super::options::{ScenarioOptions, Stage};
use super::{Scenario, VuContext};
use crate::error::LoadTestError;
use crate::threshold::ThresholdSet;

pub const TARGET_URL: &str = "http://app:8080/stats/assignments";
pub const STATUS_CHECK: &str = "status was 200";
pub const THINK_TIME: Duration = Duration::from_millis(100);

pub struct AssignmentsScenario {
    url: String,
    options: ScenarioOptions,
}

impl AssignmentsScenario {
    pub fn new() -> Self {
        Self {
            url: TARGET_URL.to_string(),
            options: Self::default_options(),
        }
    }

    pub fn default_options() -> ScenarioOptions {
        let stages = vec![
            Stage::new(Duration::from_secs(30), 500),
            Stage::new(Duration::from_secs(60), 500),
            Stage::new(Duration::from_secs(30), 0),
        ];

        ScenarioOptions::new(stages, Self::default_thresholds())
            .expect("built-in stages are not empty")
    }

    pub fn default_thresholds() -> Vec<ThresholdSet> {
        vec![
            ThresholdSet::parse("http_req_duration", ["p(95)<50"])
                .expect("built-in latency threshold is valid"),
            ThresholdSet::parse("http_req_failed", ["rate<0.01"])
                .expect("built-in failure threshold is valid"),
        ]
    }

    pub fn with_options(mut self, options: ScenarioOptions) -> Self {
        self.options = options;
        self
    }

    /// Point the scenario at another target, e.g. a locally running service.
    pub fn with_url(mut self, url: &str) -> Result<Self, LoadTestError> {
        let invalid = |reason: String| LoadTestError::InvalidUrl {
            url: url.to_string(),
            reason,
        };
        let parsed = reqwest::Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", parsed.scheme())));
        }
        self.url = url.to_string();
        Ok(self)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for AssignmentsScenario {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scenario for AssignmentsScenario {
    fn name(&self) -> &str {
        "assignments"
    }

    fn options(&self) -> &ScenarioOptions {
        &self.options
    }

    async fn iteration(&self, vu: &VuContext) {
        let response = vu.http_get(&self.url).await;
        vu.check(STATUS_CHECK, response.status == 200);
        vu.sleep(THINK_TIME).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::TransportError;
    use crate::metrics::{BuiltinMetric, MetricsCollector};
    use crate::testing::StubTransport;
    use crate::threshold::{Aggregation, Comparison};
    use std::sync::Arc;
    use tokio::time::Instant;

    async fn run_once(transport: Arc<StubTransport>) -> MetricsCollector {
        let metrics = MetricsCollector::new();
        let vu = VuContext::new(1, transport, metrics.clone());
        AssignmentsScenario::new().iteration(&vu).await;
        metrics
    }

    #[test]
    fn test_default_options_match_profile() {
        let scenario = AssignmentsScenario::new();
        let options = scenario.options();

        assert_eq!(scenario.url(), "http://app:8080/stats/assignments");
        assert_eq!(
            options.stages(),
            &[
                Stage::new(Duration::from_secs(30), 500),
                Stage::new(Duration::from_secs(60), 500),
                Stage::new(Duration::from_secs(30), 0),
            ]
        );
        assert_eq!(options.total_duration(), Duration::from_secs(120));

        let thresholds = options.thresholds();
        assert_eq!(thresholds.len(), 2);
        assert_eq!(thresholds[0].metric, BuiltinMetric::HttpReqDuration);
        assert_eq!(thresholds[0].expressions[0].aggregation, Aggregation::Percentile(95.0));
        assert_eq!(thresholds[0].expressions[0].comparison, Comparison::Lt);
        assert_eq!(thresholds[0].expressions[0].bound, 50.0);
        assert_eq!(thresholds[1].metric, BuiltinMetric::HttpReqFailed);
        assert_eq!(thresholds[1].expressions[0].aggregation, Aggregation::Rate);
        assert_eq!(thresholds[1].expressions[0].bound, 0.01);
    }

    #[tokio::test]
    async fn test_iteration_requests_fixed_url() {
        let transport = StubTransport::new(Ok(200));
        run_once(transport.clone()).await;
        run_once(transport.clone()).await;

        assert_eq!(transport.urls(), vec![TARGET_URL.to_string(), TARGET_URL.to_string()]);
    }

    #[tokio::test]
    async fn test_status_200_passes_check() {
        let metrics = run_once(StubTransport::new(Ok(200))).await;
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.metrics.checks.by_name[STATUS_CHECK].passes, 1);
        assert_eq!(snapshot.metrics.checks.by_name[STATUS_CHECK].fails, 0);
    }

    #[tokio::test]
    async fn test_other_status_fails_check() {
        for status in [201, 204, 301, 404, 500] {
            let metrics = run_once(StubTransport::new(Ok(status))).await;
            let snapshot = metrics.snapshot();
            assert_eq!(snapshot.metrics.checks.by_name[STATUS_CHECK].fails, 1, "{status}");
        }
    }

    #[tokio::test]
    async fn test_no_response_fails_check() {
        let metrics = run_once(StubTransport::new(Err(TransportError::Timeout))).await;
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.metrics.checks.by_name[STATUS_CHECK].fails, 1);
        assert_eq!(snapshot.metrics.http.transport_errors, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_fixed_regardless_of_outcome() {
        let outcomes = [
            Ok(200),
            Ok(500),
            Err(TransportError::Connect("refused".to_string())),
        ];
        for outcome in outcomes {
            let transport = StubTransport::new(outcome);
            let start = Instant::now();
            run_once(transport).await;
            assert_eq!(start.elapsed(), THINK_TIME);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_follows_the_response() {
        let latency = Duration::from_millis(40);
        let transport = StubTransport::with_latency(Ok(200), latency);
        let start = Instant::now();
        let metrics = run_once(transport).await;

        assert_eq!(start.elapsed(), latency + THINK_TIME);
        let stats = metrics
            .snapshot()
            .trend_stats(BuiltinMetric::HttpReqDuration)
            .unwrap();
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn test_with_url_validates() {
        let scenario = AssignmentsScenario::new()
            .with_url("http://localhost:8080/stats/assignments")
            .unwrap();
        assert_eq!(scenario.url(), "http://localhost:8080/stats/assignments");

        assert!(matches!(
            AssignmentsScenario::new().with_url("not a url"),
            Err(LoadTestError::InvalidUrl { .. })
        ));
        assert!(matches!(
            AssignmentsScenario::new().with_url("ftp://app/stats"),
            Err(LoadTestError::InvalidUrl { .. })
        ));
    }
}
