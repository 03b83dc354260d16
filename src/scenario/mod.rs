//! Scenario definitions and the per-VU context their iterations run in.

pub mod assignments;
pub mod options;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::http::{Transport, TransportError};
use crate::metrics::MetricsCollector;

pub use assignments::AssignmentsScenario;
pub use options::{RampSegment, ScenarioOptions, Stage};

/// A load test: static options plus one iteration body that the executor
/// calls repeatedly from every VU.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn name(&self) -> &str;

    fn options(&self) -> &ScenarioOptions;

    /// One unit of work. Failures are recorded as metrics, never returned.
    async fn iteration(&self, vu: &VuContext);
}

/// Outcome of a single request as seen by scenario code.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code, or 0 when no response was received.
    pub status: u16,
    pub duration: Duration,
    pub error: Option<TransportError>,
}

/// Handle a VU passes to [`Scenario::iteration`]. Requests and checks made
/// through it are recorded into the run's metrics.
pub struct VuContext {
    id: usize,
    iteration: u64,
    transport: Arc<dyn Transport>,
    metrics: MetricsCollector,
}

impl VuContext {
    pub fn new(id: usize, transport: Arc<dyn Transport>, metrics: MetricsCollector) -> Self {
        Self {
            id,
            iteration: 0,
            transport,
            metrics,
        }
    }

    /// 1-based VU number.
    pub fn id(&self) -> usize {
        self.id
    }

    /// 0-based iteration counter of this VU.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn advance(&mut self) {
        self.iteration += 1;
    }

    pub async fn http_get(&self, url: &str) -> HttpResponse {
        let start = Instant::now();
        let result = self.transport.get(url).await;
        let duration = start.elapsed();

        match result {
            Ok(status) => {
                self.metrics.request_completed(status, duration);
                HttpResponse {
                    status,
                    duration,
                    error: None,
                }
            }
            Err(e) => {
                tracing::debug!(vu = self.id, url, error = %e, "request failed");
                self.metrics.request_errored();
                HttpResponse {
                    status: 0,
                    duration,
                    error: Some(e),
                }
            }
        }
    }

    /// Record a named check and return its result.
    pub fn check(&self, name: &str, passed: bool) -> bool {
        self.metrics.check(name, passed);
        passed
    }

    pub async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
