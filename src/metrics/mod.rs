// Metrics module
// Collection, aggregation and reporting of run metrics

pub mod collector;
pub mod reporter;
pub mod summary;
pub mod types;

pub use collector::{MetricsCollector, MetricsSnapshot, TrendStats};
pub use types::{BuiltinMetric, MetricKind};
