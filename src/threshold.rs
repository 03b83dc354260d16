//! Pass/fail threshold expressions.
//!
//! An expression is `<aggregation> <operator> <bound>`, for example
//! `p(95)<50` or `rate<0.01`. Trend bounds are milliseconds.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::LoadTestError;
use crate::metrics::{BuiltinMetric, MetricKind, MetricsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Med,
    Max,
    Count,
    Rate,
    Value,
    /// Percentile in `0..=100`.
    Percentile(f64),
}

impl Aggregation {
    pub fn applies_to(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Counter => matches!(self, Aggregation::Count | Aggregation::Rate),
            MetricKind::Gauge => {
                matches!(self, Aggregation::Value | Aggregation::Min | Aggregation::Max)
            }
            MetricKind::Rate => matches!(self, Aggregation::Rate),
            MetricKind::Trend => matches!(
                self,
                Aggregation::Avg
                    | Aggregation::Min
                    | Aggregation::Med
                    | Aggregation::Max
                    | Aggregation::Percentile(_)
            ),
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let aggregation = match raw {
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "med" => Aggregation::Med,
            "max" => Aggregation::Max,
            "count" => Aggregation::Count,
            "rate" => Aggregation::Rate,
            "value" => Aggregation::Value,
            _ => {
                let inner = raw.strip_prefix("p(")?.strip_suffix(')')?;
                let p: f64 = inner.trim().parse().ok()?;
                if !(0.0..=100.0).contains(&p) {
                    return None;
                }
                Aggregation::Percentile(p)
            }
        };
        Some(aggregation)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => f.write_str("avg"),
            Aggregation::Min => f.write_str("min"),
            Aggregation::Med => f.write_str("med"),
            Aggregation::Max => f.write_str("max"),
            Aggregation::Count => f.write_str("count"),
            Aggregation::Rate => f.write_str("rate"),
            Aggregation::Value => f.write_str("value"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    // Two-character operators first so `<=` is not read as `<`.
    const OPERATORS: [(&'static str, Comparison); 7] = [
        ("===", Comparison::Eq),
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    pub fn holds(self, actual: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => actual < bound,
            Comparison::Le => actual <= bound,
            Comparison::Gt => actual > bound,
            Comparison::Ge => actual >= bound,
            Comparison::Eq => actual == bound,
            Comparison::Ne => actual != bound,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

/// One parsed threshold expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    source: String,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
}

impl ThresholdExpr {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn holds(&self, actual: f64) -> bool {
        self.comparison.holds(actual, self.bound)
    }
}

impl FromStr for ThresholdExpr {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| LoadTestError::InvalidThreshold {
            expression: s.to_string(),
            reason: reason.to_string(),
        };

        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();

        let (at, op, comparison) = Comparison::OPERATORS
            .iter()
            .filter_map(|(op, cmp)| compact.find(op).map(|at| (at, *op, *cmp)))
            .min_by_key(|(at, op, _)| (*at, std::cmp::Reverse(op.len())))
            .ok_or_else(|| invalid("missing comparison operator"))?;

        let lhs = &compact[..at];
        let rhs = &compact[at + op.len()..];
        if lhs.is_empty() {
            return Err(invalid("missing aggregation"));
        }

        let aggregation =
            Aggregation::parse(lhs).ok_or_else(|| invalid(&format!("unknown aggregation `{lhs}`")))?;
        let bound: f64 = rhs
            .parse()
            .map_err(|_| invalid(&format!("bound `{rhs}` is not a number")))?;
        if !bound.is_finite() {
            return Err(invalid("bound must be finite"));
        }

        Ok(Self {
            source: s.trim().to_string(),
            aggregation,
            comparison,
            bound,
        })
    }
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregation, self.comparison.symbol(), self.bound)
    }
}

impl Serialize for ThresholdExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

/// All expressions attached to one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    pub metric: BuiltinMetric,
    pub expressions: Vec<ThresholdExpr>,
}

impl ThresholdSet {
    /// Parse and validate `expressions` against `metric`.
    pub fn parse<I, S>(metric: &str, expressions: I) -> Result<Self, LoadTestError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed_metric: BuiltinMetric = metric.parse()?;
        let kind = parsed_metric.kind();

        let expressions = expressions
            .into_iter()
            .map(|raw| {
                let expr: ThresholdExpr = raw.as_ref().parse()?;
                if !expr.aggregation.applies_to(kind) {
                    return Err(LoadTestError::AggregationMismatch {
                        metric: metric.to_string(),
                        kind,
                        aggregation: expr.aggregation.to_string(),
                    });
                }
                Ok(expr)
            })
            .collect::<Result<Vec<_>, _>>()?;

        if expressions.is_empty() {
            return Err(LoadTestError::EmptyThresholds(metric.to_string()));
        }

        Ok(Self {
            metric: parsed_metric,
            expressions,
        })
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Vec<ThresholdResult> {
        self.expressions
            .iter()
            .map(|expr| {
                // Validated at parse time, so the aggregation always applies.
                let actual = snapshot
                    .aggregate(self.metric, &expr.aggregation)
                    .unwrap_or_default();
                ThresholdResult {
                    metric: self.metric,
                    expression: expr.clone(),
                    actual,
                    passed: expr.holds(actual),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ThresholdResult {
    #[serde(serialize_with = "serialize_metric")]
    pub metric: BuiltinMetric,
    pub expression: ThresholdExpr,
    pub actual: f64,
    pub passed: bool,
}

fn serialize_metric<S: Serializer>(metric: &BuiltinMetric, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(metric.name())
}

/// Evaluate every set and flatten the results in declaration order.
pub fn evaluate_all(sets: &[ThresholdSet], snapshot: &MetricsSnapshot) -> Vec<ThresholdResult> {
    sets.iter().flat_map(|set| set.evaluate(snapshot)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsCollector;
    use std::time::Duration;

    #[test]
    fn test_parse_percentile_threshold() {
        let expr: ThresholdExpr = "p(95)<50".parse().unwrap();
        assert_eq!(expr.aggregation, Aggregation::Percentile(95.0));
        assert_eq!(expr.comparison, Comparison::Lt);
        assert_eq!(expr.bound, 50.0);
        assert!(expr.holds(49.9));
        assert!(!expr.holds(50.0));
    }

    #[test]
    fn test_parse_rate_threshold() {
        let expr: ThresholdExpr = "rate<0.01".parse().unwrap();
        assert_eq!(expr.aggregation, Aggregation::Rate);
        assert_eq!(expr.comparison, Comparison::Lt);
        assert_eq!(expr.bound, 0.01);
        assert!(expr.holds(0.0099));
        assert!(!expr.holds(0.01));
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_fractional_percentile() {
        let expr: ThresholdExpr = " p(99.9) <= 250 ".parse().unwrap();
        assert_eq!(expr.aggregation, Aggregation::Percentile(99.9));
        assert_eq!(expr.comparison, Comparison::Le);
        assert_eq!(expr.source(), "p(99.9) <= 250");
    }

    #[test]
    fn test_parse_all_operators() {
        let cases = [
            ("avg<1", Comparison::Lt),
            ("avg<=1", Comparison::Le),
            ("avg>1", Comparison::Gt),
            ("avg>=1", Comparison::Ge),
            ("avg==1", Comparison::Eq),
            ("avg===1", Comparison::Eq),
            ("avg!=1", Comparison::Ne),
        ];
        for (raw, expected) in cases {
            let expr: ThresholdExpr = raw.parse().unwrap();
            assert_eq!(expr.comparison, expected, "{raw}");
            assert_eq!(expr.bound, 1.0, "{raw}");
        }
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["p(95)", "<50", "p(95)<fast", "p(101)<5", "p95<5", "mean<5", "rate<inf"] {
            let err = raw.parse::<ThresholdExpr>().unwrap_err();
            assert!(
                matches!(err, LoadTestError::InvalidThreshold { .. }),
                "{raw} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_set_rejects_aggregation_for_wrong_kind() {
        let err = ThresholdSet::parse("http_req_failed", ["p(95)<50"]).unwrap_err();
        assert!(matches!(err, LoadTestError::AggregationMismatch { kind: MetricKind::Rate, .. }));

        let err = ThresholdSet::parse("http_req_duration", ["rate<0.01"]).unwrap_err();
        assert!(matches!(err, LoadTestError::AggregationMismatch { kind: MetricKind::Trend, .. }));
    }

    #[test]
    fn test_set_rejects_unknown_metric_and_empty_list() {
        let err = ThresholdSet::parse("latency", ["p(95)<50"]).unwrap_err();
        assert!(matches!(err, LoadTestError::UnknownMetric(_)));

        let err = ThresholdSet::parse("checks", Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, LoadTestError::EmptyThresholds(_)));
    }

    #[test]
    fn test_evaluate_against_snapshot() {
        let collector = MetricsCollector::new();
        for _ in 0..99 {
            collector.request_completed(200, Duration::from_millis(10));
        }
        collector.request_completed(500, Duration::from_millis(80));
        let snapshot = collector.snapshot();

        let latency = ThresholdSet::parse("http_req_duration", ["p(95)<50", "max<50"]).unwrap();
        let results = latency.evaluate(&snapshot);
        assert!(results[0].passed);
        assert!(!results[1].passed);

        // 1 failure in 100 is exactly 0.01, which is not strictly below it
        let failed = ThresholdSet::parse("http_req_failed", ["rate<0.01"]).unwrap();
        let results = failed.evaluate(&snapshot);
        assert!(!results[0].passed);
        assert!((results[0].actual - 0.01).abs() < 1e-9);
    }
}
