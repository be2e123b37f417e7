// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Metric trait and the default exact-match metric

use crate::error::Result;
use crate::example::Example;
use crate::prediction::Prediction;

/// Result of a metric evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct MetricResult {
    /// Score. Higher is better; values outside 0..=1 are allowed.
    pub score: f64,
    /// Whether the prediction counts as a success
    pub passed: bool,
    /// Optional details
    pub details: Option<String>,
}

impl MetricResult {
    /// Create a result; any positive score passes.
    pub fn new(score: f64) -> Self {
        Self {
            score,
            passed: score > 0.0,
            details: None,
        }
    }

    /// Create a passed result
    pub fn pass() -> Self {
        Self::new(1.0)
    }

    /// Create a failed result
    pub fn fail() -> Self {
        Self::new(0.0)
    }

    /// Add details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<bool> for MetricResult {
    fn from(ok: bool) -> Self {
        if ok {
            Self::pass()
        } else {
            Self::fail()
        }
    }
}

impl From<f64> for MetricResult {
    fn from(score: f64) -> Self {
        Self::new(score)
    }
}

/// Metric trait for scoring predictions against examples.
///
/// An `Err` means the metric itself broke, not that the prediction was wrong.
pub trait Metric: Send + Sync {
    /// Evaluate a prediction against an example
    fn evaluate(&self, example: &Example, prediction: &Prediction) -> Result<MetricResult>;

    /// Get metric name
    fn name(&self) -> &str;
}

impl<M: Metric + ?Sized> Metric for &M {
    fn evaluate(&self, example: &Example, prediction: &Prediction) -> Result<MetricResult> {
        (**self).evaluate(example, prediction)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<M: Metric + ?Sized> Metric for Box<M> {
    fn evaluate(&self, example: &Example, prediction: &Prediction) -> Result<MetricResult> {
        (**self).evaluate(example, prediction)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Every expected output field must equal the predicted one (whitespace
/// trimmed).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl Metric for ExactMatch {
    fn evaluate(&self, example: &Example, prediction: &Prediction) -> Result<MetricResult> {
        if example.outputs.is_empty() {
            return Ok(MetricResult::fail().with_details("No expected outputs in example"));
        }

        let all_match = example.outputs.iter().all(|(key, expected)| {
            prediction
                .get(key)
                .map(|got| got.trim() == expected.trim())
                .unwrap_or(false)
        });

        Ok(all_match.into())
    }

    fn name(&self) -> &str {
        "exact_match"
    }
}

/// A metric backed by a closure.
///
/// ```
/// use dotori::metric::{FnMetric, Metric};
/// use dotori::{Example, Prediction};
///
/// let contains = FnMetric::new("contains", |ex: &Example, pred: &Prediction| {
///     let expected = ex.get_output("answer").unwrap_or_default();
///     Ok(pred.get("answer").is_some_and(|a| a.contains(expected)).into())
/// });
/// assert_eq!(contains.name(), "contains");
/// ```
pub struct FnMetric<F> {
    f: F,
    name: &'static str,
}

impl<F> FnMetric<F>
where
    F: Fn(&Example, &Prediction) -> Result<MetricResult> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { f, name }
    }
}

impl<F> Metric for FnMetric<F>
where
    F: Fn(&Example, &Prediction) -> Result<MetricResult> + Send + Sync,
{
    fn evaluate(&self, example: &Example, prediction: &Prediction) -> Result<MetricResult> {
        (self.f)(example, prediction)
    }

    fn name(&self) -> &str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn example() -> Example {
        Example::new("1").input("question", "2+2?").output("answer", "4")
    }

    #[test]
    fn test_exact_match_pass_and_fail() {
        let hit = Prediction::new().field("answer", " 4 ");
        let miss = Prediction::new().field("answer", "5");

        let ok = ExactMatch.evaluate(&example(), &hit).unwrap();
        assert!(ok.passed);
        assert_eq!(ok.score, 1.0);

        let bad = ExactMatch.evaluate(&example(), &miss).unwrap();
        assert!(!bad.passed);
        assert_eq!(bad.score, 0.0);
    }

    #[test]
    fn test_exact_match_missing_field() {
        let pred = Prediction::new().field("other", "4");
        assert!(!ExactMatch.evaluate(&example(), &pred).unwrap().passed);

        let unlabeled = Example::new("2").input("question", "?");
        let result = ExactMatch.evaluate(&unlabeled, &pred).unwrap();
        assert!(!result.passed);
        assert!(result.details.is_some());
    }

    #[test]
    fn test_metric_result_conversions() {
        assert!(MetricResult::from(true).passed);
        assert!(!MetricResult::from(false).passed);

        let partial = MetricResult::from(0.25);
        assert!(partial.passed);
        assert_eq!(partial.score, 0.25);
        assert!(!MetricResult::from(-1.0).passed);
    }

    #[test]
    fn test_fn_metric_can_fail() {
        let metric = FnMetric::new("broken", |_: &Example, _: &Prediction| {
            Err(Error::metric("judge unavailable"))
        });
        let err = metric.evaluate(&example(), &Prediction::new()).unwrap_err();
        assert!(matches!(err, Error::Metric(_)));
        assert_eq!(metric.name(), "broken");
    }

    #[test]
    fn test_boxed_metric() {
        let metric: Box<dyn Metric> = Box::new(ExactMatch);
        assert_eq!(metric.name(), "exact_match");
        let pred = Prediction::new().field("answer", "4");
        assert!(metric.evaluate(&example(), &pred).unwrap().passed);
    }
}
