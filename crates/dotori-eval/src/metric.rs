// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Token-overlap metrics
//!
//! Every metric here implements [`dotori::Metric`], so it can drive an
//! optimization run directly. Scores are averaged over the example's expected
//! output fields; a field the prediction lacks scores zero.

use dotori::{Example, Metric, MetricResult, Prediction, Result};
use rayon::prelude::*;
use std::collections::HashSet;

/// Mean of `score` over the expected output fields.
fn mean_over_fields(
    example: &Example,
    prediction: &Prediction,
    score: impl Fn(&str, &str) -> f64,
) -> MetricResult {
    if example.outputs.is_empty() {
        return MetricResult::fail().with_details("No expected outputs in example");
    }
    let total: f64 = example
        .outputs
        .iter()
        .map(|(key, expected)| prediction.get(key).map_or(0.0, |got| score(got, expected)))
        .sum();
    MetricResult::new(total / example.outputs.len() as f64)
}

/// Harmonic mean of set precision and recall.
fn set_f1<T: Eq + std::hash::Hash>(pred: &HashSet<T>, gold: &HashSet<T>) -> f64 {
    if pred.is_empty() || gold.is_empty() {
        return 0.0;
    }
    let intersection = pred.intersection(gold).count();
    if intersection == 0 {
        return 0.0;
    }
    let precision = intersection as f64 / pred.len() as f64;
    let recall = intersection as f64 / gold.len() as f64;
    2.0 * (precision * recall) / (precision + recall)
}

/// Whitespace-token F1.
#[derive(Debug, Clone, Copy, Default)]
pub struct F1Score;

impl F1Score {
    fn tokens(s: &str) -> HashSet<&str> {
        s.split_whitespace().collect()
    }

    /// F1 between two strings.
    pub fn score(prediction: &str, gold: &str) -> f64 {
        set_f1(&Self::tokens(prediction), &Self::tokens(gold))
    }
}

impl Metric for F1Score {
    fn evaluate(&self, example: &Example, prediction: &Prediction) -> Result<MetricResult> {
        Ok(mean_over_fields(example, prediction, Self::score))
    }

    fn name(&self) -> &str {
        "f1_score"
    }
}

/// Default English stop words for semantic comparison.
const DEFAULT_STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "shall", "can", "it", "its",
    "this", "that", "these", "those", "i", "you", "he", "she", "we", "they", "me", "him", "her",
    "us", "them", "my", "your", "his", "our", "their", "what", "which", "who", "whom", "whose",
    "when", "where", "why", "how", "all", "each", "every", "both", "few", "more", "most", "other",
    "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "just",
    "also", "now", "here",
];

/// F1 over content words.
///
/// Splits on whitespace and ASCII punctuation, lowercases, and drops stop
/// words before comparing. Two answers that are both empty after filtering
/// count as a perfect match.
#[derive(Debug, Clone)]
pub struct SemanticF1 {
    stop_words: HashSet<&'static str>,
    normalize: bool,
}

impl Default for SemanticF1 {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticF1 {
    /// Create with the default stop words.
    pub fn new() -> Self {
        Self {
            stop_words: DEFAULT_STOP_WORDS.iter().copied().collect(),
            normalize: true,
        }
    }

    /// Create without stop words.
    pub fn without_stop_words() -> Self {
        Self {
            stop_words: HashSet::new(),
            normalize: true,
        }
    }

    /// Create with custom stop words.
    pub fn with_stop_words(stop_words: &'static [&'static str]) -> Self {
        Self {
            stop_words: stop_words.iter().copied().collect(),
            normalize: true,
        }
    }

    /// Set lowercasing.
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    fn tokens(&self, s: &str) -> HashSet<String> {
        s.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|t| !t.is_empty())
            .map(|t| {
                if self.normalize {
                    t.to_lowercase()
                } else {
                    t.to_string()
                }
            })
            .filter(|t| !self.stop_words.contains(t.as_str()))
            .collect()
    }

    /// F1 between two strings.
    pub fn score(&self, prediction: &str, gold: &str) -> f64 {
        let pred = self.tokens(prediction);
        let gold = self.tokens(gold);
        if pred.is_empty() && gold.is_empty() {
            return 1.0;
        }
        set_f1(&pred, &gold)
    }

    /// Evaluate a batch in parallel using Rayon.
    pub fn evaluate_batch(
        &self,
        examples: &[Example],
        predictions: &[Prediction],
    ) -> Vec<MetricResult> {
        examples
            .par_iter()
            .zip(predictions.par_iter())
            .map(|(example, prediction)| {
                mean_over_fields(example, prediction, |got, expected| {
                    self.score(got, expected)
                })
            })
            .collect()
    }
}

impl Metric for SemanticF1 {
    fn evaluate(&self, example: &Example, prediction: &Prediction) -> Result<MetricResult> {
        Ok(mean_over_fields(example, prediction, |got, expected| {
            self.score(got, expected)
        }))
    }

    fn name(&self) -> &str {
        "semantic_f1"
    }
}

/// Passes when each predicted field contains the expected text.
#[derive(Debug, Clone, Copy)]
pub struct ContainsAnswer {
    case_sensitive: bool,
}

impl Default for ContainsAnswer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainsAnswer {
    /// Case-insensitive containment.
    pub const fn new() -> Self {
        Self {
            case_sensitive: false,
        }
    }

    /// Set case sensitivity.
    pub const fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    fn contains(&self, got: &str, expected: &str) -> bool {
        let expected = expected.trim();
        if expected.is_empty() {
            return true;
        }
        if self.case_sensitive {
            got.contains(expected)
        } else {
            got.to_lowercase().contains(&expected.to_lowercase())
        }
    }
}

impl Metric for ContainsAnswer {
    fn evaluate(&self, example: &Example, prediction: &Prediction) -> Result<MetricResult> {
        let result = mean_over_fields(example, prediction, |got, expected| {
            if self.contains(got, expected) {
                1.0
            } else {
                0.0
            }
        });
        // Containment is all-or-nothing across fields.
        Ok(MetricResult::from(result.score >= 1.0))
    }

    fn name(&self) -> &str {
        "contains_answer"
    }
}

/// Several metrics applied to the same batch.
#[derive(Default)]
pub struct MetricPanel {
    metrics: Vec<Box<dyn Metric>>,
}

impl MetricPanel {
    /// Create an empty panel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a metric.
    pub fn add<M: Metric + 'static>(mut self, metric: M) -> Self {
        self.metrics.push(Box::new(metric));
        self
    }

    /// Metric names, in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name()).collect()
    }

    /// Every metric on every pair, per example.
    pub fn evaluate_batch(
        &self,
        examples: &[Example],
        predictions: &[Prediction],
    ) -> Result<Vec<Vec<(String, MetricResult)>>> {
        examples
            .par_iter()
            .zip(predictions.par_iter())
            .map(|(example, prediction)| {
                self.metrics
                    .iter()
                    .map(|m| {
                        m.evaluate(example, prediction)
                            .map(|r| (m.name().to_string(), r))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    /// Mean score per metric.
    pub fn aggregate_scores(
        &self,
        examples: &[Example],
        predictions: &[Prediction],
    ) -> Result<Vec<(String, f64)>> {
        self.metrics
            .iter()
            .map(|metric| -> Result<(String, f64)> {
                if examples.is_empty() {
                    return Ok((metric.name().to_string(), 0.0));
                }
                let total = examples
                    .par_iter()
                    .zip(predictions.par_iter())
                    .map(|(ex, pred)| metric.evaluate(ex, pred).map(|r| r.score))
                    .try_reduce(|| 0.0, |a, b| Ok(a + b))?;
                Ok((metric.name().to_string(), total / examples.len() as f64))
            })
            .collect()
    }
}
