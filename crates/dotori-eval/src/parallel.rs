// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Parallel scoring using Rayon

use crate::evaluator::{ExampleScore, ScoreReport};
use dotori::{Example, Metric, Prediction};
use rayon::prelude::*;
use std::sync::Arc;

/// Scores precomputed predictions on a Rayon pool.
///
/// Scoring is CPU-bound, so it runs outside any async runtime. Results keep
/// the input order.
pub struct ParallelScorer {
    metric: Arc<dyn Metric>,
    num_threads: Option<usize>,
}

impl ParallelScorer {
    /// Create a new parallel scorer
    pub fn new(metric: Arc<dyn Metric>) -> Self {
        Self {
            metric,
            num_threads: None,
        }
    }

    /// Set number of threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Metric name.
    pub fn metric_name(&self) -> &str {
        self.metric.name()
    }

    /// Score `predictions[i]` against `examples[i]`.
    pub fn score(
        &self,
        examples: &[Example],
        predictions: &[Prediction],
    ) -> anyhow::Result<ScoreReport> {
        if examples.len() != predictions.len() {
            anyhow::bail!(
                "Examples and predictions length mismatch: {} vs {}",
                examples.len(),
                predictions.len()
            );
        }

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(threads) = self.num_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        let results: Vec<ExampleScore> = pool.install(|| {
            examples
                .par_iter()
                .zip(predictions.par_iter())
                .map(|(example, prediction)| {
                    let result = self.metric.evaluate(example, prediction).map_err(|e| {
                        anyhow::anyhow!("{} failed on {}: {e}", self.metric.name(), example.id)
                    })?;
                    Ok(ExampleScore {
                        example_id: example.id.clone(),
                        result,
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()
        })?;

        let total_score: f64 = results.iter().map(|r| r.result.score).sum();
        let passed = results.iter().filter(|r| r.result.passed).count();
        let score = if results.is_empty() {
            0.0
        } else {
            total_score / results.len() as f64
        };

        Ok(ScoreReport {
            score,
            passed,
            total: results.len(),
            results,
        })
    }
}
