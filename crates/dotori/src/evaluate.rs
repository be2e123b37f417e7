// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Trial evaluation over a validation set

use crate::error::{Error, Result};
use crate::example::Example;
use crate::metric::Metric;
use crate::program::Program;
use tracing::debug;

/// Aggregate of one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationOutcome {
    /// Mean metric score over the examples that ran
    pub score: f64,
    /// Examples that ran and were scored
    pub evaluated: usize,
    /// Examples that passed the metric
    pub passed: usize,
    /// Examples whose program run failed
    pub errors: usize,
}

impl EvaluationOutcome {
    /// Share of scored examples that passed.
    pub fn pass_rate(&self) -> f64 {
        if self.evaluated == 0 {
            0.0
        } else {
            self.passed as f64 / self.evaluated as f64
        }
    }
}

/// Scores a configured program on a set of examples.
///
/// Individual program failures are skipped and counted. The pass as a whole
/// fails when the failures exceed the budget, when nothing could be scored,
/// or when the metric errors or returns a non-finite score.
pub struct Evaluator<M> {
    metric: M,
    max_errors: usize,
}

impl<M: Metric> Evaluator<M> {
    /// Create an evaluator with an error budget.
    pub fn new(metric: M, max_errors: usize) -> Self {
        Self { metric, max_errors }
    }

    /// Evaluate `program` on every example in order.
    pub async fn evaluate<P: Program>(
        &self,
        program: &P,
        examples: &[Example],
    ) -> Result<EvaluationOutcome> {
        if examples.is_empty() {
            return Err(Error::EmptyValset);
        }

        let mut total = 0.0;
        let mut evaluated = 0;
        let mut passed = 0;
        let mut errors = 0;

        for example in examples {
            let prediction = match program.run(&example.inputs).await {
                Ok(p) => p,
                Err(e) => {
                    errors += 1;
                    debug!(example = %example.id, error = %e, "example failed");
                    if errors > self.max_errors {
                        return Err(Error::TooManyErrors {
                            errors,
                            limit: self.max_errors,
                        });
                    }
                    continue;
                }
            };

            let result = self.metric.evaluate(example, &prediction)?;
            if !result.score.is_finite() {
                return Err(Error::metric(format!(
                    "{} returned non-finite score {} on example {}",
                    self.metric.name(),
                    result.score,
                    example.id
                )));
            }
            total += result.score;
            evaluated += 1;
            if result.passed {
                passed += 1;
            }
        }

        if evaluated == 0 {
            return Err(Error::program(format!(
                "all {} examples failed",
                examples.len()
            )));
        }

        Ok(EvaluationOutcome {
            score: total / evaluated as f64,
            evaluated,
            passed,
            errors,
        })
    }
}
