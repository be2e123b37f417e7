// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Score reports and prediction collection

use dotori::{Example, MetricResult, Prediction, Program};

/// Score of one example.
#[derive(Debug, Clone)]
pub struct ExampleScore {
    /// Example id
    pub example_id: String,

    /// Metric output
    pub result: MetricResult,
}

/// Aggregate scores over a dataset
#[derive(Debug, Clone)]
pub struct ScoreReport {
    /// Mean score across all examples
    pub score: f64,

    /// Individual results, in input order
    pub results: Vec<ExampleScore>,

    /// Number of passed examples
    pub passed: usize,

    /// Total examples
    pub total: usize,
}

impl ScoreReport {
    /// Calculate accuracy (passed / total)
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }

    /// Lowest-scoring examples first, at most `n`.
    pub fn worst(&self, n: usize) -> Vec<&ExampleScore> {
        let mut sorted: Vec<&ExampleScore> = self.results.iter().collect();
        sorted.sort_by(|a, b| a.result.score.total_cmp(&b.result.score));
        sorted.truncate(n);
        sorted
    }
}

/// Run `program` over every example in order and keep the predictions.
///
/// Unlike the optimizer's evaluator this stops at the first failing example,
/// since the predictions are meant to be scored one-to-one afterwards.
pub async fn collect_predictions<P: Program>(
    program: &P,
    examples: &[Example],
) -> anyhow::Result<Vec<Prediction>> {
    let mut predictions = Vec::with_capacity(examples.len());
    for example in examples {
        let prediction = program
            .run(&example.inputs)
            .await
            .map_err(|e| anyhow::anyhow!("example {}: {e}", example.id))?;
        predictions.push(prediction);
    }
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(scores: &[f64]) -> ScoreReport {
        let results: Vec<ExampleScore> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| ExampleScore {
                example_id: i.to_string(),
                result: MetricResult::new(*s),
            })
            .collect();
        ScoreReport {
            score: scores.iter().sum::<f64>() / scores.len().max(1) as f64,
            passed: results.iter().filter(|r| r.result.passed).count(),
            total: results.len(),
            results,
        }
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(report(&[1.0, 0.0, 0.5, 0.0]).accuracy(), 0.5);
        assert_eq!(report(&[]).accuracy(), 0.0);
    }

    #[test]
    fn test_worst() {
        let r = report(&[0.9, 0.1, 0.5]);
        let ids: Vec<&str> = r.worst(2).iter().map(|s| s.example_id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
    }
}
