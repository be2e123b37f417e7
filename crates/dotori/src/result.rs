// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Optimization results and run statistics

use crate::bootstrap::MiningStats;
use crate::candidate::{CandidateConfiguration, CandidateCounts};
use crate::error::Result;
use crate::state::{TrialFailure, TrialRecord};
use serde::{Deserialize, Serialize};

/// Everything that happened during the trial loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialHistory {
    /// Successful trials in order
    pub trials: Vec<TrialRecord>,
    /// Failed trials in order
    pub failures: Vec<TrialFailure>,
    /// Score of every successful trial
    pub score_history: Vec<f64>,
    /// Running best after every successful trial
    pub best_score_history: Vec<f64>,
    /// Whether patience ran out before the budget
    pub early_stopped: bool,
    /// Trials run, failures included
    pub trials_run: usize,
    /// Share of trials that tried a new demonstration count
    pub diversity: f64,
    /// Times the Bayesian policy delegated to the adaptive one
    pub bayesian_fallbacks: usize,
}

/// Statistics from the phases before the trial loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Mining counters summed over all demo sets
    pub bootstrap: MiningStats,
    /// Share of attempted examples that became demonstrations
    pub bootstrap_success_rate: f64,
    /// Size of each mined demo set, in mining order
    pub demo_set_sizes: Vec<usize>,
    /// Instructions left after sanitizing the proposer's output
    pub instructions_proposed: usize,
    /// Candidates by kind
    pub candidates: CandidateCounts,
}

/// Output of [`OptimizationEngine::compile`](crate::engine::OptimizationEngine::compile).
#[derive(Debug, Clone)]
pub struct OptimizationResult<P> {
    /// The best candidate applied to the template, or the template itself
    /// when no trial succeeded
    pub optimized_program: P,
    /// Winning candidate, if any trial succeeded
    pub best_candidate: Option<CandidateConfiguration>,
    /// Winning score; 0.0 when no trial succeeded
    pub best_score: f64,
    /// Trial log
    pub history: TrialHistory,
    /// Pre-trial statistics
    pub stats: GenerationStats,
}

#[derive(Serialize)]
struct ResultRecord<'a> {
    best_score: f64,
    best_candidate: Option<&'a CandidateConfiguration>,
    history: &'a TrialHistory,
    stats: &'a GenerationStats,
}

impl<P> OptimizationResult<P> {
    /// Whether any trial succeeded.
    #[inline]
    pub fn found_candidate(&self) -> bool {
        self.best_candidate.is_some()
    }

    /// Serialize everything except the program.
    pub fn to_json(&self) -> Result<String> {
        let record = ResultRecord {
            best_score: self.best_score,
            best_candidate: self.best_candidate.as_ref(),
            history: &self.history,
            stats: &self.stats,
        };
        Ok(serde_json::to_string_pretty(&record)?)
    }

    /// Swap the program, keeping the statistics.
    pub fn map_program<Q>(self, f: impl FnOnce(P) -> Q) -> OptimizationResult<Q> {
        OptimizationResult {
            optimized_program: f(self.optimized_program),
            best_candidate: self.best_candidate,
            best_score: self.best_score,
            history: self.history,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateGenerator;

    #[test]
    fn test_to_json_skips_program() {
        let candidates = CandidateGenerator::default().generate(&["Be brief.".to_string()], &[]);
        let result = OptimizationResult {
            optimized_program: "not serializable anyway",
            best_candidate: Some(candidates[1].clone()),
            best_score: 0.75,
            history: TrialHistory {
                score_history: vec![0.5, 0.75],
                best_score_history: vec![0.5, 0.75],
                trials_run: 2,
                diversity: 0.5,
                ..TrialHistory::default()
            },
            stats: GenerationStats {
                instructions_proposed: 1,
                candidates: CandidateCounts::tally(&candidates),
                ..GenerationStats::default()
            },
        };

        let json = result.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["best_score"], 0.75);
        assert_eq!(value["best_candidate"]["kind"], "instruction_only");
        assert_eq!(value["history"]["trials_run"], 2);
        assert_eq!(value["stats"]["candidates"]["instruction_only"], 1);
        assert!(value.get("optimized_program").is_none());
        assert!(result.found_candidate());
    }

    #[test]
    fn test_map_program() {
        let result = OptimizationResult {
            optimized_program: 3_u32,
            best_candidate: None,
            best_score: 0.0,
            history: TrialHistory::default(),
            stats: GenerationStats::default(),
        };
        let mapped = result.map_program(|n| n.to_string());
        assert_eq!(mapped.optimized_program, "3");
        assert!(!mapped.found_candidate());
    }
}
