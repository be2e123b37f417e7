// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Per-run optimization state.
//!
//! One [`OptimizationState`] is created for each `compile` call and dropped
//! with it. Scores, exploration counts and the trial log are keyed by
//! [`ConfigId`]; ids that were not generated in this run are rejected.

use crate::candidate::{CandidateConfiguration, ConfigId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One successful trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Zero-based trial index
    pub trial: usize,
    /// Candidate evaluated
    pub config_id: ConfigId,
    /// Observed score
    pub score: f64,
    /// When the trial finished
    pub timestamp: DateTime<Utc>,
}

/// One failed trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialFailure {
    /// Zero-based trial index
    pub trial: usize,
    /// Candidate evaluated
    pub config_id: ConfigId,
    /// Why the evaluation failed
    pub reason: String,
    /// When the trial finished
    pub timestamp: DateTime<Utc>,
}

/// Mutable search state for one run.
#[derive(Debug, Clone)]
pub struct OptimizationState {
    known: HashSet<ConfigId>,
    scores: HashMap<ConfigId, f64>,
    score_samples: HashMap<ConfigId, usize>,
    exploration_counts: HashMap<ConfigId, usize>,
    temperature: f64,
    trials: Vec<TrialRecord>,
    failures: Vec<TrialFailure>,
    score_history: Vec<f64>,
    best_score_history: Vec<f64>,
    no_improvement_count: usize,
    best: Option<(ConfigId, f64)>,
    seen_demo_counts: BTreeSet<usize>,
    diverse_trials: usize,
}

impl OptimizationState {
    /// Create state for a candidate pool.
    pub fn new(candidates: &[CandidateConfiguration], temperature: f64) -> Self {
        Self {
            known: candidates.iter().map(|c| c.config_id).collect(),
            scores: HashMap::with_capacity(candidates.len()),
            score_samples: HashMap::with_capacity(candidates.len()),
            exploration_counts: HashMap::with_capacity(candidates.len()),
            temperature,
            trials: Vec::new(),
            failures: Vec::new(),
            score_history: Vec::new(),
            best_score_history: Vec::new(),
            no_improvement_count: 0,
            best: None,
            seen_demo_counts: BTreeSet::new(),
            diverse_trials: 0,
        }
    }

    fn ensure_known(&self, id: ConfigId) -> Result<()> {
        if self.known.contains(&id) {
            Ok(())
        } else {
            Err(Error::UnknownCandidate(id))
        }
    }

    fn note_trial(&mut self, candidate: &CandidateConfiguration) {
        *self.exploration_counts.entry(candidate.config_id).or_insert(0) += 1;
        if self.seen_demo_counts.insert(candidate.demo_count()) {
            self.diverse_trials += 1;
        }
    }

    /// Record a successful trial. Returns `true` when it set a new best.
    ///
    /// Non-finite scores are rejected and leave the state untouched.
    pub fn record_success(
        &mut self,
        trial: usize,
        candidate: &CandidateConfiguration,
        score: f64,
    ) -> Result<bool> {
        let id = candidate.config_id;
        self.ensure_known(id)?;
        if !score.is_finite() {
            return Err(Error::metric(format!("non-finite score {score}")));
        }
        self.note_trial(candidate);

        let samples = self.score_samples.entry(id).or_insert(0);
        *samples += 1;
        let n = *samples as f64;
        let mean = self.scores.entry(id).or_insert(0.0);
        *mean += (score - *mean) / n;

        self.trials.push(TrialRecord {
            trial,
            config_id: id,
            score,
            timestamp: Utc::now(),
        });
        self.score_history.push(score);

        let improved = self.best.map_or(true, |(_, best)| score > best);
        if improved {
            self.best = Some((id, score));
            self.no_improvement_count = 0;
        } else {
            self.no_improvement_count += 1;
        }
        let best = self.best.map_or(score, |(_, b)| b);
        self.best_score_history.push(best);

        Ok(improved)
    }

    /// Record a failed trial. The candidate counts as explored but gets no
    /// score.
    pub fn record_failure(
        &mut self,
        trial: usize,
        candidate: &CandidateConfiguration,
        reason: impl Into<String>,
    ) -> Result<()> {
        self.ensure_known(candidate.config_id)?;
        self.note_trial(candidate);
        self.failures.push(TrialFailure {
            trial,
            config_id: candidate.config_id,
            reason: reason.into(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Mean observed score.
    #[inline]
    pub fn score(&self, id: &ConfigId) -> Option<f64> {
        self.scores.get(id).copied()
    }

    /// Times a candidate was trialed, failures included.
    #[inline]
    pub fn exploration_count(&self, id: &ConfigId) -> usize {
        self.exploration_counts.get(id).copied().unwrap_or(0)
    }

    /// Number of distinct candidates with a score.
    #[inline]
    pub fn scored_count(&self) -> usize {
        self.scores.len()
    }

    /// Current adaptive temperature.
    #[inline]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Update the adaptive temperature.
    #[inline]
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    /// Best candidate and score so far.
    #[inline]
    pub fn best(&self) -> Option<(ConfigId, f64)> {
        self.best
    }

    /// Consecutive successful trials without strict improvement.
    #[inline]
    pub fn no_improvement_count(&self) -> usize {
        self.no_improvement_count
    }

    /// Whether the run should stop after `completed` trials.
    #[inline]
    pub fn should_stop(&self, completed: usize, patience: usize) -> bool {
        completed >= patience && self.no_improvement_count >= patience
    }

    /// Trials run, failures included.
    #[inline]
    pub fn trials_run(&self) -> usize {
        self.trials.len() + self.failures.len()
    }

    /// Fraction of trials whose injected demonstration count had not been
    /// tried before.
    pub fn diversity(&self) -> f64 {
        match self.trials_run() {
            0 => 0.0,
            n => self.diverse_trials as f64 / n as f64,
        }
    }

    /// Successful trials.
    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    /// Failed trials.
    pub fn failures(&self) -> &[TrialFailure] {
        &self.failures
    }

    /// Score of every successful trial, in order.
    pub fn score_history(&self) -> &[f64] {
        &self.score_history
    }

    /// Running maximum of [`Self::score_history`].
    pub fn best_score_history(&self) -> &[f64] {
        &self.best_score_history
    }

    /// Consume into the trial log parts.
    pub(crate) fn into_parts(self) -> StateParts {
        StateParts {
            trials: self.trials,
            failures: self.failures,
            score_history: self.score_history,
            best_score_history: self.best_score_history,
        }
    }
}

/// Owned trial log extracted at the end of a run.
pub(crate) struct StateParts {
    pub trials: Vec<TrialRecord>,
    pub failures: Vec<TrialFailure>,
    pub score_history: Vec<f64>,
    pub best_score_history: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateGenerator;
    use crate::example::{Demonstration, Example};

    fn pool() -> Vec<CandidateConfiguration> {
        let demo = Demonstration::labeled(&Example::new("1").input("q", "x").output("a", "y"));
        let sets = vec![vec![demo.clone()], vec![demo.clone(), demo]];
        CandidateGenerator::default().generate(&["Be brief.".to_string()], &sets)
    }

    #[test]
    fn test_running_mean_and_best() {
        let c = pool();
        let mut state = OptimizationState::new(&c, 1.0);

        assert!(state.record_success(0, &c[0], 0.4).unwrap());
        assert!(!state.record_success(1, &c[0], 0.2).unwrap());
        assert!((state.score(&c[0].config_id).unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(state.exploration_count(&c[0].config_id), 2);

        assert!(state.record_success(2, &c[1], 0.9).unwrap());
        assert_eq!(state.best(), Some((c[1].config_id, 0.9)));
        assert_eq!(state.score_history(), &[0.4, 0.2, 0.9]);
        assert_eq!(state.best_score_history(), &[0.4, 0.4, 0.9]);
        assert_eq!(state.scored_count(), 2);
    }

    #[test]
    fn test_no_improvement_counter() {
        let c = pool();
        let mut state = OptimizationState::new(&c, 1.0);

        state.record_success(0, &c[0], 0.5).unwrap();
        state.record_success(1, &c[1], 0.5).unwrap();
        state.record_success(2, &c[2], 0.1).unwrap();
        assert_eq!(state.no_improvement_count(), 2);
        assert!(state.should_stop(3, 2));
        assert!(!state.should_stop(1, 2));

        state.record_failure(3, &c[3], "boom").unwrap();
        assert_eq!(state.no_improvement_count(), 2);

        state.record_success(4, &c[4], 0.6).unwrap();
        assert_eq!(state.no_improvement_count(), 0);
        assert!(!state.should_stop(5, 2));
    }

    #[test]
    fn test_failure_counts_as_exploration() {
        let c = pool();
        let mut state = OptimizationState::new(&c, 1.0);
        state.record_failure(0, &c[2], "too many errors").unwrap();

        assert_eq!(state.exploration_count(&c[2].config_id), 1);
        assert_eq!(state.score(&c[2].config_id), None);
        assert_eq!(state.failures().len(), 1);
        assert_eq!(state.failures()[0].reason, "too many errors");
        assert!(state.best_score_history().is_empty());
        assert_eq!(state.trials_run(), 1);
    }

    #[test]
    fn test_unknown_candidate_rejected() {
        let c = pool();
        let mut state = OptimizationState::new(&c[..2], 1.0);
        let err = state.record_success(0, &c[3], 1.0).unwrap_err();
        assert!(matches!(err, Error::UnknownCandidate(id) if id == c[3].config_id));
        assert!(state.record_failure(0, &c[3], "x").is_err());
        assert_eq!(state.trials_run(), 0);
    }

    #[test]
    fn test_non_finite_score_rejected() {
        let c = pool();
        let mut state = OptimizationState::new(&c, 1.0);
        assert!(state.record_success(0, &c[0], f64::NAN).is_err());
        assert!(state.record_success(0, &c[1], f64::INFINITY).is_err());
        assert_eq!(state.trials_run(), 0);
        assert_eq!(state.exploration_count(&c[0].config_id), 0);
        assert_eq!(state.best(), None);

        assert!(state.record_success(1, &c[2], 0.5).unwrap());
        assert_eq!(state.best_score_history(), &[0.5]);
    }

    #[test]
    fn test_diversity_tracks_demo_counts() {
        let c = pool();
        // c[0] baseline (0 demos), c[1] instruction (0), c[2] one demo, c[3] two demos
        let mut state = OptimizationState::new(&c, 1.0);
        assert_eq!(state.diversity(), 0.0);

        state.record_success(0, &c[0], 0.1).unwrap();
        state.record_success(1, &c[1], 0.1).unwrap();
        state.record_success(2, &c[2], 0.1).unwrap();
        state.record_failure(3, &c[3], "x").unwrap();

        assert!((state.diversity() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_temperature() {
        let mut state = OptimizationState::new(&pool(), 1.0);
        assert_eq!(state.temperature(), 1.0);
        state.set_temperature(0.25);
        assert_eq!(state.temperature(), 0.25);
    }
}
