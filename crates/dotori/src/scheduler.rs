// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Trial selection strategies.
//!
//! Three strategies sit behind one [`SelectNext`] trait and one closed enum,
//! [`TrialScheduler`], built from the configured [`StrategyKind`]:
//!
//! - **Greedy**: try every candidate once, then exploit the best score.
//! - **Adaptive**: temperature-annealed softmax with an exploration bonus.
//! - **Bayesian**: GP surrogate with a UCB acquisition. Falls back to
//!   Adaptive when there is too little data or the surrogate fails.

use crate::candidate::CandidateConfiguration;
use crate::config::{OptimizerConfig, StrategyKind, SurrogateConfig};
use crate::state::OptimizationState;
use crate::surrogate::{FeatureEncoder, GaussianProcess, SurrogateError, FEATURE_DIM};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Below this temperature the adaptive policy picks the argmax.
const MIN_SAMPLING_TEMPERATURE: f64 = 0.01;

/// Scored candidates needed before the surrogate is fitted.
pub const MIN_BAYESIAN_OBSERVATIONS: usize = 3;

/// Why the Bayesian policy handed a selection to the adaptive one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Fewer than [`MIN_BAYESIAN_OBSERVATIONS`] distinct scored candidates.
    InsufficientObservations {
        /// Distinct scored candidates at selection time
        scored: usize,
    },
    /// Fit or predict failed.
    Surrogate(String),
}

/// A scheduler's choice.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Index into the candidate slice
    pub index: usize,
    /// Policy that actually made the choice
    pub policy: StrategyKind,
    /// Set when the configured policy delegated
    pub fallback: Option<FallbackReason>,
}

impl Selection {
    #[inline]
    fn direct(index: usize, policy: StrategyKind) -> Self {
        Self {
            index,
            policy,
            fallback: None,
        }
    }
}

/// Chooses the next candidate to evaluate.
pub trait SelectNext {
    /// Pick a candidate for trial `trial_index`. `None` only for an empty
    /// pool.
    fn select_next(
        &mut self,
        candidates: &[CandidateConfiguration],
        state: &mut OptimizationState,
        trial_index: usize,
    ) -> Option<Selection>;
}

/// First maximum, ignoring `None` and NaN.
fn argmax(values: impl IntoIterator<Item = Option<f64>>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if let Some(v) = v.filter(|v| !v.is_nan()) {
            if best.map_or(true, |(_, b)| v > b) {
                best = Some((i, v));
            }
        }
    }
    best.map(|(i, _)| i)
}

/// Explore every candidate once in generation order, then exploit.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyScheduler;

impl SelectNext for GreedyScheduler {
    fn select_next(
        &mut self,
        candidates: &[CandidateConfiguration],
        state: &mut OptimizationState,
        _trial_index: usize,
    ) -> Option<Selection> {
        if candidates.is_empty() {
            return None;
        }

        let unexplored = candidates
            .iter()
            .position(|c| state.exploration_count(&c.config_id) == 0);
        let index = unexplored
            .or_else(|| argmax(candidates.iter().map(|c| state.score(&c.config_id))))
            .or_else(|| {
                // Everything explored, nothing scored: every trial failed.
                candidates
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, c)| state.exploration_count(&c.config_id))
                    .map(|(i, _)| i)
            })?;

        Some(Selection::direct(index, StrategyKind::Greedy))
    }
}

/// Softmax over `score + T / (explorations + 1)` with an annealed `T`.
#[derive(Debug, Clone)]
pub struct AdaptiveScheduler {
    init_temperature: f64,
    final_temperature: f64,
    num_trials: usize,
    rng: Xoshiro256PlusPlus,
}

impl AdaptiveScheduler {
    /// Create a seeded scheduler.
    pub fn new(
        init_temperature: f64,
        final_temperature: f64,
        num_trials: usize,
        seed: u64,
    ) -> Self {
        Self {
            init_temperature,
            final_temperature,
            num_trials: num_trials.max(1),
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// Linearly annealed temperature for a trial.
    pub fn temperature_at(&self, trial_index: usize) -> f64 {
        let p = (trial_index as f64 / self.num_trials as f64).min(1.0);
        self.init_temperature * (1.0 - p) + self.final_temperature * p
    }
}

impl SelectNext for AdaptiveScheduler {
    fn select_next(
        &mut self,
        candidates: &[CandidateConfiguration],
        state: &mut OptimizationState,
        trial_index: usize,
    ) -> Option<Selection> {
        if candidates.is_empty() {
            return None;
        }

        let t = self.temperature_at(trial_index);
        state.set_temperature(t);

        let values: Vec<f64> = candidates
            .iter()
            .map(|c| {
                let observed = state.score(&c.config_id).unwrap_or(0.0);
                let bonus = t / (state.exploration_count(&c.config_id) + 1) as f64;
                observed + bonus
            })
            .collect();

        let greedy = argmax(values.iter().copied().map(Some))?;
        if t <= MIN_SAMPLING_TEMPERATURE {
            return Some(Selection::direct(greedy, StrategyKind::Adaptive));
        }

        // Shift by the max so the largest weight is exactly 1.
        let vmax = values[greedy];
        let weights: Vec<f64> = values.iter().map(|v| ((v - vmax) / t).exp()).collect();
        let total: f64 = weights.iter().sum();
        let draw = self.rng.gen::<f64>() * total;

        let mut cumulative = 0.0;
        let mut index = candidates.len() - 1;
        for (i, w) in weights.iter().enumerate() {
            cumulative += w;
            if draw < cumulative {
                index = i;
                break;
            }
        }

        Some(Selection::direct(index, StrategyKind::Adaptive))
    }
}

/// GP surrogate with an upper-confidence-bound acquisition.
#[derive(Debug, Clone)]
pub struct BayesianScheduler {
    surrogate: SurrogateConfig,
    fallback: AdaptiveScheduler,
}

impl BayesianScheduler {
    /// Create a scheduler that delegates to `fallback` when it cannot fit.
    pub fn new(surrogate: SurrogateConfig, fallback: AdaptiveScheduler) -> Self {
        Self {
            surrogate,
            fallback,
        }
    }

    /// Exploration weight for a trial.
    #[inline]
    pub fn kappa(trial_index: usize) -> f64 {
        2.0 * ((trial_index as f64 + 1.0).ln()).sqrt()
    }

    fn delegate(
        &mut self,
        candidates: &[CandidateConfiguration],
        state: &mut OptimizationState,
        trial_index: usize,
        reason: FallbackReason,
    ) -> Option<Selection> {
        let mut selection = self.fallback.select_next(candidates, state, trial_index)?;
        selection.fallback = Some(reason);
        Some(selection)
    }

    fn acquire(
        &self,
        candidates: &[CandidateConfiguration],
        state: &OptimizationState,
        trial_index: usize,
    ) -> Result<Option<usize>, SurrogateError> {
        let encoder = FeatureEncoder::for_candidates(candidates);
        let mut x = Vec::with_capacity(state.scored_count() * FEATURE_DIM);
        let mut y = Vec::with_capacity(state.scored_count());
        for c in candidates {
            if let Some(score) = state.score(&c.config_id) {
                x.extend_from_slice(&encoder.encode(c));
                y.push(score);
            }
        }

        let mut gp = GaussianProcess::new(self.surrogate);
        gp.fit(&x, &y, FEATURE_DIM)?;
        let (mean, std) = gp.predict(&encoder.encode_all(candidates))?;

        let kappa = Self::kappa(trial_index);
        let ucb = mean.iter().zip(&std).map(|(m, s)| Some(m + kappa * s));
        Ok(argmax(ucb))
    }
}

impl SelectNext for BayesianScheduler {
    fn select_next(
        &mut self,
        candidates: &[CandidateConfiguration],
        state: &mut OptimizationState,
        trial_index: usize,
    ) -> Option<Selection> {
        if candidates.is_empty() {
            return None;
        }

        let scored = state.scored_count();
        if scored < MIN_BAYESIAN_OBSERVATIONS {
            debug!(scored, "too few observations for surrogate, using adaptive");
            return self.delegate(
                candidates,
                state,
                trial_index,
                FallbackReason::InsufficientObservations { scored },
            );
        }

        match self.acquire(candidates, state, trial_index) {
            Ok(Some(index)) => Some(Selection::direct(index, StrategyKind::Bayesian)),
            Ok(None) => self.delegate(
                candidates,
                state,
                trial_index,
                FallbackReason::Surrogate("empty acquisition".to_string()),
            ),
            Err(e) => {
                warn!(error = %e, trial = trial_index, "surrogate failed, falling back to adaptive");
                self.delegate(
                    candidates,
                    state,
                    trial_index,
                    FallbackReason::Surrogate(e.to_string()),
                )
            }
        }
    }
}

/// The configured selection strategy.
#[derive(Debug, Clone)]
pub enum TrialScheduler {
    /// See [`GreedyScheduler`]
    Greedy(GreedyScheduler),
    /// See [`AdaptiveScheduler`]
    Adaptive(AdaptiveScheduler),
    /// See [`BayesianScheduler`]
    Bayesian(BayesianScheduler),
}

impl TrialScheduler {
    /// Build a scheduler of the given kind from the rest of the config.
    pub fn for_kind(kind: StrategyKind, config: &OptimizerConfig) -> Self {
        let adaptive = AdaptiveScheduler::new(
            config.init_temperature,
            config.final_temperature,
            config.num_trials as usize,
            config.seed,
        );
        match kind {
            StrategyKind::Greedy => Self::Greedy(GreedyScheduler),
            StrategyKind::Adaptive => Self::Adaptive(adaptive),
            StrategyKind::Bayesian => {
                Self::Bayesian(BayesianScheduler::new(config.surrogate, adaptive))
            }
        }
    }

    /// Build the scheduler named by `config.strategy`.
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::for_kind(config.strategy, config)
    }

    /// Configured kind.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Greedy(_) => StrategyKind::Greedy,
            Self::Adaptive(_) => StrategyKind::Adaptive,
            Self::Bayesian(_) => StrategyKind::Bayesian,
        }
    }
}

impl SelectNext for TrialScheduler {
    fn select_next(
        &mut self,
        candidates: &[CandidateConfiguration],
        state: &mut OptimizationState,
        trial_index: usize,
    ) -> Option<Selection> {
        match self {
            Self::Greedy(s) => s.select_next(candidates, state, trial_index),
            Self::Adaptive(s) => s.select_next(candidates, state, trial_index),
            Self::Bayesian(s) => s.select_next(candidates, state, trial_index),
        }
    }
}
