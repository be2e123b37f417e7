// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Optimizer configuration and named presets
//!
//! Every knob lives in an explicit [`OptimizerConfig`] handed to the engine
//! at construction. [`Preset`] returns fully populated configurations; there
//! is no shared mutable default.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which trial-selection strategy the scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Explore everything once, then exploit the best observed score.
    Greedy,
    /// Temperature-annealed softmax with an exploration bonus.
    Adaptive,
    /// Gaussian-process surrogate with an upper-confidence-bound acquisition.
    Bayesian,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Greedy => "greedy",
            Self::Adaptive => "adaptive",
            Self::Bayesian => "bayesian",
        })
    }
}

/// Demonstration mining settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinerConfig {
    /// Upper bound on bootstrapped demonstrations per set
    pub max_bootstrapped_demos: u8,
    /// Upper bound on raw labeled demonstrations per set
    pub max_labeled_demos: u8,
    /// Lower bound of the random demo count used by shuffled sets
    pub min_samples: u8,
    /// Sample labeled demonstrations with replacement
    pub labeled_with_replacement: bool,
    /// Prepend raw labeled demonstrations to bootstrapped sets
    pub include_labeled: bool,
    /// Stop a mining pass once more than this many examples have failed
    pub max_errors: u16,
    /// Minimum metric score for a bootstrapped prediction to be kept
    pub metric_threshold: f64,
    /// Base seed for sampling and shuffling
    pub seed: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MinerConfig {
    /// Create a new configuration.
    pub const fn new() -> Self {
        Self {
            max_bootstrapped_demos: 4,
            max_labeled_demos: 4,
            min_samples: 1,
            labeled_with_replacement: false,
            include_labeled: false,
            max_errors: 10,
            metric_threshold: 0.0,
            seed: 9,
        }
    }

    /// Set max bootstrapped demonstrations.
    pub const fn with_max_bootstrapped_demos(mut self, n: u8) -> Self {
        self.max_bootstrapped_demos = n;
        self
    }

    /// Set max labeled demonstrations.
    pub const fn with_max_labeled_demos(mut self, n: u8) -> Self {
        self.max_labeled_demos = n;
        self
    }

    /// Set the minimum shuffled-set size.
    pub const fn with_min_samples(mut self, n: u8) -> Self {
        self.min_samples = n;
        self
    }

    /// Sample labeled demonstrations with replacement.
    pub const fn with_replacement(mut self, yes: bool) -> Self {
        self.labeled_with_replacement = yes;
        self
    }

    /// Prepend labeled demonstrations to bootstrapped sets.
    pub const fn with_labeled_prefix(mut self, yes: bool) -> Self {
        self.include_labeled = yes;
        self
    }

    /// Set the error budget.
    pub const fn with_max_errors(mut self, n: u16) -> Self {
        self.max_errors = n;
        self
    }

    /// Set the metric threshold.
    pub const fn with_metric_threshold(mut self, threshold: f64) -> Self {
        self.metric_threshold = threshold;
        self
    }

    /// Set seed.
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Fixed Gaussian-process hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurrogateConfig {
    /// RBF length scale
    pub length_scale: f64,
    /// Kernel amplitude
    pub signal_variance: f64,
    /// Observation noise added to the diagonal
    pub noise_variance: f64,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SurrogateConfig {
    /// Create the default hyperparameters.
    pub const fn new() -> Self {
        Self {
            length_scale: 1.0,
            signal_variance: 1.0,
            noise_variance: 1e-3,
        }
    }
}

/// Named configuration sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Small budget, quick feedback
    Light,
    /// Balanced default
    Medium,
    /// Large budget
    Heavy,
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "medium" => Ok(Self::Medium),
            "heavy" => Ok(Self::Heavy),
            other => Err(Error::config(format!(
                "unknown preset '{other}' (expected light, medium or heavy)"
            ))),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Heavy => "heavy",
        })
    }
}

/// Configuration for one optimizer instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Trial budget
    pub num_trials: u16,
    /// Instructions requested from the proposer
    pub num_instruction_candidates: u8,
    /// Demonstration sets to mine (including the three fixed ones)
    pub num_demo_sets: u8,
    /// How many top instructions and demo sets are crossed into combined candidates
    pub top_k: u8,
    /// Selection strategy
    pub strategy: StrategyKind,
    /// Adaptive temperature at the first trial
    pub init_temperature: f64,
    /// Adaptive temperature at the last trial
    pub final_temperature: f64,
    /// Trials without improvement before stopping early
    pub patience: u16,
    /// Fail fast when no validation set is given
    pub require_valset: bool,
    /// Failed examples tolerated within one trial evaluation
    pub max_eval_errors: u16,
    /// Seed for the scheduler's sampling
    pub seed: u64,
    /// Demonstration mining
    pub miner: MinerConfig,
    /// Surrogate hyperparameters
    pub surrogate: SurrogateConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerConfig {
    /// The medium preset.
    pub const fn new() -> Self {
        Self {
            num_trials: 25,
            num_instruction_candidates: 12,
            num_demo_sets: 12,
            top_k: 3,
            strategy: StrategyKind::Bayesian,
            init_temperature: 1.0,
            final_temperature: 0.1,
            patience: 6,
            require_valset: false,
            max_eval_errors: 10,
            seed: 42,
            miner: MinerConfig::new(),
            surrogate: SurrogateConfig::new(),
        }
    }

    /// Fully populated configuration for a named size.
    pub const fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Light => Self::new()
                .with_num_trials(10)
                .with_num_instruction_candidates(6)
                .with_num_demo_sets(6)
                .with_patience(4)
                .with_strategy(StrategyKind::Adaptive),
            Preset::Medium => Self::new(),
            Preset::Heavy => Self::new()
                .with_num_trials(50)
                .with_num_instruction_candidates(18)
                .with_num_demo_sets(18)
                .with_patience(10),
        }
    }

    /// Set the trial budget.
    pub const fn with_num_trials(mut self, n: u16) -> Self {
        self.num_trials = n;
        self
    }

    /// Set how many instructions to request.
    pub const fn with_num_instruction_candidates(mut self, n: u8) -> Self {
        self.num_instruction_candidates = n;
        self
    }

    /// Set how many demonstration sets to mine.
    pub const fn with_num_demo_sets(mut self, n: u8) -> Self {
        self.num_demo_sets = n;
        self
    }

    /// Set the combined-candidate cutoff.
    pub const fn with_top_k(mut self, k: u8) -> Self {
        self.top_k = k;
        self
    }

    /// Set the selection strategy.
    pub const fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the adaptive temperature schedule.
    pub const fn with_temperatures(mut self, init: f64, last: f64) -> Self {
        self.init_temperature = init;
        self.final_temperature = last;
        self
    }

    /// Set early-stopping patience.
    pub const fn with_patience(mut self, n: u16) -> Self {
        self.patience = n;
        self
    }

    /// Require an explicit validation set.
    pub const fn with_require_valset(mut self, yes: bool) -> Self {
        self.require_valset = yes;
        self
    }

    /// Set the per-trial example error budget.
    pub const fn with_max_eval_errors(mut self, n: u16) -> Self {
        self.max_eval_errors = n;
        self
    }

    /// Set the scheduler seed.
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the mining settings.
    pub const fn with_miner(mut self, miner: MinerConfig) -> Self {
        self.miner = miner;
        self
    }

    /// Replace the surrogate hyperparameters.
    pub const fn with_surrogate(mut self, surrogate: SurrogateConfig) -> Self {
        self.surrogate = surrogate;
        self
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.num_trials == 0 {
            return Err(Error::config("num_trials must be at least 1"));
        }
        if self.num_demo_sets == 0 {
            return Err(Error::config("num_demo_sets must be at least 1"));
        }
        if self.top_k == 0 {
            return Err(Error::config("top_k must be at least 1"));
        }
        if self.patience == 0 {
            return Err(Error::config("patience must be at least 1"));
        }
        let temps = [self.init_temperature, self.final_temperature];
        if temps.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(Error::config("temperatures must be finite and non-negative"));
        }
        if self.init_temperature < self.final_temperature {
            return Err(Error::config(
                "init_temperature must not be below final_temperature",
            ));
        }
        if self.miner.min_samples > self.miner.max_bootstrapped_demos {
            return Err(Error::config(
                "min_samples must not exceed max_bootstrapped_demos",
            ));
        }
        if !self.miner.metric_threshold.is_finite() {
            return Err(Error::config("metric_threshold must be finite"));
        }
        let s = &self.surrogate;
        if [s.length_scale, s.signal_variance, s.noise_variance]
            .iter()
            .any(|v| !v.is_finite() || *v <= 0.0)
        {
            return Err(Error::config(
                "surrogate hyperparameters must be finite and positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_is_medium() {
        assert_eq!(OptimizerConfig::default(), OptimizerConfig::preset(Preset::Medium));
        assert!(OptimizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_presets_scale_up() {
        let light = OptimizerConfig::preset(Preset::Light);
        let medium = OptimizerConfig::preset(Preset::Medium);
        let heavy = OptimizerConfig::preset(Preset::Heavy);

        assert!(light.num_trials < medium.num_trials);
        assert!(medium.num_trials < heavy.num_trials);
        assert!(light.num_demo_sets < heavy.num_demo_sets);
        assert_eq!(light.strategy, StrategyKind::Adaptive);
        for cfg in [light, medium, heavy] {
            assert!(cfg.validate().is_ok());
        }
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("light".parse::<Preset>().unwrap(), Preset::Light);
        assert_eq!(" HEAVY ".parse::<Preset>().unwrap(), Preset::Heavy);
        assert!("extreme".parse::<Preset>().is_err());
        assert_eq!(Preset::Medium.to_string(), "medium");
    }

    #[test]
    fn test_config_builder() {
        const CONFIG: OptimizerConfig = OptimizerConfig::new()
            .with_num_trials(5)
            .with_strategy(StrategyKind::Greedy)
            .with_seed(7)
            .with_miner(MinerConfig::new().with_max_bootstrapped_demos(3));

        assert_eq!(CONFIG.num_trials, 5);
        assert_eq!(CONFIG.strategy, StrategyKind::Greedy);
        assert_eq!(CONFIG.seed, 7);
        assert_eq!(CONFIG.miner.max_bootstrapped_demos, 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(OptimizerConfig::new().with_num_trials(0).validate().is_err());
        assert!(OptimizerConfig::new().with_num_demo_sets(0).validate().is_err());
        assert!(OptimizerConfig::new().with_patience(0).validate().is_err());
        assert!(OptimizerConfig::new()
            .with_temperatures(0.1, 1.0)
            .validate()
            .is_err());
        assert!(OptimizerConfig::new()
            .with_miner(MinerConfig::new().with_min_samples(9))
            .validate()
            .is_err());

        let mut cfg = OptimizerConfig::new();
        cfg.surrogate.noise_variance = 0.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_config_serde() {
        let cfg = OptimizerConfig::preset(Preset::Light);
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"strategy\":\"adaptive\""));
        let back: OptimizerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
