// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Few-shot demonstration mining
//!
//! Runs the template program over the training set and keeps the predictions
//! the metric accepts as demonstrations. Each demonstration set is produced by
//! one [`BootstrapStrategy`]; [`DemonstrationMiner::create_n_fewshot_demo_sets`]
//! produces the standard mix of zero-shot, labeled, unshuffled and shuffled
//! sets.

use crate::config::MinerConfig;
use crate::example::{Demonstration, Example};
use crate::metric::Metric;
use crate::program::Program;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// How one demonstration set is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapStrategy {
    /// No demonstrations
    ZeroShot,
    /// Raw labeled examples; the program never runs
    LabeledOnly,
    /// Training set in original order
    Unshuffled,
    /// Training set shuffled with a per-set seed, random set size
    Shuffled {
        /// Position of this set among the shuffled ones
        seed: u64,
    },
}

impl BootstrapStrategy {
    /// Map the integer seed convention onto a strategy: `-3` zero-shot,
    /// `-2` labeled only, `-1` unshuffled, anything else shuffled.
    pub const fn from_seed(seed: i64) -> Self {
        match seed {
            -3 => Self::ZeroShot,
            -2 => Self::LabeledOnly,
            -1 => Self::Unshuffled,
            n if n >= 0 => Self::Shuffled { seed: n as u64 },
            // Seeds below -3 have no meaning of their own.
            _ => Self::ZeroShot,
        }
    }

    /// Inverse of [`Self::from_seed`].
    pub const fn seed(&self) -> i64 {
        match self {
            Self::ZeroShot => -3,
            Self::LabeledOnly => -2,
            Self::Unshuffled => -1,
            Self::Shuffled { seed } => *seed as i64,
        }
    }

    /// Whether this strategy runs the program.
    pub const fn runs_program(&self) -> bool {
        matches!(self, Self::Unshuffled | Self::Shuffled { .. })
    }
}

/// Counters for one or more mining passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MiningStats {
    /// Examples the program was run on
    pub attempted: usize,
    /// Predictions that passed the metric
    pub successes: usize,
    /// Examples where the program or metric failed
    pub errors: usize,
    /// Whether a pass stopped early on the error budget
    pub aborted: bool,
}

impl MiningStats {
    /// Accumulate another pass.
    pub fn merge(&mut self, other: &MiningStats) {
        self.attempted += other.attempted;
        self.successes += other.successes;
        self.errors += other.errors;
        self.aborted |= other.aborted;
    }

    /// Successes over attempts, or 0.0 when nothing ran.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempted as f64
        }
    }
}

/// Output of one mining pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MinedDemos {
    /// Strategy that produced the set
    pub strategy: Option<BootstrapStrategy>,
    /// Demonstrations, labeled prefix first
    pub demos: Vec<Demonstration>,
    /// Counters
    pub stats: MiningStats,
}

/// Mines demonstrations with a metric.
pub struct DemonstrationMiner<M> {
    metric: M,
    config: MinerConfig,
}

impl<M: Metric> DemonstrationMiner<M> {
    /// Create a miner.
    pub fn new(metric: M, config: MinerConfig) -> Self {
        Self { metric, config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    fn rng_for(&self, position: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(
            self.config.seed ^ position.wrapping_mul(0x9E37_79B9_7F4A_7C15),
        )
    }

    /// Build one demonstration set.
    pub async fn mine<P: Program>(
        &self,
        program: &P,
        trainset: &[Example],
        strategy: BootstrapStrategy,
    ) -> MinedDemos {
        let position = (strategy.seed() + 3) as u64;
        let mut rng = self.rng_for(position);
        let max_demos = self.config.max_bootstrapped_demos as usize;

        let mined = match strategy {
            BootstrapStrategy::ZeroShot => MinedDemos::default(),
            BootstrapStrategy::LabeledOnly => MinedDemos {
                demos: self.sample_labeled(trainset, &mut rng),
                ..MinedDemos::default()
            },
            BootstrapStrategy::Unshuffled => {
                let order: Vec<&Example> = trainset.iter().collect();
                self.bootstrap(program, &order, max_demos).await
            }
            BootstrapStrategy::Shuffled { .. } => {
                let mut order: Vec<&Example> = trainset.iter().collect();
                order.shuffle(&mut rng);
                let low = (self.config.min_samples as usize).min(max_demos);
                let size = rng.gen_range(low..=max_demos);
                self.bootstrap(program, &order, size).await
            }
        };

        debug!(
            ?strategy,
            demos = mined.demos.len(),
            successes = mined.stats.successes,
            errors = mined.stats.errors,
            "mined demonstration set"
        );
        MinedDemos {
            strategy: Some(strategy),
            ..mined
        }
    }

    /// Produce `num_sets` sets for seeds `-3 .. num_sets - 3`.
    pub async fn create_n_fewshot_demo_sets<P: Program>(
        &self,
        program: &P,
        num_sets: usize,
        trainset: &[Example],
    ) -> Vec<MinedDemos> {
        let mut sets = Vec::with_capacity(num_sets);
        for seed in -3..(num_sets as i64 - 3) {
            let strategy = BootstrapStrategy::from_seed(seed);
            sets.push(self.mine(program, trainset, strategy).await);
        }
        sets
    }

    fn sample_labeled(
        &self,
        trainset: &[Example],
        rng: &mut Xoshiro256PlusPlus,
    ) -> Vec<Demonstration> {
        let k = self.config.max_labeled_demos as usize;
        if trainset.is_empty() || k == 0 {
            return Vec::new();
        }
        if self.config.labeled_with_replacement {
            (0..k)
                .map(|_| Demonstration::labeled(&trainset[rng.gen_range(0..trainset.len())]))
                .collect()
        } else {
            trainset
                .choose_multiple(rng, k.min(trainset.len()))
                .map(Demonstration::labeled)
                .collect()
        }
    }

    /// Run `program` over `order`, keeping up to `limit` accepted predictions.
    async fn bootstrap<P: Program>(
        &self,
        program: &P,
        order: &[&Example],
        limit: usize,
    ) -> MinedDemos {
        let mut stats = MiningStats::default();
        let mut bootstrapped = Vec::with_capacity(limit);
        let max_errors = self.config.max_errors as usize;

        for example in order {
            if bootstrapped.len() >= limit {
                break;
            }
            stats.attempted += 1;

            let prediction = match program.run(&example.inputs).await {
                Ok(p) => p,
                Err(e) => {
                    stats.errors += 1;
                    debug!(example = %example.id, error = %e, "program failed while mining");
                    if stats.errors > max_errors {
                        stats.aborted = true;
                        warn!(errors = stats.errors, max_errors, "mining stopped on error budget");
                        break;
                    }
                    continue;
                }
            };

            match self.metric.evaluate(example, &prediction) {
                Ok(result) if result.passed && result.score >= self.config.metric_threshold => {
                    stats.successes += 1;
                    bootstrapped.push(Demonstration::bootstrapped(
                        example,
                        prediction.answer_fields(),
                        prediction.rationale().map(str::to_string),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    stats.errors += 1;
                    debug!(example = %example.id, error = %e, "metric failed while mining");
                    if stats.errors > max_errors {
                        stats.aborted = true;
                        warn!(errors = stats.errors, max_errors, "mining stopped on error budget");
                        break;
                    }
                }
            }
        }

        let demos = if self.config.include_labeled {
            let used: HashSet<&str> =
                bootstrapped.iter().map(|d| d.example_id.as_str()).collect();
            let mut demos: Vec<Demonstration> = order
                .iter()
                .filter(|ex| !used.contains(ex.id.as_str()))
                .take(self.config.max_labeled_demos as usize)
                .map(|ex| Demonstration::labeled(ex))
                .collect();
            demos.extend(bootstrapped);
            demos
        } else {
            bootstrapped
        };

        MinedDemos {
            strategy: None,
            demos,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::example::FieldMap;
    use crate::metric::ExactMatch;
    use crate::prediction::Prediction;
    use crate::program::FnProgram;
    use crate::signature::Signature;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn trainset(n: usize) -> Vec<Example> {
        (0..n)
            .map(|i| {
                Example::new(format!("ex{i}"))
                    .input("x", i.to_string())
                    .output("y", (i * 2).to_string())
            })
            .collect()
    }

    /// Doubles `x`; wrong on multiples of three.
    fn doubler(calls: Arc<AtomicUsize>) -> impl Program {
        FnProgram::new(
            "doubler",
            Signature::parse("x -> y").unwrap(),
            move |_: &str, _: &[Demonstration], inputs: &FieldMap| -> Result<Prediction> {
                calls.fetch_add(1, Ordering::SeqCst);
                let x: usize = inputs
                    .get("x")
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| Error::program("bad x"))?;
                let y = if x % 3 == 0 { x * 2 + 1 } else { x * 2 };
                Ok(Prediction::new().field("y", y.to_string()))
            },
        )
    }

    fn failing() -> impl Program {
        FnProgram::new(
            "failing",
            Signature::parse("x -> y").unwrap(),
            |_: &str, _: &[Demonstration], _: &FieldMap| -> Result<Prediction> {
                Err(Error::program("offline"))
            },
        )
    }

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn test_seed_convention() {
        assert_eq!(BootstrapStrategy::from_seed(-3), BootstrapStrategy::ZeroShot);
        assert_eq!(BootstrapStrategy::from_seed(-2), BootstrapStrategy::LabeledOnly);
        assert_eq!(BootstrapStrategy::from_seed(-1), BootstrapStrategy::Unshuffled);
        assert_eq!(
            BootstrapStrategy::from_seed(4),
            BootstrapStrategy::Shuffled { seed: 4 }
        );
        for s in -3..5 {
            assert_eq!(BootstrapStrategy::from_seed(s).seed(), s);
        }
        assert!(!BootstrapStrategy::LabeledOnly.runs_program());
    }

    #[test]
    fn test_zero_shot_is_empty() {
        let calls = Arc::new(AtomicUsize::new(0));
        let miner = DemonstrationMiner::new(ExactMatch, MinerConfig::new());
        let program = doubler(calls.clone());
        let mined = block_on(miner.mine(&program, &trainset(6), BootstrapStrategy::ZeroShot));
        assert!(mined.demos.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_labeled_only_never_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = MinerConfig::new().with_max_labeled_demos(3);
        let miner = DemonstrationMiner::new(ExactMatch, config);
        let program = doubler(calls.clone());
        let mined = block_on(miner.mine(&program, &trainset(6), BootstrapStrategy::LabeledOnly));

        assert_eq!(mined.demos.len(), 3);
        assert!(mined.demos.iter().all(|d| !d.is_bootstrapped()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(mined.stats.attempted, 0);

        let distinct: HashSet<_> = mined.demos.iter().map(|d| d.example_id.clone()).collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn test_labeled_with_replacement_fills_quota() {
        let config = MinerConfig::new().with_max_labeled_demos(5).with_replacement(true);
        let miner = DemonstrationMiner::new(ExactMatch, config);
        let calls = Arc::new(AtomicUsize::new(0));
        let program = doubler(calls);
        let mined = block_on(miner.mine(&program, &trainset(2), BootstrapStrategy::LabeledOnly));
        assert_eq!(mined.demos.len(), 5);
    }

    #[test]
    fn test_unshuffled_keeps_first_passing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = MinerConfig::new().with_max_bootstrapped_demos(3);
        let miner = DemonstrationMiner::new(ExactMatch, config);
        let program = doubler(calls.clone());
        let mined = block_on(miner.mine(&program, &trainset(10), BootstrapStrategy::Unshuffled));

        // ex0 and ex3 fail (multiples of three), ex1, ex2, ex4 pass.
        let ids: Vec<_> = mined.demos.iter().map(|d| d.example_id.as_str()).collect();
        assert_eq!(ids, ["ex1", "ex2", "ex4"]);
        assert!(mined.demos.iter().all(Demonstration::is_bootstrapped));
        assert_eq!(mined.stats.attempted, 5);
        assert_eq!(mined.stats.successes, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_labeled_prefix() {
        let config = MinerConfig::new()
            .with_max_bootstrapped_demos(2)
            .with_max_labeled_demos(2)
            .with_labeled_prefix(true);
        let miner = DemonstrationMiner::new(ExactMatch, config);
        let mined = block_on(miner.mine(
            &doubler(Arc::new(AtomicUsize::new(0))),
            &trainset(6),
            BootstrapStrategy::Unshuffled,
        ));

        let ids: Vec<_> = mined.demos.iter().map(|d| d.example_id.as_str()).collect();
        assert_eq!(ids, ["ex0", "ex3", "ex1", "ex2"]);
        assert!(!mined.demos[0].is_bootstrapped());
        assert!(mined.demos[2].is_bootstrapped());
    }

    #[test]
    fn test_metric_threshold() {
        let config = MinerConfig::new().with_metric_threshold(1.5);
        let miner = DemonstrationMiner::new(ExactMatch, config);
        let mined = block_on(miner.mine(
            &doubler(Arc::new(AtomicUsize::new(0))),
            &trainset(6),
            BootstrapStrategy::Unshuffled,
        ));
        assert!(mined.demos.is_empty());
        assert_eq!(mined.stats.successes, 0);
    }

    #[test]
    fn test_error_budget_aborts() {
        let config = MinerConfig::new().with_max_errors(2);
        let miner = DemonstrationMiner::new(ExactMatch, config);
        let mined = block_on(miner.mine(&failing(), &trainset(10), BootstrapStrategy::Unshuffled));

        assert!(mined.demos.is_empty());
        assert_eq!(mined.stats.errors, 3);
        assert_eq!(mined.stats.attempted, 3);
        assert!(mined.stats.aborted);
    }

    #[test]
    fn test_demo_sets_are_deterministic() {
        let config = MinerConfig::new().with_max_bootstrapped_demos(3).with_seed(11);
        let miner = DemonstrationMiner::new(ExactMatch, config);
        let program = doubler(Arc::new(AtomicUsize::new(0)));
        let data = trainset(12);

        let a = block_on(miner.create_n_fewshot_demo_sets(&program, 6, &data));
        let b = block_on(miner.create_n_fewshot_demo_sets(&program, 6, &data));
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
        assert_eq!(a[0].strategy, Some(BootstrapStrategy::ZeroShot));
        assert_eq!(a[1].strategy, Some(BootstrapStrategy::LabeledOnly));
        assert_eq!(a[2].strategy, Some(BootstrapStrategy::Unshuffled));
        assert_eq!(a[5].strategy, Some(BootstrapStrategy::Shuffled { seed: 2 }));
        for set in &a[3..] {
            assert!(set.demos.len() <= 3);
        }
    }

    #[test]
    fn test_fewer_sets_than_fixed_strategies() {
        let miner = DemonstrationMiner::new(ExactMatch, MinerConfig::new());
        let program = doubler(Arc::new(AtomicUsize::new(0)));
        let sets = block_on(miner.create_n_fewshot_demo_sets(&program, 2, &trainset(4)));
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].strategy, Some(BootstrapStrategy::LabeledOnly));
    }

    #[test]
    fn test_stats_merge() {
        let mut total = MiningStats::default();
        total.merge(&MiningStats { attempted: 4, successes: 3, errors: 1, aborted: false });
        total.merge(&MiningStats { attempted: 4, successes: 1, errors: 0, aborted: true });
        assert_eq!(total.attempted, 8);
        assert!(total.aborted);
        assert!((total.success_rate() - 0.5).abs() < 1e-12);
        assert_eq!(MiningStats::default().success_rate(), 0.0);
    }
}
