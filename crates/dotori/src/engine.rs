// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Optimization engine
//!
//! Drives one run through its phases:
//!
//! 1. **Bootstrapping**: mine demonstration sets from the training set
//! 2. **ProposingInstructions**: ask the proposer for instructions, then
//!    generate the candidate pool
//! 3. **Trialing**: select, apply, evaluate and record, until the budget or
//!    patience runs out
//! 4. **Finished**: apply the best candidate to the template
//!
//! Only configuration errors are returned. Everything that goes wrong after
//! validation is logged and counted in the result.

use crate::bootstrap::{DemonstrationMiner, MiningStats};
use crate::candidate::{CandidateCounts, CandidateGenerator};
use crate::config::OptimizerConfig;
use crate::error::{Error, Result};
use crate::evaluate::Evaluator;
use crate::example::{Demonstration, Example};
use crate::metric::Metric;
use crate::program::Program;
use crate::propose::{sanitize_instructions, InstructionProposer, ProposalContext, StaticProposer};
use crate::result::{GenerationStats, OptimizationResult, TrialHistory};
use crate::scheduler::{SelectNext, TrialScheduler};
use crate::state::OptimizationState;
use std::fmt;
use tracing::Instrument;

/// Engine phase, used in logs and spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Mining demonstration sets
    Bootstrapping,
    /// Proposing instructions and generating candidates
    ProposingInstructions,
    /// Running trials
    Trialing,
    /// Done
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bootstrapping => "bootstrapping",
            Self::ProposingInstructions => "proposing_instructions",
            Self::Trialing => "trialing",
            Self::Finished => "finished",
        })
    }
}

/// Searches instructions and demonstrations for a program.
///
/// The engine holds no per-run state, so one engine can serve any number
/// of `compile` calls.
pub struct OptimizationEngine<M, Pr = StaticProposer> {
    config: OptimizerConfig,
    metric: M,
    proposer: Pr,
}

impl<M: Metric> OptimizationEngine<M, StaticProposer> {
    /// Engine that only searches demonstrations.
    pub fn demonstrations_only(config: OptimizerConfig, metric: M) -> Self {
        Self::new(config, metric, StaticProposer::empty())
    }
}

impl<M: Metric, Pr: InstructionProposer> OptimizationEngine<M, Pr> {
    /// Create an engine.
    pub fn new(config: OptimizerConfig, metric: M, proposer: Pr) -> Self {
        Self {
            config,
            metric,
            proposer,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize `program`. The template is never modified.
    ///
    /// When `valset` is `None` and the configuration does not require one,
    /// trials are scored on the training set.
    pub async fn compile<P: Program>(
        &self,
        program: &P,
        trainset: &[Example],
        valset: Option<&[Example]>,
    ) -> Result<OptimizationResult<P>> {
        let span = tracing::info_span!(
            "compile",
            program = program.name(),
            strategy = %self.config.strategy,
            trials = self.config.num_trials,
        );
        self.run(program, trainset, valset).instrument(span).await
    }

    /// [`Self::compile`] on the current thread.
    pub fn compile_blocking<P: Program>(
        &self,
        program: &P,
        trainset: &[Example],
        valset: Option<&[Example]>,
    ) -> Result<OptimizationResult<P>> {
        futures::executor::block_on(self.compile(program, trainset, valset))
    }

    fn evaluation_set<'a>(
        &self,
        trainset: &'a [Example],
        valset: Option<&'a [Example]>,
    ) -> Result<&'a [Example]> {
        self.config.validate()?;
        if trainset.is_empty() {
            return Err(Error::EmptyTrainset);
        }
        match valset {
            Some([]) => Err(Error::EmptyValset),
            Some(v) => Ok(v),
            None if self.config.require_valset => Err(Error::MissingValset),
            None => {
                tracing::warn!(
                    examples = trainset.len(),
                    "no validation set given, scoring trials on the training set"
                );
                Ok(trainset)
            }
        }
    }

    async fn run<P: Program>(
        &self,
        program: &P,
        trainset: &[Example],
        valset: Option<&[Example]>,
    ) -> Result<OptimizationResult<P>> {
        let evalset = self.evaluation_set(trainset, valset)?;
        let config = &self.config;

        // Bootstrapping
        let miner = DemonstrationMiner::new(&self.metric, config.miner);
        let mined = miner
            .create_n_fewshot_demo_sets(program, config.num_demo_sets as usize, trainset)
            .instrument(tracing::info_span!("phase", phase = %Phase::Bootstrapping))
            .await;
        let mut bootstrap = MiningStats::default();
        for set in &mined {
            bootstrap.merge(&set.stats);
        }
        let demo_sets: Vec<Vec<Demonstration>> = mined.into_iter().map(|m| m.demos).collect();
        let demo_set_sizes: Vec<usize> = demo_sets.iter().map(Vec::len).collect();
        tracing::info!(
            phase = %Phase::Bootstrapping,
            sets = demo_sets.len(),
            success_rate = bootstrap.success_rate(),
            errors = bootstrap.errors,
            "demonstration sets mined"
        );

        // Proposing instructions
        let ctx = ProposalContext {
            signature: program.signature(),
            trainset,
            demo_sets: &demo_sets,
            current_instruction: program.instruction(),
            num_candidates: config.num_instruction_candidates as usize,
        };
        let proposed = self
            .proposer
            .propose(ctx)
            .instrument(tracing::info_span!(
                "phase",
                phase = %Phase::ProposingInstructions,
                proposer = self.proposer.name(),
            ))
            .await;
        let mut instructions = match proposed {
            Ok(raw) => sanitize_instructions(raw),
            Err(e) => {
                tracing::warn!(error = %e, "instruction proposal failed, continuing without");
                Vec::new()
            }
        };
        instructions.truncate(config.num_instruction_candidates as usize);

        let candidates =
            CandidateGenerator::new(config.top_k as usize).generate(&instructions, &demo_sets);
        if candidates.is_empty() {
            return Err(Error::NoCandidates);
        }
        let counts = CandidateCounts::tally(&candidates);
        tracing::info!(
            phase = %Phase::ProposingInstructions,
            instructions = instructions.len(),
            candidates = candidates.len(),
            "candidates generated"
        );

        // Trialing
        let trial_span = tracing::info_span!("phase", phase = %Phase::Trialing);
        let mut state = OptimizationState::new(&candidates, config.init_temperature);
        let mut scheduler = TrialScheduler::from_config(config);
        let evaluator = Evaluator::new(&self.metric, config.max_eval_errors as usize);
        let mut early_stopped = false;
        let mut bayesian_fallbacks = 0;

        for trial in 0..config.num_trials as usize {
            let Some(selection) = scheduler.select_next(&candidates, &mut state, trial) else {
                break;
            };
            if selection.fallback.is_some() {
                bayesian_fallbacks += 1;
            }
            let candidate = &candidates[selection.index];
            let configured = candidate.apply(program);

            let outcome = evaluator
                .evaluate(&configured, evalset)
                .instrument(trial_span.clone())
                .await;
            let recorded = match outcome {
                Ok(outcome) => state
                    .record_success(trial, candidate, outcome.score)
                    .map(|improved| {
                        tracing::debug!(
                            trial,
                            config_id = %candidate.config_id,
                            kind = candidate.kind.as_str(),
                            policy = %selection.policy,
                            score = outcome.score,
                            errors = outcome.errors,
                            "trial scored"
                        );
                        if improved {
                            tracing::info!(
                                trial,
                                config_id = %candidate.config_id,
                                score = outcome.score,
                                "new best candidate"
                            );
                        }
                    }),
                Err(e) => Err(e),
            };
            if let Err(e) = recorded {
                tracing::warn!(
                    trial,
                    config_id = %candidate.config_id,
                    category = e.category(),
                    error = %e,
                    "trial failed"
                );
                if let Err(e) = state.record_failure(trial, candidate, e.to_string()) {
                    tracing::error!(trial, error = %e, "could not record trial");
                }
            }

            if state.should_stop(trial + 1, config.patience as usize) {
                tracing::info!(
                    trial,
                    patience = config.patience,
                    "no improvement within patience, stopping early"
                );
                early_stopped = true;
                break;
            }
        }

        // Finished
        let best = state.best();
        let best_candidate = best.and_then(|(id, _)| {
            candidates.iter().find(|c| c.config_id == id).cloned()
        });
        let optimized_program = match &best_candidate {
            Some(c) => c.apply(program),
            None => {
                tracing::warn!("no trial succeeded, returning the template unchanged");
                program.clone()
            }
        };
        let best_score = best.map_or(0.0, |(_, score)| score);

        let trials_run = state.trials_run();
        let diversity = state.diversity();
        let parts = state.into_parts();
        tracing::info!(
            phase = %Phase::Finished,
            best_score,
            trials_run,
            early_stopped,
            "optimization finished"
        );

        Ok(OptimizationResult {
            optimized_program,
            best_candidate,
            best_score,
            history: TrialHistory {
                trials: parts.trials,
                failures: parts.failures,
                score_history: parts.score_history,
                best_score_history: parts.best_score_history,
                early_stopped,
                trials_run,
                diversity,
                bayesian_fallbacks,
            },
            stats: GenerationStats {
                bootstrap_success_rate: bootstrap.success_rate(),
                bootstrap,
                demo_set_sizes,
                instructions_proposed: instructions.len(),
                candidates: counts,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MinerConfig, StrategyKind};
    use crate::example::FieldMap;
    use crate::metric::ExactMatch;
    use crate::prediction::Prediction;
    use crate::program::FnProgram;
    use crate::propose::StaticProposer;
    use crate::signature::Signature;

    fn data(n: usize) -> Vec<Example> {
        (0..n)
            .map(|i| {
                Example::new(format!("e{i}"))
                    .input("n", i.to_string())
                    .output("parity", if i % 2 == 0 { "even" } else { "odd" })
            })
            .collect()
    }

    /// Right only when told to check parity.
    fn parity() -> impl Program + std::fmt::Debug {
        FnProgram::new(
            "parity",
            Signature::parse("n -> parity").unwrap(),
            |instruction: &str, _: &[Demonstration], inputs: &FieldMap| -> Result<Prediction> {
                let n: u32 = inputs
                    .get("n")
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| Error::program("bad n"))?;
                let answer = if instruction.contains("parity") && n % 2 == 1 {
                    "odd"
                } else {
                    "even"
                };
                Ok(Prediction::new().field("parity", answer))
            },
        )
    }

    fn config() -> OptimizerConfig {
        OptimizerConfig::new()
            .with_num_trials(6)
            .with_num_demo_sets(3)
            .with_strategy(StrategyKind::Greedy)
            .with_miner(MinerConfig::new().with_max_bootstrapped_demos(2))
    }

    #[tokio::test]
    async fn test_compile_finds_instruction() {
        let engine = OptimizationEngine::new(
            config(),
            ExactMatch,
            StaticProposer::new(["Check the parity."]),
        );
        let program = parity();
        let result = engine.compile(&program, &data(6), None).await.unwrap();

        assert_eq!(result.best_score, 1.0);
        assert_eq!(result.optimized_program.instruction(), "Check the parity.");
        assert_eq!(program.instruction(), "");
        assert_eq!(result.stats.instructions_proposed, 1);
        assert_eq!(result.stats.demo_set_sizes.len(), 3);
    }

    #[test]
    fn test_compile_blocking() {
        let engine = OptimizationEngine::demonstrations_only(config(), ExactMatch);
        let result = engine.compile_blocking(&parity(), &data(4), Some(&data(4)[..])).unwrap();
        assert!((result.best_score - 0.5).abs() < 1e-12);
        assert_eq!(result.stats.candidates.instruction_only, 0);
        assert_eq!(result.stats.candidates.combined, 0);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let engine = OptimizationEngine::demonstrations_only(config(), ExactMatch);
        let program = parity();

        let err = engine.compile(&program, &[], None).await.unwrap_err();
        assert!(matches!(err, Error::EmptyTrainset));

        let empty: &[Example] = &[];
        let err = engine.compile(&program, &data(2), Some(empty)).await.unwrap_err();
        assert!(matches!(err, Error::EmptyValset));

        let strict = OptimizationEngine::demonstrations_only(
            config().with_require_valset(true),
            ExactMatch,
        );
        let err = strict.compile(&program, &data(2), None).await.unwrap_err();
        assert!(matches!(err, Error::MissingValset));

        let broken =
            OptimizationEngine::demonstrations_only(config().with_num_trials(0), ExactMatch);
        let err = broken.compile(&program, &data(2), None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Bootstrapping.to_string(), "bootstrapping");
        assert_eq!(Phase::Finished.to_string(), "finished");
    }
}
