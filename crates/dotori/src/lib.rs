// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! # Dotori - Instruction and Demonstration Search for LM Programs
//!
//! Given a program with a tunable instruction and tunable few-shot
//! demonstrations, a training set and a metric, dotori searches for the
//! (instruction, demonstrations) pair that scores best on a validation set.
//!
//! ## Architecture
//!
//! - **Mining**: [`DemonstrationMiner`] runs the program over the training
//!   set and keeps outputs the metric accepts
//! - **Candidates**: [`CandidateGenerator`] crosses proposed instructions
//!   with mined demonstration sets into content-addressed candidates
//! - **Scheduling**: [`TrialScheduler`] picks the next candidate (greedy,
//!   adaptive softmax, or a Gaussian-process surrogate with UCB)
//! - **Engine**: [`OptimizationEngine`] runs the trials sequentially with
//!   early stopping and returns an [`OptimizationResult`]
//!
//! Programs are configured by value: applying a candidate always returns a
//! new program and never touches the template.
//!
//! ## Quick Start
//!
//! ```
//! use dotori::prelude::*;
//!
//! let program = FnProgram::new(
//!     "shout",
//!     Signature::parse("text -> loud").unwrap(),
//!     |instruction: &str, _: &[Demonstration], inputs: &FieldMap| -> Result<Prediction> {
//!         let text = inputs.get("text").cloned().unwrap_or_default();
//!         let loud = if instruction.contains("upper") { text.to_uppercase() } else { text };
//!         Ok(Prediction::new().field("loud", loud))
//!     },
//! );
//! let trainset: Vec<Example> = ["hi", "yo", "ok"]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, t)| Example::new(i.to_string()).input("text", *t).output("loud", t.to_uppercase()))
//!     .collect();
//!
//! let config = OptimizerConfig::preset(Preset::Light).with_strategy(StrategyKind::Greedy);
//! let engine = OptimizationEngine::new(
//!     config,
//!     ExactMatch,
//!     StaticProposer::new(["Answer in upper case."]),
//! );
//! let result = engine.compile_blocking(&program, &trainset, None).unwrap();
//! assert_eq!(result.best_score, 1.0);
//! assert_eq!(result.optimized_program.instruction(), "Answer in upper case.");
//! ```

#![warn(missing_docs)]
#![allow(clippy::unnecessary_map_or)]
#![allow(clippy::needless_lifetimes)]

pub mod bootstrap;
pub mod candidate;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod example;
pub mod llm;
pub mod metric;
pub mod predict;
pub mod prediction;
pub mod program;
pub mod propose;
pub mod result;
pub mod scheduler;
pub mod signature;
pub mod state;
pub mod surrogate;

pub use bootstrap::{BootstrapStrategy, DemonstrationMiner, MinedDemos, MiningStats};
pub use candidate::{
    CandidateConfiguration, CandidateCounts, CandidateGenerator, CandidateKind,
    CandidateMetadata, ConfigId,
};
pub use config::{MinerConfig, OptimizerConfig, Preset, StrategyKind, SurrogateConfig};
pub use engine::{OptimizationEngine, Phase};
pub use error::{Error, Result};
pub use evaluate::{EvaluationOutcome, Evaluator};
pub use example::{DemoSource, Demonstration, Example, FieldMap};
pub use llm::{Llm, LmOutput, MockLlm};
pub use metric::{ExactMatch, FnMetric, Metric, MetricResult};
pub use predict::Predict;
pub use prediction::{Prediction, TokenUsage};
pub use program::{FnProgram, Program};
pub use propose::{InstructionProposer, LmProposer, ProposalContext, StaticProposer};
pub use result::{GenerationStats, OptimizationResult, TrialHistory};
pub use scheduler::{FallbackReason, SelectNext, Selection, TrialScheduler};
pub use signature::{Field, FieldKind, Signature};
pub use state::{OptimizationState, TrialFailure, TrialRecord};
pub use surrogate::{GaussianProcess, SurrogateError};

/// Prelude for convenient imports
pub mod prelude {
    // Error handling
    pub use crate::{Error, Result};

    // Data model
    pub use crate::{Demonstration, Example, Field, FieldMap, Prediction, Signature};

    // Collaborators
    pub use crate::{
        ExactMatch, FnMetric, FnProgram, InstructionProposer, Llm, LmProposer, Metric,
        MetricResult, MockLlm, Predict, Program, StaticProposer,
    };

    // Optimizer
    pub use crate::{
        CandidateKind, OptimizationEngine, OptimizationResult, OptimizerConfig, Preset,
        StrategyKind,
    };
}

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
