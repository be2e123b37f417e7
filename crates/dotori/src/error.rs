// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Error types for dotori
//!
//! Only configuration-class errors ever leave [`OptimizationEngine::compile`].
//! Program, metric and surrogate failures are absorbed by the engine and
//! show up in the run statistics instead.
//!
//! [`OptimizationEngine::compile`]: crate::engine::OptimizationEngine::compile

use crate::candidate::ConfigId;
use crate::surrogate::SurrogateError;
use thiserror::Error;

/// Result type alias for dotori operations
pub type Result<T> = core::result::Result<T, Error>;

/// Main error type for dotori
#[derive(Error, Debug)]
pub enum Error {
    /// The training set was empty.
    #[error("Training set is empty")]
    EmptyTrainset,

    /// A validation set is required by the configuration but none was given.
    #[error("A validation set is required but none was provided")]
    MissingValset,

    /// A validation set was given but contains no examples.
    #[error("Validation set is empty")]
    EmptyValset,

    /// Candidate generation produced nothing to evaluate.
    #[error("No viable candidates were generated")]
    NoCandidates,

    /// The optimizer configuration is inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A program failed while running an example.
    #[error("Program error: {0}")]
    Program(String),

    /// A metric failed while scoring a prediction.
    #[error("Metric error: {0}")]
    Metric(String),

    /// The instruction proposer failed.
    #[error("Proposal error: {0}")]
    Proposal(String),

    /// Too many examples failed during a single evaluation.
    #[error("Evaluation aborted after {errors} failed examples (limit {limit})")]
    TooManyErrors {
        /// Number of failed examples.
        errors: usize,
        /// Configured error budget.
        limit: usize,
    },

    /// A score was recorded for a candidate outside the current run.
    #[error("Unknown candidate {0}")]
    UnknownCandidate(ConfigId),

    /// Surrogate model failure.
    #[error("Surrogate error: {0}")]
    Surrogate(#[from] SurrogateError),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a program error
    pub fn program(msg: impl Into<String>) -> Self {
        Self::Program(msg.into())
    }

    /// Create a metric error
    pub fn metric(msg: impl Into<String>) -> Self {
        Self::Metric(msg.into())
    }

    /// Create a proposal error
    pub fn proposal(msg: impl Into<String>) -> Self {
        Self::Proposal(msg.into())
    }

    /// Whether this error aborts a `compile` call before any trial runs.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmptyTrainset
                | Self::MissingValset
                | Self::EmptyValset
                | Self::NoCandidates
                | Self::InvalidConfig(_)
        )
    }

    /// Whether the engine absorbs this error and keeps going.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    /// Get the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::EmptyTrainset | Self::MissingValset | Self::EmptyValset => "dataset",
            Self::NoCandidates => "candidates",
            Self::InvalidConfig(_) => "config",
            Self::Program(_) => "program",
            Self::Metric(_) => "metric",
            Self::Proposal(_) => "proposal",
            Self::TooManyErrors { .. } => "evaluation",
            Self::UnknownCandidate(_) => "state",
            Self::Surrogate(_) => "surrogate",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}
