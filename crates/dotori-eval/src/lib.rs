// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Evaluation helpers for dotori

#![allow(clippy::needless_lifetimes)]
//!
//! Token-overlap metrics that plug into the optimizer as [`dotori::Metric`]s,
//! and a Rayon scorer for predictions that were already computed.

pub mod evaluator;
pub mod metric;
pub mod parallel;

pub use evaluator::{collect_predictions, ExampleScore, ScoreReport};
pub use metric::{ContainsAnswer, F1Score, MetricPanel, SemanticF1};
pub use parallel::ParallelScorer;
