// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Program trait and a closure-backed implementation
//!
//! A [`Program`] is anything with a tunable instruction and a tunable list of
//! few-shot demonstrations that can be run on one input. Configuration is
//! strictly value-based: `apply_instruction` and `apply_demonstrations`
//! return a new program and leave `self` untouched, so the optimizer can keep
//! one unconfigured template and derive every trial from it.
//!
//! ## GAT-based Design
//!
//! `run` returns an associated future type, so synchronous programs can use
//! `std::future::Ready` and pay nothing for the async interface.

use crate::error::Result;
use crate::example::{Demonstration, FieldMap};
use crate::prediction::Prediction;
use crate::signature::Signature;
use std::future::Future;
use std::sync::Arc;

/// A configurable, runnable LM program.
pub trait Program: Clone + Send + Sync {
    /// Future type returned by `run`.
    type RunFut<'a>: Future<Output = Result<Prediction>> + Send + 'a
    where
        Self: 'a;

    /// The I/O schema.
    fn signature(&self) -> &Signature;

    /// The current instruction.
    fn instruction(&self) -> &str;

    /// The current demonstrations.
    fn demonstrations(&self) -> &[Demonstration];

    /// Copy of this program with the instruction replaced.
    fn apply_instruction(&self, text: &str) -> Self;

    /// Copy of this program with the demonstrations replaced.
    fn apply_demonstrations(&self, demos: &[Demonstration]) -> Self;

    /// Run on one input.
    fn run<'a>(&'a self, inputs: &'a FieldMap) -> Self::RunFut<'a>;

    /// Get program name for logging.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Whether two programs carry the same instruction and demonstrations.
    fn same_configuration(&self, other: &Self) -> bool {
        self.instruction() == other.instruction()
            && self.demonstrations() == other.demonstrations()
    }
}

/// A program that wraps a function.
///
/// The function sees the program's current instruction and demonstrations,
/// which makes it handy for tests and for adapting non-LM pipelines.
pub struct FnProgram<F> {
    f: Arc<F>,
    signature: Arc<Signature>,
    instruction: String,
    demos: Arc<[Demonstration]>,
    name: &'static str,
}

impl<F> FnProgram<F>
where
    F: Fn(&str, &[Demonstration], &FieldMap) -> Result<Prediction> + Send + Sync,
{
    /// Create a new function program. The instruction starts as the
    /// signature's default instruction.
    pub fn new(name: &'static str, signature: Signature, f: F) -> Self {
        Self {
            f: Arc::new(f),
            instruction: signature.instructions.clone(),
            signature: Arc::new(signature),
            demos: Arc::from(Vec::new()),
            name,
        }
    }
}

impl<F> Clone for FnProgram<F> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
            signature: Arc::clone(&self.signature),
            instruction: self.instruction.clone(),
            demos: Arc::clone(&self.demos),
            name: self.name,
        }
    }
}

impl<F> std::fmt::Debug for FnProgram<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProgram")
            .field("name", &self.name)
            .field("instruction", &self.instruction)
            .field("demos", &self.demos.len())
            .finish()
    }
}

impl<F> Program for FnProgram<F>
where
    F: Fn(&str, &[Demonstration], &FieldMap) -> Result<Prediction> + Send + Sync,
{
    type RunFut<'a>
        = std::future::Ready<Result<Prediction>>
    where
        Self: 'a;

    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn instruction(&self) -> &str {
        &self.instruction
    }

    fn demonstrations(&self) -> &[Demonstration] {
        &self.demos
    }

    fn apply_instruction(&self, text: &str) -> Self {
        let mut next = self.clone();
        next.instruction = text.to_string();
        next
    }

    fn apply_demonstrations(&self, demos: &[Demonstration]) -> Self {
        let mut next = self.clone();
        next.demos = Arc::from(demos.to_vec());
        next
    }

    fn run<'a>(&'a self, inputs: &'a FieldMap) -> Self::RunFut<'a> {
        std::future::ready((self.f)(self.instruction.as_str(), &self.demos[..], inputs))
    }

    fn name(&self) -> &str {
        self.name
    }
}
