// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Instruction proposal
//!
//! The engine only needs an ordered list of instruction strings; where they
//! come from is up to the [`InstructionProposer`]. Two are provided: a fixed
//! list, and an LM prompted with the task, a few examples and the mined
//! demonstrations.

use crate::error::{Error, Result};
use crate::example::{Demonstration, Example};
use crate::llm::Llm;
use crate::signature::Signature;
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::future::Future;

/// Everything a proposer may look at.
#[derive(Debug, Clone, Copy)]
pub struct ProposalContext<'a> {
    /// Program I/O schema
    pub signature: &'a Signature,
    /// Training examples
    pub trainset: &'a [Example],
    /// Mined demonstration sets
    pub demo_sets: &'a [Vec<Demonstration>],
    /// The template's instruction
    pub current_instruction: &'a str,
    /// How many instructions to ask for
    pub num_candidates: usize,
}

/// Produces candidate instructions, best first.
pub trait InstructionProposer: Send + Sync {
    /// Future type returned by `propose`.
    type ProposeFut<'a>: Future<Output = Result<Vec<String>>> + Send + 'a
    where
        Self: 'a;

    /// Propose up to `ctx.num_candidates` instructions.
    fn propose<'a>(&'a self, ctx: ProposalContext<'a>) -> Self::ProposeFut<'a>;

    /// Name for logging.
    fn name(&self) -> &str {
        "proposer"
    }
}

/// Trim, drop empties and duplicates, keep order.
pub fn sanitize_instructions(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

/// Returns a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticProposer {
    instructions: Vec<String>,
}

impl StaticProposer {
    /// Create from any list of strings.
    pub fn new<I, S>(instructions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            instructions: instructions.into_iter().map(Into::into).collect(),
        }
    }

    /// A proposer that never proposes anything.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl InstructionProposer for StaticProposer {
    type ProposeFut<'a>
        = std::future::Ready<Result<Vec<String>>>
    where
        Self: 'a;

    fn propose<'a>(&'a self, ctx: ProposalContext<'a>) -> Self::ProposeFut<'a> {
        let take = ctx.num_candidates.min(self.instructions.len());
        std::future::ready(Ok(self.instructions[..take].to_vec()))
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Asks an LM for instructions and parses a numbered list from its reply.
pub struct LmProposer<L> {
    llm: L,
    max_examples: usize,
}

impl<L: Llm> LmProposer<L> {
    /// Create a proposer showing up to three examples per prompt.
    pub fn new(llm: L) -> Self {
        Self {
            llm,
            max_examples: 3,
        }
    }

    /// Set how many examples and demonstrations go into the prompt.
    pub fn with_max_examples(mut self, n: usize) -> Self {
        self.max_examples = n;
        self
    }

    /// Render the meta-prompt.
    pub fn build_prompt(&self, ctx: &ProposalContext<'_>) -> String {
        let mut prompt = String::with_capacity(1024);
        prompt.push_str(
            "You are improving the instruction given to a language model for the task below.\n\n",
        );
        let _ = writeln!(prompt, "Task signature: {}", ctx.signature.to_string_format());
        if !ctx.current_instruction.is_empty() {
            let _ = writeln!(prompt, "Current instruction: {}", ctx.current_instruction);
        }

        if !ctx.trainset.is_empty() {
            prompt.push_str("\nExamples:\n");
            for ex in ctx.trainset.iter().take(self.max_examples) {
                let _ = writeln!(prompt, "- inputs: {:?} => outputs: {:?}", ex.inputs, ex.outputs);
            }
        }

        let demos = ctx
            .demo_sets
            .iter()
            .flatten()
            .filter(|d| d.is_bootstrapped())
            .take(self.max_examples);
        let mut wrote_header = false;
        for demo in demos {
            if !wrote_header {
                prompt.push_str("\nSuccessful runs:\n");
                wrote_header = true;
            }
            let _ = writeln!(prompt, "- inputs: {:?} => outputs: {:?}", demo.inputs, demo.outputs);
            if let Some(r) = &demo.rationale {
                let _ = writeln!(prompt, "  reasoning: {r}");
            }
        }

        let _ = write!(
            prompt,
            "\nWrite {} alternative instructions, one per line, as a numbered list (1. ...).",
            ctx.num_candidates
        );
        prompt
    }
}

impl<L: Llm> InstructionProposer for LmProposer<L> {
    type ProposeFut<'a>
        = BoxFuture<'a, Result<Vec<String>>>
    where
        Self: 'a;

    fn propose<'a>(&'a self, ctx: ProposalContext<'a>) -> Self::ProposeFut<'a> {
        let n = ctx.num_candidates;
        let generation = self.llm.generate(self.build_prompt(&ctx));
        Box::pin(async move {
            let output = generation.await?;
            let mut instructions = parse_numbered_list(&output.text);
            if instructions.is_empty() {
                return Err(Error::proposal("response contained no numbered instructions"));
            }
            instructions.truncate(n);
            Ok(instructions)
        })
    }

    fn name(&self) -> &str {
        self.llm.model_name()
    }
}

/// Extract items from lines like `1. text` or `12) text`.
pub fn parse_numbered_list(text: &str) -> Vec<String> {
    let mut results = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        let rest = trimmed.trim_start_matches(|c: char| c.is_ascii_digit());
        if rest.len() == trimmed.len() {
            continue;
        }
        if let Some(item) = rest
            .strip_prefix(|c: char| c == '.' || c == ')')
            .map(str::trim)
        {
            if !item.is_empty() {
                results.push(item.to_string());
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn ctx<'a>(sig: &'a Signature, train: &'a [Example], n: usize) -> ProposalContext<'a> {
        ProposalContext {
            signature: sig,
            trainset: train,
            demo_sets: &[],
            current_instruction: "Answer.",
            num_candidates: n,
        }
    }

    #[test]
    fn test_parse_numbered_list() {
        let text = "Here you go:\n1. Be concise.\n2) Think first.\n\n10. Cite facts.\n3.\n- bullet";
        assert_eq!(
            parse_numbered_list(text),
            vec!["Be concise.", "Think first.", "Cite facts."]
        );
        assert!(parse_numbered_list("nothing here").is_empty());
    }

    #[test]
    fn test_sanitize() {
        let raw = vec![
            " A ".to_string(),
            "".to_string(),
            "B".to_string(),
            "A".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(sanitize_instructions(raw), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_static_proposer_truncates() {
        let sig = Signature::parse("q -> a").unwrap();
        let proposer = StaticProposer::new(["one", "two", "three"]);
        let out = proposer.propose(ctx(&sig, &[], 2)).await.unwrap();
        assert_eq!(out, vec!["one", "two"]);
        assert!(StaticProposer::empty()
            .propose(ctx(&sig, &[], 5))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_lm_proposer() {
        let llm = MockLlm::new(|prompt| {
            assert!(prompt.contains("Task signature: q -> a"));
            assert!(prompt.contains("Current instruction: Answer."));
            assert!(prompt.contains("Write 2 alternative instructions"));
            "1. Answer briefly.\n2. Answer with a number.\n3. Extra.".to_string()
        });
        let sig = Signature::parse("q -> a").unwrap();
        let train = vec![Example::new("1").input("q", "2+2").output("a", "4")];

        let proposer = LmProposer::new(llm);
        let out = proposer.propose(ctx(&sig, &train, 2)).await.unwrap();
        assert_eq!(out, vec!["Answer briefly.", "Answer with a number."]);
    }

    #[tokio::test]
    async fn test_lm_proposer_unparseable() {
        let proposer = LmProposer::new(MockLlm::new(|_| "I cannot help.".to_string()));
        let sig = Signature::parse("q -> a").unwrap();
        let err = proposer.propose(ctx(&sig, &[], 3)).await.unwrap_err();
        assert!(matches!(err, Error::Proposal(_)));
    }
}
