// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! LLM trait using Generic Associated Types (GATs).
//!
//! This is the seam between the optimizer's reference collaborators
//! ([`Predict`](crate::predict::Predict) and
//! [`LmProposer`](crate::propose::LmProposer)) and a concrete model provider.
//!
//! # Examples
//!
//! ```
//! use dotori::llm::{MockLlm, Llm};
//!
//! let llm = MockLlm::new(|prompt| format!("Answer: {}", prompt.len()));
//! assert_eq!(llm.model_name(), "mock");
//! ```

use crate::error::Result;
use std::future::Future;

/// Output from an LLM generation request.
#[derive(Debug, Clone)]
pub struct LmOutput {
    /// The generated text.
    pub text: String,
    /// Number of prompt tokens used.
    pub prompt_tokens: u32,
    /// Number of completion tokens generated.
    pub completion_tokens: u32,
}

impl LmOutput {
    /// Create a new LmOutput with just the text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    /// Create a new LmOutput with token counts.
    pub fn with_tokens(text: impl Into<String>, prompt: u32, completion: u32) -> Self {
        Self {
            text: text.into(),
            prompt_tokens: prompt,
            completion_tokens: completion,
        }
    }
}

/// Trait for language model providers.
///
/// Implementations can be synchronous (returning `Ready<T>`) or asynchronous
/// (returning their own futures).
pub trait Llm: Send + Sync {
    /// The future type returned by `generate()`.
    type GenerateFut<'a>: Future<Output = Result<LmOutput>> + Send + 'a
    where
        Self: 'a;

    /// Generate a completion for the prompt.
    ///
    /// The prompt is passed by value so the returned future only borrows
    /// `self`.
    fn generate<'a>(&'a self, prompt: String) -> Self::GenerateFut<'a>;

    /// Get the model name for logging.
    fn model_name(&self) -> &str {
        "unknown"
    }
}

/// A mock LLM for testing and examples.
///
/// Responses come from a closure, synchronously.
pub struct MockLlm<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    generator: F,
    name: &'static str,
}

impl<F> MockLlm<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    /// Create a new mock LLM with the given generator function.
    pub fn new(generator: F) -> Self {
        Self {
            generator,
            name: "mock",
        }
    }

    /// Set a custom name for the mock LLM.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl<F> Llm for MockLlm<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    type GenerateFut<'a>
        = std::future::Ready<Result<LmOutput>>
    where
        Self: 'a;

    fn generate<'a>(&'a self, prompt: String) -> Self::GenerateFut<'a> {
        let text = (self.generator)(&prompt);
        std::future::ready(Ok(LmOutput::new(text)))
    }

    fn model_name(&self) -> &str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_llm_generates() {
        let llm = MockLlm::new(|prompt| prompt.to_uppercase()).with_name("shout");
        let out = llm.generate("hello".to_string()).await.unwrap();
        assert_eq!(out.text, "HELLO");
        assert_eq!(llm.model_name(), "shout");
    }

    #[test]
    fn test_lm_output_tokens() {
        let out = LmOutput::with_tokens("x", 12, 3);
        assert_eq!(out.prompt_tokens, 12);
        assert_eq!(out.completion_tokens, 3);
        assert_eq!(LmOutput::new("y").prompt_tokens, 0);
    }
}
