// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Single-step LM program
//!
//! [`Predict`] renders its instruction, demonstrations and the current input
//! into one prompt, calls an [`Llm`], and reads the output fields back out of
//! the completion by their prefixes.

use crate::error::Result;
use crate::example::{Demonstration, FieldMap};
use crate::llm::Llm;
use crate::prediction::{Prediction, TokenUsage};
use crate::program::Program;
use crate::signature::Signature;
use futures::future::BoxFuture;
use std::fmt::Write as _;
use std::sync::Arc;

/// A prompt-and-parse program over one signature.
pub struct Predict<L> {
    llm: Arc<L>,
    signature: Arc<Signature>,
    instruction: String,
    demos: Arc<[Demonstration]>,
}

impl<L> Clone for Predict<L> {
    fn clone(&self) -> Self {
        Self {
            llm: Arc::clone(&self.llm),
            signature: Arc::clone(&self.signature),
            instruction: self.instruction.clone(),
            demos: Arc::clone(&self.demos),
        }
    }
}

impl<L: Llm> Predict<L> {
    /// Create a predictor. The instruction starts as the signature's default.
    pub fn new(llm: Arc<L>, signature: Signature) -> Self {
        Self {
            llm,
            instruction: signature.instructions.clone(),
            signature: Arc::new(signature),
            demos: Arc::from(Vec::new()),
        }
    }

    /// Render the full prompt for one input.
    pub fn build_prompt(&self, inputs: &FieldMap) -> String {
        let mut prompt = String::with_capacity(256);

        if !self.instruction.is_empty() {
            prompt.push_str(&self.instruction);
            prompt.push_str("\n\n");
        }

        for demo in self.demos.iter() {
            prompt.push_str("Example:\n");
            if let Some(rationale) = &demo.rationale {
                let _ = writeln!(prompt, "Reasoning: {rationale}");
            }
            self.write_fields(&mut prompt, &demo.inputs, &demo.outputs);
            prompt.push('\n');
        }

        prompt.push_str("Now:\n");
        self.write_fields(&mut prompt, inputs, &FieldMap::new());
        for field in &self.signature.output_fields {
            prompt.push_str(&field.prefix);
            prompt.push(' ');
        }

        prompt
    }

    fn write_fields(&self, prompt: &mut String, inputs: &FieldMap, outputs: &FieldMap) {
        for field in &self.signature.input_fields {
            if let Some(value) = inputs.get(&field.name) {
                let _ = writeln!(prompt, "{} {}", field.prefix, value);
            }
        }
        for field in &self.signature.output_fields {
            if let Some(value) = outputs.get(&field.name) {
                let _ = writeln!(prompt, "{} {}", field.prefix, value);
            }
        }
    }

    /// Read output fields out of a completion.
    ///
    /// Each output field is located by its prefix and runs to the end of the
    /// line. A single-output signature falls back to the whole trimmed
    /// completion when its prefix is absent.
    pub fn parse_response(&self, text: &str) -> Prediction {
        let mut prediction = Prediction::new();

        for field in &self.signature.output_fields {
            let prefix = field.prefix.as_str();
            if let Some(start) = text.rfind(prefix) {
                let rest = &text[start + prefix.len()..];
                let value = rest.lines().next().unwrap_or("").trim();
                prediction.insert(field.name.clone(), value);
            }
        }

        if prediction.outputs.is_empty() && self.signature.output_fields.len() == 1 {
            let name = self.signature.output_fields[0].name.clone();
            prediction.insert(name, text.trim());
        }

        prediction
    }
}

impl<L: Llm> Program for Predict<L> {
    type RunFut<'a>
        = BoxFuture<'a, Result<Prediction>>
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
        let generation = self.llm.generate(self.build_prompt(inputs));
        Box::pin(async move {
            let output = generation.await?;
            let mut prediction = self.parse_response(&output.text);
            if output.prompt_tokens > 0 || output.completion_tokens > 0 {
                prediction.tokens = Some(TokenUsage {
                    prompt_tokens: output.prompt_tokens,
                    completion_tokens: output.completion_tokens,
                });
            }
            Ok(prediction)
        })
    }

    fn name(&self) -> &str {
        self.llm.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example::Example;
    use crate::llm::MockLlm;

    fn qa_signature() -> Signature {
        Signature::parse("question -> answer")
            .unwrap()
            .with_instructions("Answer concisely.")
    }

    fn inputs(q: &str) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("question".into(), q.into());
        map
    }

    #[test]
    fn test_build_prompt_layout() {
        let llm = Arc::new(MockLlm::new(|_| String::new()));
        let demo = Demonstration::labeled(
            &Example::new("d1")
                .input("question", "1+1?")
                .output("answer", "2"),
        );
        let predict = Predict::new(llm, qa_signature()).apply_demonstrations(&[demo]);

        let prompt = predict.build_prompt(&inputs("2+2?"));
        assert!(prompt.starts_with("Answer concisely.\n\n"));
        assert!(prompt.contains("Example:\nQuestion: 1+1?\nAnswer: 2\n"));
        assert!(prompt.ends_with("Now:\nQuestion: 2+2?\nAnswer: "));
    }

    #[test]
    fn test_parse_response_by_prefix() {
        let llm = Arc::new(MockLlm::new(|_| String::new()));
        let predict = Predict::new(llm, qa_signature());

        let pred = predict.parse_response("Let me think.\nAnswer: 4\nDone");
        assert_eq!(pred.get("answer"), Some("4"));

        let bare = predict.parse_response("  4  ");
        assert_eq!(bare.get("answer"), Some("4"));
    }

    #[tokio::test]
    async fn test_run_uses_current_instruction() {
        let llm = Arc::new(MockLlm::new(|prompt| {
            if prompt.starts_with("Shout.") {
                "Answer: FOUR".to_string()
            } else {
                "Answer: four".to_string()
            }
        }));
        let base = Predict::new(llm, qa_signature());
        let shouting = base.apply_instruction("Shout.");

        let quiet = base.run(&inputs("2+2?")).await.unwrap();
        let loud = shouting.run(&inputs("2+2?")).await.unwrap();
        assert_eq!(quiet.get("answer"), Some("four"));
        assert_eq!(loud.get("answer"), Some("FOUR"));
        assert_eq!(base.instruction(), "Answer concisely.");
    }
}
