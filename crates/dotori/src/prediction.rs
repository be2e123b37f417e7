// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Prediction results from program execution

use crate::example::FieldMap;
use serde::{Deserialize, Serialize};

/// Output field that, when present, is kept as a demonstration rationale.
pub const RATIONALE_FIELD: &str = "rationale";

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Result of running a program on one input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Output fields
    pub outputs: FieldMap,
    /// Token usage, if the program reports it
    pub tokens: Option<TokenUsage>,
}

impl Prediction {
    /// Create an empty prediction
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with outputs
    pub fn with_outputs(outputs: FieldMap) -> Self {
        Self {
            outputs,
            tokens: None,
        }
    }

    /// Builder-style insert.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert an output field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.outputs.insert(key.into(), value.into());
    }

    /// Get an output field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }

    /// Rationale text, if the program produced one.
    pub fn rationale(&self) -> Option<&str> {
        self.get(RATIONALE_FIELD)
    }

    /// Outputs without the rationale field.
    pub fn answer_fields(&self) -> FieldMap {
        self.outputs
            .iter()
            .filter(|(k, _)| k.as_str() != RATIONALE_FIELD)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_insert_get() {
        let mut pred = Prediction::new();
        pred.insert("answer", "42");
        assert_eq!(pred.get("answer"), Some("42"));
        assert_eq!(pred.get("missing"), None);
    }

    #[test]
    fn test_rationale_split() {
        let pred = Prediction::new()
            .field("answer", "4")
            .field(RATIONALE_FIELD, "2 plus 2");

        assert_eq!(pred.rationale(), Some("2 plus 2"));
        let answers = pred.answer_fields();
        assert_eq!(answers.len(), 1);
        assert!(answers.contains_key("answer"));
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        };
        assert_eq!(usage.total(), 15);
    }
}
