// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Training examples and few-shot demonstrations

use crate::signature::Signature;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordered field map. Ordering keeps hashing and prompt rendering stable.
pub type FieldMap = BTreeMap<String, String>;

/// An input/expected-output pair used for bootstrapping and evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Stable identifier
    pub id: String,
    /// Input fields
    pub inputs: FieldMap,
    /// Ground-truth outputs
    pub outputs: FieldMap,
    /// Schema of the program this example belongs to
    #[serde(skip)]
    pub signature: Option<Arc<Signature>>,
}

impl Example {
    /// Create an empty example with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: FieldMap::new(),
            outputs: FieldMap::new(),
            signature: None,
        }
    }

    /// Add an input field.
    pub fn input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// Add an expected output field.
    pub fn output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }

    /// Attach the I/O schema.
    pub fn with_signature(mut self, signature: Arc<Signature>) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Get an input field
    pub fn get_input(&self, key: &str) -> Option<&str> {
        self.inputs.get(key).map(String::as_str)
    }

    /// Get an expected output field
    pub fn get_output(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }
}

/// Where a demonstration's outputs came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DemoSource {
    /// Outputs produced by running the program and passing the metric.
    Bootstrapped,
    /// Outputs copied from the training labels.
    Labeled,
}

/// A few-shot input/output pair rendered into a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demonstration {
    /// Id of the training example this was built from
    pub example_id: String,
    /// Input fields
    pub inputs: FieldMap,
    /// Output fields
    pub outputs: FieldMap,
    /// Optional reasoning captured alongside the output
    pub rationale: Option<String>,
    /// Provenance
    pub source: DemoSource,
}

impl Demonstration {
    /// Demonstration that reuses an example's labels verbatim.
    pub fn labeled(example: &Example) -> Self {
        Self {
            example_id: example.id.clone(),
            inputs: example.inputs.clone(),
            outputs: example.outputs.clone(),
            rationale: None,
            source: DemoSource::Labeled,
        }
    }

    /// Demonstration built from a program run that passed the metric.
    pub fn bootstrapped(example: &Example, outputs: FieldMap, rationale: Option<String>) -> Self {
        Self {
            example_id: example.id.clone(),
            inputs: example.inputs.clone(),
            outputs,
            rationale,
            source: DemoSource::Bootstrapped,
        }
    }

    /// Whether the outputs were produced by the program.
    #[inline]
    pub fn is_bootstrapped(&self) -> bool {
        self.source == DemoSource::Bootstrapped
    }

    /// Feed the demonstration into a content hash.
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        for map in [&self.inputs, &self.outputs] {
            for (k, v) in map {
                hasher.update(k.as_bytes());
                hasher.update(b"=");
                hasher.update(v.as_bytes());
                hasher.update(b"\x1f");
            }
            hasher.update(b"\x1e");
        }
        if let Some(r) = &self.rationale {
            hasher.update(r.as_bytes());
        }
        hasher.update(b"\x1d");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_builder() {
        let ex = Example::new("q1")
            .input("question", "What is 2+2?")
            .output("answer", "4");

        assert_eq!(ex.id, "q1");
        assert_eq!(ex.get_input("question"), Some("What is 2+2?"));
        assert_eq!(ex.get_output("answer"), Some("4"));
        assert_eq!(ex.get_output("missing"), None);
    }

    #[test]
    fn test_labeled_demo_copies_labels() {
        let ex = Example::new("q1").input("question", "Q").output("answer", "A");
        let demo = Demonstration::labeled(&ex);

        assert_eq!(demo.example_id, "q1");
        assert_eq!(demo.outputs.get("answer").map(String::as_str), Some("A"));
        assert!(!demo.is_bootstrapped());
    }

    #[test]
    fn test_bootstrapped_demo_uses_prediction() {
        let ex = Example::new("q1").input("question", "Q").output("answer", "A");
        let mut outputs = FieldMap::new();
        outputs.insert("answer".into(), "A!".into());
        let demo = Demonstration::bootstrapped(&ex, outputs, Some("because".into()));

        assert!(demo.is_bootstrapped());
        assert_eq!(demo.outputs.get("answer").map(String::as_str), Some("A!"));
        assert_eq!(demo.rationale.as_deref(), Some("because"));
    }

    #[test]
    fn test_demo_hash_is_content_based() {
        let a = Demonstration::labeled(&Example::new("1").input("q", "x").output("a", "y"));
        let b = Demonstration::labeled(&Example::new("2").input("q", "x").output("a", "y"));
        let c = Demonstration::labeled(&Example::new("1").input("q", "x").output("a", "z"));

        let digest = |d: &Demonstration| {
            let mut h = blake3::Hasher::new();
            d.hash_into(&mut h);
            h.finalize()
        };
        assert_eq!(digest(&a), digest(&b));
        assert_ne!(digest(&a), digest(&c));
    }
}
