// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Signatures: the input/output schema of a program step

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Direction of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Input field
    Input,
    /// Output field
    Output,
}

/// A named field in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name as it appears in example maps
    pub name: String,
    /// Human readable description
    pub desc: String,
    /// Prefix used when rendering the field into a prompt
    pub prefix: String,
    /// Input or output
    pub kind: FieldKind,
}

impl Field {
    /// Create a field, inferring its prompt prefix from the name.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        let prefix = Self::infer_prefix(&name);
        Self {
            desc: String::new(),
            prefix,
            name,
            kind,
        }
    }

    /// Create an input field.
    pub fn input(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Input)
    }

    /// Create an output field.
    pub fn output(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Output)
    }

    /// Set the description.
    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Set the prompt prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// `camelCase` and `snake_case` become `Camel Case:` / `Snake Case:`.
    fn infer_prefix(name: &str) -> String {
        let mut result = String::with_capacity(name.len() + 2);
        let mut prev_lower = false;
        let mut start_word = true;

        for ch in name.chars() {
            if ch == '_' || ch == '-' {
                if !result.is_empty() {
                    result.push(' ');
                }
                start_word = true;
                prev_lower = false;
                continue;
            }
            if ch.is_uppercase() && prev_lower {
                result.push(' ');
                start_word = true;
            }
            if start_word {
                result.extend(ch.to_uppercase());
            } else {
                result.push(ch);
            }
            start_word = false;
            prev_lower = ch.is_lowercase();
        }

        result.push(':');
        result
    }
}

/// Input/output contract of a program step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Default instruction for the step
    pub instructions: String,
    /// Input fields, in prompt order
    pub input_fields: Vec<Field>,
    /// Output fields, in prompt order
    pub output_fields: Vec<Field>,
}

impl Signature {
    /// Create a signature with no fields.
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            input_fields: Vec::new(),
            output_fields: Vec::new(),
        }
    }

    /// Parse `"question, context -> answer"`.
    pub fn parse(s: &str) -> Result<Self> {
        let (inputs, outputs) = s
            .split_once("->")
            .ok_or_else(|| Error::config("signature must be in format 'inputs -> outputs'"))?;
        if outputs.contains("->") {
            return Err(Error::config("signature contains more than one '->'"));
        }

        let names = |part: &str| -> Vec<String> {
            part.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut sig = Self::new("");
        sig.input_fields = names(inputs).into_iter().map(Field::input).collect();
        sig.output_fields = names(outputs).into_iter().map(Field::output).collect();

        if sig.output_fields.is_empty() {
            return Err(Error::config("signature needs at least one output field"));
        }
        Ok(sig)
    }

    /// Set the default instruction.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Add a field on the side its kind says.
    pub fn with_field(mut self, field: Field) -> Self {
        match field.kind {
            FieldKind::Input => self.input_fields.push(field),
            FieldKind::Output => self.output_fields.push(field),
        }
        self
    }

    /// Get all fields (inputs then outputs)
    pub fn all_fields(&self) -> impl Iterator<Item = &Field> {
        self.input_fields.iter().chain(self.output_fields.iter())
    }

    /// Names of the output fields.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.output_fields.iter().map(|f| f.name.as_str())
    }

    /// Render back to `"a, b -> c"` form.
    pub fn to_string_format(&self) -> String {
        let inputs: Vec<&str> = self.input_fields.iter().map(|f| f.name.as_str()).collect();
        let outputs: Vec<&str> = self.output_fields.iter().map(|f| f.name.as_str()).collect();
        format!("{} -> {}", inputs.join(", "), outputs.join(", "))
    }
}
