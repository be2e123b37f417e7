// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Candidate configurations and their generation.
//!
//! A candidate is an immutable (instruction, demonstrations) pair plus
//! provenance. Scores are never stored on the candidate; they live in
//! [`OptimizationState`](crate::state::OptimizationState) keyed by
//! [`ConfigId`].

use crate::example::Demonstration;
use crate::program::Program;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

/// Content-derived candidate identifier (truncated blake3).
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ConfigId([u8; 16]);

impl ConfigId {
    /// Hash a candidate's content.
    pub fn from_content(kind: CandidateKind, instruction: &str, demos: &[Demonstration]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b"::");
        hasher.update(instruction.as_bytes());
        hasher.update(b"::");
        hasher.update(&(demos.len() as u64).to_le_bytes());
        for demo in demos {
            demo.hash_into(&mut hasher);
        }
        Self::from_hash(hasher.finalize())
    }

    /// Derive a new id from this one and a salt.
    pub fn salted(&self, salt: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.0);
        hasher.update(b"#");
        hasher.update(&salt.to_le_bytes());
        Self::from_hash(hasher.finalize())
    }

    #[inline]
    fn from_hash(hash: blake3::Hash) -> Self {
        let mut id = [0u8; 16];
        id.copy_from_slice(&hash.as_bytes()[..16]);
        Self(id)
    }

    /// Hex representation.
    #[inline]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let id: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(id))
    }

    /// Get raw bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// First eight bytes as an integer. Used for feature encoding.
    #[inline]
    pub(crate) fn prefix_u64(&self) -> u64 {
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(head)
    }
}

impl std::fmt::Debug for ConfigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConfigId({})", self.to_hex())
    }
}

impl std::fmt::Display for ConfigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ConfigId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ConfigId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid config id"))
    }
}

/// What a candidate changes relative to the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// The template as given
    Baseline,
    /// Instruction replaced, template demonstrations kept
    InstructionOnly,
    /// Demonstrations replaced, template instruction kept
    DemonstrationOnly,
    /// Both replaced
    Combined,
}

impl CandidateKind {
    /// All kinds in generation order.
    pub const ALL: [CandidateKind; 4] = [
        Self::Baseline,
        Self::InstructionOnly,
        Self::DemonstrationOnly,
        Self::Combined,
    ];

    /// Position in [`Self::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Self::Baseline => 0,
            Self::InstructionOnly => 1,
            Self::DemonstrationOnly => 2,
            Self::Combined => 3,
        }
    }

    /// Stable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::InstructionOnly => "instruction_only",
            Self::DemonstrationOnly => "demonstration_only",
            Self::Combined => "combined",
        }
    }
}

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidateMetadata {
    /// Rank of the instruction in proposal order
    pub instruction_rank: Option<usize>,
    /// Index of the demonstration set in mining order
    pub demo_set_index: Option<usize>,
    /// Position in the generated candidate list
    pub ordinal: usize,
}

/// One point in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateConfiguration {
    /// Content-derived id
    pub config_id: ConfigId,
    /// Kind
    pub kind: CandidateKind,
    /// Instruction text; empty when the kind keeps the template's
    pub instruction: String,
    /// Demonstrations; empty when the kind keeps the template's
    pub demonstrations: Arc<[Demonstration]>,
    /// Provenance
    pub metadata: CandidateMetadata,
}

impl CandidateConfiguration {
    fn new(
        kind: CandidateKind,
        instruction: &str,
        demonstrations: Arc<[Demonstration]>,
        metadata: CandidateMetadata,
    ) -> Self {
        Self {
            config_id: ConfigId::from_content(kind, instruction, &demonstrations),
            kind,
            instruction: instruction.to_string(),
            demonstrations,
            metadata,
        }
    }

    /// Number of demonstrations this candidate injects.
    ///
    /// Baseline and instruction-only candidates inject none and report 0,
    /// even when the template already carries demonstrations.
    #[inline]
    pub fn demo_count(&self) -> usize {
        self.demonstrations.len()
    }

    /// Derive a configured program from the template. The template is not
    /// touched.
    pub fn apply<P: Program>(&self, template: &P) -> P {
        match self.kind {
            CandidateKind::Baseline => template.clone(),
            CandidateKind::InstructionOnly => template.apply_instruction(&self.instruction),
            CandidateKind::DemonstrationOnly => {
                template.apply_demonstrations(&self.demonstrations)
            }
            CandidateKind::Combined => template
                .apply_instruction(&self.instruction)
                .apply_demonstrations(&self.demonstrations),
        }
    }
}

/// Candidate counts by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidateCounts {
    /// Baseline candidates (always 1)
    pub baseline: usize,
    /// Instruction-only candidates
    pub instruction_only: usize,
    /// Demonstration-only candidates
    pub demonstration_only: usize,
    /// Combined candidates
    pub combined: usize,
}

impl CandidateCounts {
    /// Tally a candidate list.
    pub fn tally(candidates: &[CandidateConfiguration]) -> Self {
        let mut counts = Self::default();
        for c in candidates {
            match c.kind {
                CandidateKind::Baseline => counts.baseline += 1,
                CandidateKind::InstructionOnly => counts.instruction_only += 1,
                CandidateKind::DemonstrationOnly => counts.demonstration_only += 1,
                CandidateKind::Combined => counts.combined += 1,
            }
        }
        counts
    }

    /// Total candidates.
    #[inline]
    pub fn total(&self) -> usize {
        self.baseline + self.instruction_only + self.demonstration_only + self.combined
    }
}

/// Expected number of candidates for `n` instructions, `m` demo sets and
/// cutoff `k`.
#[inline]
pub const fn expected_count(n: usize, m: usize, k: usize) -> usize {
    let ki = if n < k { n } else { k };
    let km = if m < k { m } else { k };
    1 + n + m + ki * km
}

/// Builds the candidate list from proposals and mined demonstration sets.
#[derive(Debug, Clone, Copy)]
pub struct CandidateGenerator {
    top_k: usize,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self::new(3)
    }
}

impl CandidateGenerator {
    /// Create a generator crossing the top `top_k` instructions and demo sets.
    pub const fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Emit Baseline, then InstructionOnly per instruction, DemonstrationOnly
    /// per demo set, then the top-K cross product as Combined.
    pub fn generate(
        &self,
        instructions: &[String],
        demo_sets: &[Vec<Demonstration>],
    ) -> Vec<CandidateConfiguration> {
        let sets: Vec<Arc<[Demonstration]>> =
            demo_sets.iter().map(|s| Arc::from(s.clone())).collect();
        let empty: Arc<[Demonstration]> = Arc::from(Vec::new());

        let mut out = Vec::with_capacity(expected_count(
            instructions.len(),
            sets.len(),
            self.top_k,
        ));
        let mut push = |kind, instruction: &str, demos: Arc<[Demonstration]>, rank, set| {
            let metadata = CandidateMetadata {
                instruction_rank: rank,
                demo_set_index: set,
                ordinal: out.len(),
            };
            out.push(CandidateConfiguration::new(kind, instruction, demos, metadata));
        };

        push(CandidateKind::Baseline, "", empty.clone(), None, None);
        for (rank, instruction) in instructions.iter().enumerate() {
            push(
                CandidateKind::InstructionOnly,
                instruction,
                empty.clone(),
                Some(rank),
                None,
            );
        }
        for (index, set) in sets.iter().enumerate() {
            push(
                CandidateKind::DemonstrationOnly,
                "",
                Arc::clone(set),
                None,
                Some(index),
            );
        }
        for (rank, instruction) in instructions.iter().take(self.top_k).enumerate() {
            for (index, set) in sets.iter().take(self.top_k).enumerate() {
                push(
                    CandidateKind::Combined,
                    instruction,
                    Arc::clone(set),
                    Some(rank),
                    Some(index),
                );
            }
        }

        dedupe_ids(&mut out);
        out
    }
}

/// Later duplicates are salted with their ordinal until unique.
fn dedupe_ids(candidates: &mut [CandidateConfiguration]) {
    let mut seen = HashSet::with_capacity(candidates.len());
    for c in candidates.iter_mut() {
        let mut salt = c.metadata.ordinal as u64;
        while !seen.insert(c.config_id) {
            c.config_id = c.config_id.salted(salt);
            salt = salt.wrapping_add(1);
        }
    }
}
