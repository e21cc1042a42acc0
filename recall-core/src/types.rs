//! Core type definitions for the recall memory system.
//!
//! Identity types, the observation type taxonomy, categorized keywords and
//! embedding vectors.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MemoryError;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for an agent (one memory store per agent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Create a new random agent ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an observation within one agent's store.
///
/// Equal to the observation's position in the store: dense, starting at 0,
/// never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ObservationId(pub usize);

impl ObservationId {
    /// Position of this observation in the store.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Memory Type
// ---------------------------------------------------------------------------

/// What kind of thing an observation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MemoryType {
    /// Something an agent did.
    Action,
    /// Something said in conversation.
    Dialogue,
    /// A derived, second-order thought about other observations.
    Reflection,
    /// Something perceived in the world.
    Percept,
}

impl MemoryType {
    /// All memory types, in declaration order.
    pub const ALL: [Self; 4] = [Self::Action, Self::Dialogue, Self::Reflection, Self::Percept];

    /// Abstraction level: 1 for first-order observations, 2 for reflections.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Reflection => 2,
            Self::Action | Self::Dialogue | Self::Percept => 1,
        }
    }

    /// Lowercase name used in config and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Dialogue => "dialogue",
            Self::Reflection => "reflection",
            Self::Percept => "percept",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "action" => Ok(Self::Action),
            "dialogue" => Ok(Self::Dialogue),
            "reflection" | "reflect" => Ok(Self::Reflection),
            "percept" | "perception" => Ok(Self::Percept),
            _ => Err(MemoryError::InvalidMemoryType(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

/// Category → words associations extracted from a piece of text.
///
/// Both levels are ordered so iteration is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keywords(BTreeMap<String, BTreeSet<String>>);

impl Keywords {
    /// An empty keyword set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `word` under `category`. Both are lowercased and trimmed; empty
    /// words are ignored.
    pub fn insert(&mut self, category: &str, word: &str) {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return;
        }
        self.0
            .entry(category.trim().to_lowercase())
            .or_default()
            .insert(word);
    }

    /// Builder-style [`Keywords::insert`] for several words at once.
    #[must_use]
    pub fn with<'a>(mut self, category: &str, words: impl IntoIterator<Item = &'a str>) -> Self {
        for word in words {
            self.insert(category, word);
        }
        self
    }

    /// Union `other` into `self`, per category.
    pub fn merge(&mut self, other: &Self) {
        for (category, words) in &other.0 {
            self.0
                .entry(category.clone())
                .or_default()
                .extend(words.iter().cloned());
        }
    }

    /// Iterate over every `(category, word)` pair.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(c, words)| words.iter().map(move |w| (c.as_str(), w.as_str())))
    }

    /// Words recorded under `category` (empty if none).
    pub fn words(&self, category: &str) -> impl Iterator<Item = &str> {
        self.0
            .get(category)
            .into_iter()
            .flat_map(|words| words.iter().map(String::as_str))
    }

    /// Total number of `(category, word)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    /// Whether no keywords are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Keywords {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut kw = Self::new();
        for (category, word) in iter {
            kw.insert(category, word);
        }
        kw
    }
}

// ---------------------------------------------------------------------------
// Embedding Vector
// ---------------------------------------------------------------------------

/// A dense vector embedding for semantic similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    /// An all-zero vector, used as the neutral stand-in when the embedding
    /// service is unavailable. Its cosine similarity with anything is 0.
    #[must_use]
    pub fn zeros(dimensions: usize) -> Self {
        Self(vec![0.0; dimensions])
    }

    /// Cosine similarity between two embeddings.
    /// Returns 0.0 if the lengths differ or either vector has zero magnitude.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        crate::embedding::cosine_similarity(self, other)
    }

    /// Dimensionality of the embedding.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }
}
