//! Observations: the unit of memory.
//!
//! Everything an agent perceives, does, says, reflects on or votes becomes
//! one [`Observation`] in its [`MemoryStore`](crate::memory::MemoryStore).
//! Fields are fixed at append time; only a reflection's description may be
//! revised later.

use serde::{Deserialize, Serialize};

use crate::types::{Keywords, MemoryType, ObservationId};

/// A single recorded observation, from the owning agent's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Position in the store. Assigned at append time.
    pub id: ObservationId,
    /// Simulation round the observation happened in.
    pub round: u32,
    /// Tick within the round.
    pub tick: u32,
    /// What kind of observation this is.
    pub memory_type: MemoryType,
    /// 1 for first-order observations, 2 for reflections.
    pub level: u8,
    /// Where the observation happened, if anywhere.
    pub location: Option<String>,
    /// Natural language description.
    pub description: String,
    /// Whether the recorded action succeeded.
    pub success: bool,
    /// Salience score from the importance service.
    pub importance: i64,
    /// Whether the owning agent was the actor.
    pub is_self: bool,
    /// Category → word associations extracted when the observation was made.
    pub keywords: Keywords,
}

impl Observation {
    /// Whether this node may have its description revised.
    #[must_use]
    pub fn is_reflection(&self) -> bool {
        self.memory_type == MemoryType::Reflection
    }
}

/// The caller-supplied fields of a new observation.
///
/// Everything except the id, which the store assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationInput {
    /// Simulation round.
    pub round: u32,
    /// Tick within the round.
    pub tick: u32,
    /// What kind of observation this is.
    pub memory_type: MemoryType,
    /// Natural language description.
    pub description: String,
    /// Category → word associations for the keyword index.
    pub keywords: Keywords,
    /// Where the observation happened.
    pub location: Option<String>,
    /// Outcome flag.
    pub success: bool,
    /// Salience score.
    pub importance: i64,
    /// Whether the owning agent was the actor.
    pub is_self: bool,
}

impl ObservationInput {
    /// A successful, self-performed observation with no keywords, no
    /// location and importance 0. Adjust with the `with_*` builders.
    #[must_use]
    pub fn new(round: u32, tick: u32, memory_type: MemoryType, description: impl Into<String>) -> Self {
        Self {
            round,
            tick,
            memory_type,
            description: description.into(),
            keywords: Keywords::new(),
            location: None,
            success: true,
            importance: 0,
            is_self: true,
        }
    }

    /// Set the keywords.
    #[must_use]
    pub fn with_keywords(mut self, keywords: Keywords) -> Self {
        self.keywords = keywords;
        self
    }

    /// Set the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the importance score.
    #[must_use]
    pub fn with_importance(mut self, importance: i64) -> Self {
        self.importance = importance;
        self
    }

    /// Set the outcome flag.
    #[must_use]
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Mark whether the owning agent was the actor.
    #[must_use]
    pub fn with_self(mut self, is_self: bool) -> Self {
        self.is_self = is_self;
        self
    }

    /// Materialize the observation under `id`.
    pub(crate) fn into_observation(self, id: ObservationId) -> Observation {
        Observation {
            id,
            round: self.round,
            tick: self.tick,
            level: self.memory_type.level(),
            memory_type: self.memory_type,
            location: self.location,
            description: self.description,
            success: self.success,
            importance: self.importance,
            is_self: self.is_self,
            keywords: self.keywords,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_follows_type() {
        let obs = ObservationInput::new(1, 0, MemoryType::Reflection, "I trust nobody")
            .into_observation(ObservationId(3));
        assert_eq!(obs.level, 2);
        assert!(obs.is_reflection());

        let obs = ObservationInput::new(1, 0, MemoryType::Percept, "A door creaks")
            .into_observation(ObservationId(4));
        assert_eq!(obs.level, 1);
        assert!(!obs.is_reflection());
    }

    #[test]
    fn builders_set_fields() {
        let input = ObservationInput::new(2, 7, MemoryType::Action, "took the lantern")
            .with_location("Cellar")
            .with_importance(6)
            .with_success(false)
            .with_self(false);
        assert_eq!(input.location.as_deref(), Some("Cellar"));
        assert_eq!(input.importance, 6);
        assert!(!input.success);
        assert!(!input.is_self);
    }

    #[test]
    fn observation_serializes_for_transcripts() {
        let obs = ObservationInput::new(4, 1, MemoryType::Dialogue, "\"Morning, Klaus\"")
            .with_location("Cafe")
            .into_observation(ObservationId(9));
        let json = serde_json::to_value(&obs).expect("serialize");
        assert_eq!(json["id"], 9);
        assert_eq!(json["location"], "Cafe");
        assert_eq!(json["description"], "\"Morning, Klaus\"");
        let back: Observation = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, obs);
    }
}
