//! The memory store: one agent's append-only, indexed log of observations.
//!
//! Each [`MemoryStore`] owns its observations, their embeddings and three
//! indices (keyword, type, round). Ids are positions in the log: the n-th
//! append gets id `n - 1`. Nothing is ever removed; only a reflection's
//! description and embedding may be revised.

pub mod index;

pub use index::{IdIndex, KeywordIndex};

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::config::{EmbeddingFailurePolicy, MemorySettings};
use crate::embedding::EmbeddingProvider;
use crate::error::{MemoryError, Result};
use crate::observation::{Observation, ObservationInput};
use crate::services::{RetryPolicy, call_with_retry};
use crate::types::{AgentId, Embedding, Keywords, MemoryType, ObservationId};

/// Per-store counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total observations.
    pub total: usize,
    /// Observations per type.
    pub by_type: BTreeMap<MemoryType, usize>,
    /// Observations where the owning agent was the actor.
    pub self_authored: usize,
    /// Distinct `(category, word)` pairs in the keyword index.
    pub keyword_pairs: usize,
}

/// One agent's memory.
pub struct MemoryStore {
    agent: AgentId,
    observations: Vec<Observation>,
    // one entry per observation, same position
    embeddings: Vec<Embedding>,
    keyword_index: KeywordIndex,
    type_index: IdIndex<MemoryType>,
    round_index: IdIndex<u32>,
    embedder: Arc<dyn EmbeddingProvider>,
    settings: MemorySettings,
    retry: RetryPolicy,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("agent", &self.agent)
            .field("len", &self.observations.len())
            .field("embedder", &self.embedder.model_name())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create an empty store for `agent`.
    #[must_use]
    pub fn new(
        agent: AgentId,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: MemorySettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            agent,
            observations: Vec::new(),
            embeddings: Vec::new(),
            keyword_index: KeywordIndex::new(),
            type_index: IdIndex::new(),
            round_index: IdIndex::new(),
            embedder,
            settings,
            retry,
        }
    }

    /// The owning agent.
    #[must_use]
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Append an observation and return its id.
    ///
    /// The embedding is fetched before anything is mutated: either every
    /// index and the embedding cache are updated, or nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ExternalServiceUnavailable`] only when the
    /// embedding service fails every attempt and the store is configured
    /// with [`EmbeddingFailurePolicy::Abort`]. Under the default
    /// [`EmbeddingFailurePolicy::ZeroVector`] a zero vector is stored instead.
    pub fn append(&mut self, input: ObservationInput) -> Result<ObservationId> {
        let embedding = match self.embed(&input.description) {
            Ok(embedding) => embedding,
            Err(e) => match self.settings.on_embedding_failure {
                EmbeddingFailurePolicy::Abort => return Err(e),
                EmbeddingFailurePolicy::ZeroVector => {
                    warn!(agent = %self.agent, error = %e, "storing zero embedding");
                    Embedding::zeros(self.embedder.dimensions())
                }
            },
        };

        let id = ObservationId(self.observations.len());
        let observation = input.into_observation(id);

        for (category, word) in observation.keywords.pairs() {
            self.keyword_index.insert(category, word, id);
        }
        self.type_index.insert(observation.memory_type, id);
        self.round_index.insert(observation.round, id);

        debug!(
            agent = %self.agent,
            %id,
            memory_type = %observation.memory_type,
            round = observation.round,
            keywords = observation.keywords.len(),
            "appended observation"
        );

        self.observations.push(observation);
        self.embeddings.push(embedding);
        Ok(id)
    }

    /// Look up an observation.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] if `id` is not in `[0, len)`.
    pub fn get(&self, id: ObservationId) -> Result<&Observation> {
        self.observations.get(id.index()).ok_or(MemoryError::NotFound {
            id: id.index(),
            count: self.observations.len(),
        })
    }

    /// The cached embedding of an observation.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] if `id` is not in `[0, len)`.
    pub fn embedding(&self, id: ObservationId) -> Result<&Embedding> {
        self.embeddings.get(id.index()).ok_or(MemoryError::NotFound {
            id: id.index(),
            count: self.embeddings.len(),
        })
    }

    /// Ids of the observations made in `round`, in insertion order.
    #[must_use]
    pub fn by_round(&self, round: u32) -> &[ObservationId] {
        self.round_index.get(&round)
    }

    /// Ids of the observations of type `memory_type`, in insertion order.
    #[must_use]
    pub fn by_type(&self, memory_type: MemoryType) -> &[ObservationId] {
        self.type_index.get(&memory_type)
    }

    /// Ids of the observations made after `round` (or from `round` on, when
    /// `inclusive`), ordered by round then insertion.
    #[must_use]
    pub fn after_round(&self, round: u32, inclusive: bool) -> Vec<ObservationId> {
        let lower = if inclusive {
            Bound::Included(round)
        } else {
            Bound::Excluded(round)
        };
        self.round_index.range((lower, Bound::Unbounded)).collect()
    }

    /// Revise a reflection's description and re-embed it.
    ///
    /// Returns `Ok(false)` without touching anything when `id` is not a
    /// reflection. Id, type, round and tick never change.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::NotFound`] for an unknown id, or
    /// [`MemoryError::ExternalServiceUnavailable`] if the new text cannot be
    /// embedded. In the latter case the node is left unchanged.
    pub fn update_description(&mut self, id: ObservationId, text: impl Into<String>) -> Result<bool> {
        if !self.get(id)?.is_reflection() {
            debug!(agent = %self.agent, %id, "refusing to revise a non-reflection");
            return Ok(false);
        }
        let text = text.into();
        let embedding = self.embed(&text)?;

        let index = id.index();
        self.observations[index].description = text;
        self.embeddings[index] = embedding;
        debug!(agent = %self.agent, %id, "revised reflection");
        Ok(true)
    }

    /// The `k` most recent observations, oldest first. Fewer if the store
    /// holds fewer.
    #[must_use]
    pub fn lookback(&self, k: usize) -> &[Observation] {
        let start = self.observations.len().saturating_sub(k);
        &self.observations[start..]
    }

    /// Every id tagged with any `(category, word)` pair of `keywords`,
    /// deduplicated, in first-hit order.
    #[must_use]
    pub fn keyword_hits(&self, keywords: &Keywords) -> IndexSet<ObservationId> {
        keywords
            .pairs()
            .flat_map(|(category, word)| self.keyword_index.get(category, word).iter().copied())
            .collect()
    }

    /// A numbered list of the given observations' descriptions, one per
    /// line (`"1. ..."`). Unknown ids are skipped.
    #[must_use]
    pub fn enumerated_descriptions(&self, ids: &[ObservationId]) -> String {
        ids.iter()
            .filter_map(|&id| self.get(id).ok())
            .enumerate()
            .map(|(n, observation)| format!("{}. {}", n + 1, observation.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Iterate over every observation in id order.
    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Read-only view of the keyword index.
    #[must_use]
    pub fn keyword_index(&self) -> &KeywordIndex {
        &self.keyword_index
    }

    /// Counters over the whole store.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            total: self.observations.len(),
            by_type: MemoryType::ALL
                .into_iter()
                .map(|ty| (ty, self.by_type(ty).len()))
                .collect(),
            self_authored: self.observations.iter().filter(|o| o.is_self).count(),
            keyword_pairs: self.keyword_index.len(),
        }
    }

    /// The embedding provider this store was built with.
    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    fn embed(&self, text: &str) -> Result<Embedding> {
        call_with_retry("embedding", &self.retry, || self.embedder.embed(text))
    }
}

impl<'a> IntoIterator for &'a MemoryStore {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::embedding::HashingEmbeddingProvider;

    /// Fails the first `failures` calls, then delegates to feature hashing.
    struct FlakyEmbedder {
        failures: usize,
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for FlakyEmbedder {
        fn embed(&self, text: &str) -> Result<Embedding> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(MemoryError::Service("timeout".into()))
            } else {
                HashingEmbeddingProvider::new(16).embed(text)
            }
        }

        fn dimensions(&self) -> usize {
            16
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(
            AgentId::new(),
            Arc::new(HashingEmbeddingProvider::new(32)),
            MemorySettings::default(),
            RetryPolicy::attempts(2),
        )
    }

    fn flaky_store(failures: usize, policy: EmbeddingFailurePolicy) -> MemoryStore {
        MemoryStore::new(
            AgentId::new(),
            Arc::new(FlakyEmbedder {
                failures,
                calls: AtomicUsize::new(0),
            }),
            MemorySettings {
                on_embedding_failure: policy,
                ..MemorySettings::default()
            },
            RetryPolicy::attempts(2),
        )
    }

    fn input(round: u32, ty: MemoryType, text: &str) -> ObservationInput {
        ObservationInput::new(round, 0, ty, text)
    }

    #[test]
    fn ids_are_dense_from_zero() {
        let mut s = store();
        for i in 0..5 {
            let id = s.append(input(0, MemoryType::Percept, "a sound")).expect("append");
            assert_eq!(id, ObservationId(i));
        }
        assert_eq!(s.len(), 5);
    }

    #[test]
    fn get_out_of_range_is_not_found() {
        let mut s = store();
        s.append(input(0, MemoryType::Action, "waved")).expect("append");
        let err = s.get(ObservationId(1)).expect_err("out of range");
        assert!(matches!(err, MemoryError::NotFound { id: 1, count: 1 }));
    }

    #[test]
    fn indices_follow_appends() {
        let mut s = store();
        let kw = Keywords::new().with("items", ["lantern"]);
        let a = s
            .append(input(1, MemoryType::Percept, "a lantern flickers").with_keywords(kw.clone()))
            .expect("append");
        let b = s.append(input(1, MemoryType::Action, "lit the stove")).expect("append");
        let c = s
            .append(input(2, MemoryType::Percept, "the lantern went out").with_keywords(kw))
            .expect("append");

        assert_eq!(s.by_round(1), &[a, b]);
        assert_eq!(s.by_round(2), &[c]);
        assert!(s.by_round(9).is_empty());
        assert_eq!(s.by_type(MemoryType::Percept), &[a, c]);
        assert!(s.by_type(MemoryType::Reflection).is_empty());
        assert_eq!(s.keyword_index().get("items", "lantern"), &[a, c]);
        assert_eq!(s.after_round(1, false), vec![c]);
        assert_eq!(s.after_round(1, true), vec![a, b, c]);
    }

    #[test]
    fn lookback_returns_suffix() {
        let mut s = store();
        assert!(s.lookback(3).is_empty());
        for text in ["one", "two", "three", "four"] {
            s.append(input(0, MemoryType::Dialogue, text)).expect("append");
        }
        let recent: Vec<_> = s.lookback(2).iter().map(|o| o.description.as_str()).collect();
        assert_eq!(recent, vec!["three", "four"]);
        assert_eq!(s.lookback(10).len(), 4);
        assert!(s.lookback(0).is_empty());
    }

    #[test]
    fn update_revises_only_reflections() {
        let mut s = store();
        let act = s.append(input(0, MemoryType::Action, "opened the gate")).expect("append");
        let refl = s
            .append(input(0, MemoryType::Reflection, "the gate matters"))
            .expect("append");
        let before = s.embedding(refl).expect("embedding").clone();

        assert!(!s.update_description(act, "closed the gate").expect("ok"));
        assert_eq!(s.get(act).expect("get").description, "opened the gate");

        assert!(s.update_description(refl, "the gatekeeper lies").expect("ok"));
        let revised = s.get(refl).expect("get");
        assert_eq!(revised.description, "the gatekeeper lies");
        assert_eq!(revised.id, refl);
        assert_eq!(revised.memory_type, MemoryType::Reflection);
        assert_ne!(s.embedding(refl).expect("embedding"), &before);

        let err = s.update_description(ObservationId(7), "nope").expect_err("missing");
        assert!(matches!(err, MemoryError::NotFound { id: 7, .. }));
    }

    #[test]
    fn transient_embedding_failure_is_retried() {
        let mut s = flaky_store(1, EmbeddingFailurePolicy::Abort);
        let id = s.append(input(0, MemoryType::Percept, "rain")).expect("second attempt");
        assert_ne!(s.embedding(id).expect("embedding"), &Embedding::zeros(16));
    }

    #[test]
    fn abort_policy_leaves_store_untouched() {
        let mut s = flaky_store(10, EmbeddingFailurePolicy::Abort);
        let kw = Keywords::new().with("misc", ["rain"]);
        let err = s
            .append(input(3, MemoryType::Percept, "rain").with_keywords(kw))
            .expect_err("embedding down");
        assert!(matches!(err, MemoryError::ExternalServiceUnavailable { attempts: 2, .. }));
        assert!(s.is_empty());
        assert!(s.by_round(3).is_empty());
        assert!(s.by_type(MemoryType::Percept).is_empty());
        assert!(s.keyword_index().is_empty());
    }

    #[test]
    fn zero_vector_policy_keeps_the_observation() {
        let mut s = flaky_store(10, EmbeddingFailurePolicy::ZeroVector);
        let id = s.append(input(0, MemoryType::Percept, "rain")).expect("degraded append");
        assert_eq!(id, ObservationId(0));
        assert_eq!(s.embedding(id).expect("embedding"), &Embedding::zeros(16));
    }

    #[test]
    fn failed_revision_leaves_reflection_unchanged() {
        // first call (the append) succeeds, every later call fails
        let mut s = flaky_store(0, EmbeddingFailurePolicy::ZeroVector);
        let id = s.append(input(0, MemoryType::Reflection, "first thought")).expect("append");
        s.embedder = Arc::new(FlakyEmbedder {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        });
        assert!(s.update_description(id, "second thought").is_err());
        assert_eq!(s.get(id).expect("get").description, "first thought");
    }

    #[test]
    fn keyword_hits_are_deduplicated() {
        let mut s = store();
        let both = Keywords::new().with("characters", ["mara"]).with("items", ["key"]);
        let a = s.append(input(0, MemoryType::Percept, "Mara has a key").with_keywords(both)).expect("append");
        let b = s
            .append(input(0, MemoryType::Percept, "a key").with_keywords(Keywords::new().with("items", ["key"])))
            .expect("append");
        let query = Keywords::new().with("characters", ["mara"]).with("items", ["key"]);
        let hits: Vec<_> = s.keyword_hits(&query).into_iter().collect();
        assert_eq!(hits, vec![a, b]);
        assert!(s.keyword_hits(&Keywords::new().with("misc", ["zzz"])).is_empty());
    }

    #[test]
    fn enumerated_descriptions_are_numbered() {
        let mut s = store();
        let a = s.append(input(0, MemoryType::Percept, "a crow lands")).expect("append");
        let b = s.append(input(0, MemoryType::Percept, "the crow leaves")).expect("append");
        let text = s.enumerated_descriptions(&[b, ObservationId(99), a]);
        assert_eq!(text, "1. the crow leaves\n2. a crow lands");
    }

    #[test]
    fn stats_count_types() {
        let mut s = store();
        s.append(input(0, MemoryType::Percept, "x")).expect("append");
        s.append(input(0, MemoryType::Reflection, "y").with_self(false)).expect("append");
        let stats = s.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_type[&MemoryType::Percept], 1);
        assert_eq!(stats.by_type[&MemoryType::Action], 0);
        assert_eq!(stats.self_authored, 1);
    }
}
