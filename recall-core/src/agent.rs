//! Per-agent memory facade.
//!
//! [`AgentMemory`] owns one agent's [`MemoryStore`] and [`Retriever`] along
//! with the collaborators they need. Other agents only ever see it through
//! [`AgentMemory::retrieve`] or a shared reference to the store; all
//! mutation goes through the owning agent.

use std::sync::Arc;

use tracing::warn;

use crate::budget::{self, Tokenizer};
use crate::config::{BudgetConfig, MemorySettings, RecallConfig};
use crate::embedding::{EmbeddingProvider, HashingEmbeddingProvider};
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::observation::ObservationInput;
use crate::retrieval::{Retriever, ScoredObservation};
use crate::services::{
    FixedImportance, ImportanceScorer, KeywordExtractor, RetryPolicy, VocabularyKeywordExtractor,
    call_with_retry, rate_importance,
};
use crate::types::{AgentId, ObservationId};

/// The collaborators an agent's memory depends on.
#[derive(Clone)]
pub struct Services {
    /// Text → vector.
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// Text → salience.
    pub importance: Arc<dyn ImportanceScorer>,
    /// Text → categorized keywords.
    pub keywords: Arc<dyn KeywordExtractor>,
}

impl Services {
    /// Model-free services: feature-hashing embeddings, a constant
    /// importance and the given vocabulary extractor.
    #[must_use]
    pub fn offline(vocabulary: VocabularyKeywordExtractor, importance: i64) -> Self {
        Self {
            embedder: Arc::new(HashingEmbeddingProvider::default()),
            importance: Arc::new(FixedImportance(importance)),
            keywords: Arc::new(vocabulary),
        }
    }
}

/// One agent's memory: store, retriever and collaborators.
pub struct AgentMemory {
    name: String,
    store: MemoryStore,
    retriever: Retriever,
    services: Services,
    settings: MemorySettings,
    budget: BudgetConfig,
    retry: RetryPolicy,
}

impl AgentMemory {
    /// Create an empty memory for the agent called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, config: &RecallConfig, services: Services) -> Self {
        let retry = RetryPolicy::from(&config.services);
        let store = MemoryStore::new(
            AgentId::new(),
            Arc::clone(&services.embedder),
            config.memory.clone(),
            retry,
        );
        let retriever = Retriever::new(
            config.retrieval.clone(),
            Arc::clone(&services.embedder),
            Arc::clone(&services.keywords),
            retry,
        );
        Self {
            name: name.into(),
            store,
            retriever,
            services,
            settings: config.memory.clone(),
            budget: config.budget.clone(),
            retry,
        }
    }

    /// The agent's id.
    #[must_use]
    pub fn id(&self) -> AgentId {
        self.store.agent()
    }

    /// The agent's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only access to the store.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Read-only access to the retriever.
    #[must_use]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Append an observation as given.
    ///
    /// # Errors
    ///
    /// See [`MemoryStore::append`].
    pub fn append(&mut self, input: ObservationInput) -> Result<ObservationId> {
        self.store.append(input)
    }

    /// Append an observation after running it past the collaborators.
    ///
    /// Keywords extracted from the description are merged into any supplied
    /// ones; an extraction failure keeps only the supplied keywords. The
    /// importance is always rated, falling back to the neutral importance.
    ///
    /// # Errors
    ///
    /// See [`MemoryStore::append`].
    pub fn record(&mut self, mut input: ObservationInput) -> Result<ObservationId> {
        let extractor = &self.services.keywords;
        match call_with_retry("keywords", &self.retry, || {
            extractor.extract_keywords(&input.description)
        }) {
            Ok(found) => input.keywords.merge(&found),
            Err(e) => warn!(agent = %self.name, error = %e, "recording without extracted keywords"),
        }
        input.importance = rate_importance(
            self.services.importance.as_ref(),
            &input.description,
            &self.settings,
            &self.retry,
        );
        self.store.append(input)
    }

    /// Revise a reflection in place.
    ///
    /// # Errors
    ///
    /// See [`MemoryStore::update_description`].
    pub fn revise_reflection(&mut self, id: ObservationId, text: impl Into<String>) -> Result<bool> {
        self.store.update_description(id, text)
    }

    /// Set the persona summary used as a default relevance query.
    ///
    /// # Errors
    ///
    /// See [`Retriever::set_persona`].
    pub fn set_persona(&mut self, summary: impl Into<String>) -> Result<()> {
        self.retriever.set_persona(summary)
    }

    /// Set or clear the current goal.
    ///
    /// # Errors
    ///
    /// See [`Retriever::set_goal`].
    pub fn set_goal(&mut self, goal: Option<String>) -> Result<()> {
        self.retriever.set_goal(goal)
    }

    /// Retrieve memory descriptions, least relevant first.
    #[must_use]
    pub fn retrieve(&self, query: Option<&str>, limit: Option<usize>) -> Vec<String> {
        self.retriever.retrieve(&self.store, query, limit)
    }

    /// Retrieve ids with their scores, least relevant first.
    #[must_use]
    pub fn retrieve_scored(&self, query: Option<&str>, limit: Option<usize>) -> Vec<ScoredObservation> {
        self.retriever.retrieve_scored(&self.store, query, limit)
    }

    /// Retrieve, then trim to the configured context budget.
    #[must_use]
    pub fn retrieve_within_budget<K: Tokenizer + ?Sized>(
        &self,
        query: Option<&str>,
        limit: Option<usize>,
        tokenizer: &K,
    ) -> Vec<String> {
        let memories = self.retrieve(query, limit);
        budget::trim(&memories, self.budget.max_tokens, self.budget.max_items, tokenizer).to_vec()
    }
}

impl std::fmt::Debug for AgentMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentMemory")
            .field("name", &self.name)
            .field("store", &self.store)
            .field("retriever", &self.retriever)
            .finish_non_exhaustive()
    }
}
