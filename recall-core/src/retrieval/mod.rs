//! Memory retrieval: keyword-seeded candidates + multi-signal ranking.
//!
//! A retrieval call:
//! 1. gathers keywords from the most recent observations, the active goal
//!    and the query text (each through the [`KeywordExtractor`]),
//! 2. unions every id the keyword index holds for those keywords,
//! 3. ranks the candidates with [`scoring::rank`] (ascending),
//! 4. keeps the `n` highest-scoring, still in ascending order.
//!
//! A retrieval with no keyword hits is an ordinary empty result. Failing
//! collaborators degrade the result (fewer keywords, default relevance)
//! instead of failing the call.

pub mod scoring;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::memory::MemoryStore;
use crate::services::{KeywordExtractor, RetryPolicy, call_with_retry};
use crate::types::{Embedding, Keywords, ObservationId};

pub use scoring::{NEUTRAL_SCORE, RelevanceTarget, ScoreBreakdown, ScoredObservation};

/// A cached default query: the persona summary or the current goal.
#[derive(Debug, Clone)]
struct DefaultQuery {
    text: String,
    embedding: Option<Embedding>,
}

/// Per-agent retrieval coordinator.
///
/// Holds the agent's persona and goal (and their cached embeddings) and
/// answers retrieval queries against that agent's [`MemoryStore`].
pub struct Retriever {
    config: RetrievalConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn KeywordExtractor>,
    retry: RetryPolicy,
    persona: Option<DefaultQuery>,
    goal: Option<DefaultQuery>,
}

impl Retriever {
    /// Create a retriever with no persona and no goal.
    #[must_use]
    pub fn new(
        config: RetrievalConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn KeywordExtractor>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            config,
            embedder,
            extractor,
            retry,
            persona: None,
            goal: None,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Set the persona summary used as a default relevance query.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::ExternalServiceUnavailable`](crate::MemoryError::ExternalServiceUnavailable)
    /// if the summary cannot be embedded. The text is still recorded, but
    /// contributes nothing to default relevance until set again.
    pub fn set_persona(&mut self, summary: impl Into<String>) -> Result<()> {
        let (query, result) = self.default_query(summary.into());
        self.persona = Some(query);
        result
    }

    /// Set or clear the current goal.
    ///
    /// The goal text seeds keyword search and acts as a default relevance
    /// query.
    ///
    /// # Errors
    ///
    /// As [`Retriever::set_persona`]: an embedding failure leaves the goal in
    /// place for keyword seeding only.
    pub fn set_goal(&mut self, goal: Option<String>) -> Result<()> {
        match goal {
            None => {
                self.goal = None;
                Ok(())
            }
            Some(text) => {
                let (query, result) = self.default_query(text);
                self.goal = Some(query);
                result
            }
        }
    }

    /// The current goal text, if any.
    #[must_use]
    pub fn goal(&self) -> Option<&str> {
        self.goal.as_ref().map(|g| g.text.as_str())
    }

    /// The persona summary, if any.
    #[must_use]
    pub fn persona(&self) -> Option<&str> {
        self.persona.as_ref().map(|p| p.text.as_str())
    }

    /// Retrieve memory descriptions relevant to `query`, least relevant
    /// first.
    ///
    /// `limit` of `None` uses the configured default; `Some(0)` returns every
    /// ranked candidate.
    #[must_use]
    pub fn retrieve(&self, store: &MemoryStore, query: Option<&str>, limit: Option<usize>) -> Vec<String> {
        self.retrieve_scored(store, query, limit)
            .into_iter()
            .filter_map(|s| store.get(s.id).ok().map(|o| o.description.clone()))
            .collect()
    }

    /// Like [`Retriever::retrieve`] but returns ids with their scores.
    #[must_use]
    pub fn retrieve_scored(
        &self,
        store: &MemoryStore,
        query: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<ScoredObservation> {
        let keywords = self.gather_keywords(store, query);
        let candidates: Vec<ObservationId> = store.keyword_hits(&keywords).into_iter().collect();
        if candidates.is_empty() {
            debug!(agent = %store.agent(), keywords = keywords.len(), "no candidates");
            return Vec::new();
        }

        let query_embedding = query.and_then(|q| {
            call_with_retry("embedding", &self.retry, || self.embedder.embed(q))
                .inspect_err(|e| warn!(error = %e, "query embedding failed; using default queries"))
                .ok()
        });
        let defaults = self.default_embeddings();
        let target = match &query_embedding {
            Some(embedding) => RelevanceTarget::Query(embedding),
            None => RelevanceTarget::Defaults(&defaults),
        };

        let mut ranked = scoring::rank(
            store,
            &candidates,
            target,
            self.config.gamma,
            &self.config.weights,
        );

        let limit = limit.unwrap_or(self.config.default_limit);
        if limit > 0 && ranked.len() > limit {
            ranked.drain(..ranked.len() - limit);
        }

        debug!(
            agent = %store.agent(),
            keywords = keywords.len(),
            candidates = candidates.len(),
            returned = ranked.len(),
            "retrieved memories"
        );
        ranked
    }

    /// Union of the keywords of the recent observations, the goal and the
    /// query. Extraction failures drop that source.
    fn gather_keywords(&self, store: &MemoryStore, query: Option<&str>) -> Keywords {
        let recent = store
            .lookback(self.config.lookback)
            .iter()
            .map(|o| o.description.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let sources = [
            ("lookback", (!recent.is_empty()).then_some(recent.as_str())),
            ("goal", self.goal()),
            ("query", query),
        ];

        let mut keywords = Keywords::new();
        for (source, text) in sources {
            let Some(text) = text else { continue };
            match call_with_retry("keywords", &self.retry, || self.extractor.extract_keywords(text)) {
                Ok(found) => keywords.merge(&found),
                Err(e) => warn!(source, error = %e, "skipping keyword source"),
            }
        }
        keywords
    }

    fn default_embeddings(&self) -> Vec<Embedding> {
        [&self.persona, &self.goal]
            .into_iter()
            .flatten()
            .filter_map(|q| q.embedding.clone())
            .collect()
    }

    fn default_query(&self, text: String) -> (DefaultQuery, Result<()>) {
        match call_with_retry("embedding", &self.retry, || self.embedder.embed(&text)) {
            Ok(embedding) => (
                DefaultQuery {
                    text,
                    embedding: Some(embedding),
                },
                Ok(()),
            ),
            Err(e) => {
                warn!(error = %e, "default query left without embedding");
                (
                    DefaultQuery {
                        text,
                        embedding: None,
                    },
                    Err(e),
                )
            }
        }
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("config", &self.config)
            .field("persona", &self.persona())
            .field("goal", &self.goal())
            .finish_non_exhaustive()
    }
}
